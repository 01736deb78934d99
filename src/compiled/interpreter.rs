//! The CPU stack machine
//!
//! Author: Moroya Sakamoto

use crate::compiled::compiler::compile_program;
use crate::compiled::{OpCode, ProgramBuffer};
use crate::operations::*;
use crate::primitives::*;
use crate::types::SdfNode;
use glam::{Vec3, Vec4};
use std::sync::Arc;

/// Replayable compiled evaluator for one tree
///
/// Construction walks the tree once; evaluation after that is a linear
/// sweep over the word stream with a small value stack. The stack is sized
/// exactly from the tree shape, so no evaluation can overflow it.
#[derive(Debug, Clone)]
pub struct SdfInterpreter {
    program: ProgramBuffer,
    stack_size: usize,
}

impl SdfInterpreter {
    /// Compile an interpreter for the given tree
    pub fn new(node: &Arc<SdfNode>) -> Self {
        SdfInterpreter {
            program: compile_program(node),
            stack_size: node.stack_size().max(1),
        }
    }

    /// Words in the compiled program
    pub fn program_len(&self) -> usize {
        self.program.len()
    }

    /// Value-stack slots evaluation uses
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// Signed distance at `point`
    ///
    /// Must agree bit for bit with [`crate::eval::eval`] on the source tree.
    pub fn eval(&self, point: Vec3) -> f32 {
        let mut stack = vec![0.0f32; self.stack_size];
        let mut sp = 0usize;
        // Point register: transforms rewrite it, every brush consumes and
        // resets it.
        let mut p = point;

        let words = self.program.words();
        let mut cursor = 0usize;
        while cursor < words.len() {
            let opcode = match OpCode::from_word(words[cursor]) {
                Some(opcode) => opcode,
                None => {
                    debug_assert!(false, "parameter word where an opcode was expected");
                    break;
                }
            };
            cursor += 1;
            match opcode {
                OpCode::Return => break,

                OpCode::Offset => {
                    p -= self.program.vector_at(cursor);
                    cursor += 3;
                }
                OpCode::Matrix => {
                    let m = self.program.matrix_at(cursor);
                    cursor += 16;
                    let tmp = m * Vec4::new(p.x, p.y, p.z, 1.0);
                    p = tmp.truncate() / tmp.w;
                }

                OpCode::Sphere => {
                    stack[sp] = sdf_sphere(p, self.program.scalar_at(cursor));
                    cursor += 1;
                    p = point;
                }
                OpCode::Ellipsoid => {
                    stack[sp] = sdf_ellipsoid(p, self.program.vector_at(cursor));
                    cursor += 3;
                    p = point;
                }
                OpCode::Box3d => {
                    stack[sp] = sdf_box3d(p, self.program.vector_at(cursor));
                    cursor += 3;
                    p = point;
                }
                OpCode::Torus => {
                    stack[sp] = sdf_torus(
                        p,
                        self.program.scalar_at(cursor),
                        self.program.scalar_at(cursor + 1),
                    );
                    cursor += 2;
                    p = point;
                }
                OpCode::Cylinder => {
                    stack[sp] = sdf_cylinder(
                        p,
                        self.program.scalar_at(cursor),
                        self.program.scalar_at(cursor + 1),
                    );
                    cursor += 2;
                    p = point;
                }
                OpCode::Cone => {
                    stack[sp] = sdf_cone(
                        p,
                        self.program.scalar_at(cursor),
                        self.program.scalar_at(cursor + 1),
                    );
                    cursor += 2;
                    p = point;
                }
                OpCode::CappedCone => {
                    stack[sp] = sdf_capped_cone(
                        p,
                        self.program.scalar_at(cursor),
                        self.program.scalar_at(cursor + 1),
                        self.program.scalar_at(cursor + 2),
                    );
                    cursor += 3;
                    p = point;
                }
                OpCode::Plane => {
                    stack[sp] = sdf_plane(p, self.program.vector_at(cursor));
                    cursor += 3;
                    p = point;
                }

                OpCode::Push => sp += 1,
                OpCode::Union => {
                    stack[sp - 1] = union_op(stack[sp - 1], stack[sp]);
                    sp -= 1;
                }
                OpCode::Inter => {
                    stack[sp - 1] = inter_op(stack[sp - 1], stack[sp]);
                    sp -= 1;
                }
                OpCode::Diff => {
                    stack[sp - 1] = diff_op(stack[sp - 1], stack[sp]);
                    sp -= 1;
                }
                OpCode::BlendUnion => {
                    let threshold = self.program.scalar_at(cursor);
                    cursor += 1;
                    stack[sp - 1] = smooth_union_op(stack[sp - 1], stack[sp], threshold);
                    sp -= 1;
                }
                OpCode::BlendInter => {
                    let threshold = self.program.scalar_at(cursor);
                    cursor += 1;
                    stack[sp - 1] = smooth_inter_op(stack[sp - 1], stack[sp], threshold);
                    sp -= 1;
                }
                OpCode::BlendDiff => {
                    let threshold = self.program.scalar_at(cursor);
                    cursor += 1;
                    stack[sp - 1] = smooth_diff_op(stack[sp - 1], stack[sp], threshold);
                    sp -= 1;
                }

                OpCode::Flate => {
                    stack[sp] -= self.program.scalar_at(cursor);
                    cursor += 1;
                }
                OpCode::ScaleField => {
                    stack[sp] *= self.program.scalar_at(cursor);
                    cursor += 1;
                }
                OpCode::Paint => cursor += 3,
            }
        }

        stack[0]
    }
}
