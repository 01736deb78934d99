//! Tree to word-stream compilation
//!
//! One pass serves two backends. The CPU interpreter wants opcode words
//! interleaved with parameters; the GPU wants a parameter-only buffer plus
//! shader source that indexes it. [`compile`] produces both at once: the
//! returned string is the shader expression, `with_opcodes` flips the
//! interleaving, and because parameter words are emitted either way the
//! `PARAMS[..]` indices stay valid for both.
//!
//! Emission order per brush: pose rewrite, brush opcode with shape params,
//! field rescale when the pose carried a uniform scale, then paint. Set
//! operands compile left, `Push`, right, operator.
//!
//! Author: Moroya Sakamoto

use crate::compiled::{OpCode, ProgramBuffer};
use crate::types::{BrushNode, SdfNode, SetFamily, SetNode};
use std::sync::Arc;

/// Compile a tree into `program`, returning the shader expression
///
/// The caller owns program termination; [`SdfInterpreter`](crate::compiled::SdfInterpreter)
/// appends [`OpCode::Return`] after the last expression.
pub fn compile(
    node: &SdfNode,
    with_opcodes: bool,
    program: &mut ProgramBuffer,
    point: &str,
) -> String {
    match node {
        SdfNode::Brush(brush) => compile_brush(brush, with_opcodes, program, point),
        SdfNode::Set(set) => compile_set(set, with_opcodes, program, point),
        SdfNode::Flate(flate) => {
            let child = compile(&flate.child, with_opcodes, program, point);
            if with_opcodes {
                program.push_opcode(OpCode::Flate);
            }
            let at = program.len();
            program.push_scalar(flate.radius);
            format!("FlateOp({}, {})", child, ProgramBuffer::param_list(at, 1))
        }
        // Masks gate material lookup only; the distance program skips them.
        SdfNode::Stencil(stencil) => compile(&stencil.child, with_opcodes, program, point),
    }
}

/// Compile for the GPU: parameter-only buffer plus shader expression
pub fn compile_shader(node: &SdfNode) -> (String, ProgramBuffer) {
    let mut program = ProgramBuffer::new();
    let expr = compile(node, false, &mut program, "Point");
    (expr, program)
}

fn compile_brush(
    brush: &BrushNode,
    with_opcodes: bool,
    program: &mut ProgramBuffer,
    point: &str,
) -> String {
    let point = brush.transform.compile(with_opcodes, program, point);

    let opcode = match brush.shape {
        crate::types::BrushShape::Sphere { .. } => OpCode::Sphere,
        crate::types::BrushShape::Ellipsoid { .. } => OpCode::Ellipsoid,
        crate::types::BrushShape::Box3d { .. } => OpCode::Box3d,
        crate::types::BrushShape::Torus { .. } => OpCode::Torus,
        crate::types::BrushShape::Cylinder { .. } => OpCode::Cylinder,
        crate::types::BrushShape::Plane { .. } => OpCode::Plane,
        crate::types::BrushShape::Cone { .. } => OpCode::Cone,
        crate::types::BrushShape::CappedCone { .. } => OpCode::CappedCone,
    };
    if with_opcodes {
        program.push_opcode(opcode);
    }
    let (params, count) = brush.shape.params();
    let at = program.len();
    for param in &params[..count] {
        program.push_scalar(*param);
    }
    let mut expr = format!(
        "{}({}, {})",
        brush.shape.name(),
        point,
        ProgramBuffer::param_list(at, count)
    );

    let scale = brush.transform.accumulated_scale;
    if scale != 1.0 {
        if with_opcodes {
            program.push_opcode(OpCode::ScaleField);
        }
        let at = program.len();
        program.push_scalar(scale);
        expr = format!("({} * {})", expr, ProgramBuffer::param_list(at, 1));
    }

    if let Some(material) = &brush.material {
        if with_opcodes {
            program.push_opcode(OpCode::Paint);
        }
        let at = program.len();
        program.push_vector(material.color);
        expr = format!(
            "MaterialDist({}, vec3({}))",
            expr,
            ProgramBuffer::param_list(at, 3)
        );
    }

    expr
}

fn compile_set(
    set: &SetNode,
    with_opcodes: bool,
    program: &mut ProgramBuffer,
    point: &str,
) -> String {
    let lhs = compile(&set.lhs, with_opcodes, program, point);
    if with_opcodes {
        program.push_opcode(OpCode::Push);
    }
    let rhs = compile(&set.rhs, with_opcodes, program, point);

    let (opcode, name) = match (set.family, set.blend.is_some()) {
        (SetFamily::Union, false) => (OpCode::Union, "UnionOp"),
        (SetFamily::Inter, false) => (OpCode::Inter, "InterOp"),
        (SetFamily::Diff, false) => (OpCode::Diff, "DiffOp"),
        (SetFamily::Union, true) => (OpCode::BlendUnion, "SmoothUnionOp"),
        (SetFamily::Inter, true) => (OpCode::BlendInter, "SmoothInterOp"),
        (SetFamily::Diff, true) => (OpCode::BlendDiff, "SmoothDiffOp"),
    };
    if with_opcodes {
        program.push_opcode(opcode);
    }
    match set.blend {
        Some(threshold) => {
            let at = program.len();
            program.push_scalar(threshold);
            format!(
                "{}({}, {}, {})",
                name,
                lhs,
                rhs,
                ProgramBuffer::param_list(at, 1)
            )
        }
        None => format!("{}({}, {})", name, lhs, rhs),
    }
}

/// Compile a whole evaluator program ending in [`OpCode::Return`]
pub(crate) fn compile_program(node: &Arc<SdfNode>) -> ProgramBuffer {
    let mut program = ProgramBuffer::new();
    compile(node, true, &mut program, "Point");
    program.push_opcode(OpCode::Return);
    program
}
