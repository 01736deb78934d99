//! The instruction set and word stream
//!
//! Author: Moroya Sakamoto

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Stack-machine instruction set
///
/// Brush opcodes write the distance for the current slot and reset the
/// point register; set opcodes fold the top two slots; transforms rewrite
/// the point register for the brush that follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum OpCode {
    /// End of program; the result sits in slot 0
    Return = 0,

    // === Brushes (write the current slot, reset the point) ===
    /// params: radius
    Sphere,
    /// params: radii (x, y, z)
    Ellipsoid,
    /// params: half extents (x, y, z)
    Box3d,
    /// params: major radius, minor radius
    Torus,
    /// params: radius, half height
    Cylinder,
    /// params: radius, half height
    Cone,
    /// params: base radius, top radius, half height
    CappedCone,
    /// params: normal (x, y, z)
    Plane,

    // === Set operators (fold the top two slots) ===
    /// min
    Union,
    /// max
    Inter,
    /// max against negated right
    Diff,
    /// params: threshold
    BlendUnion,
    /// params: threshold
    BlendInter,
    /// params: threshold
    BlendDiff,

    // === Single-slot rewrites ===
    /// params: offset distance
    Flate,
    /// Open a fresh slot for the right operand
    Push,

    // === Point register ===
    /// params: translation (x, y, z), subtracted from the point
    Offset,
    /// params: 16 words of the inverse matrix, column major
    Matrix,
    /// params: factor multiplied into the current slot
    ScaleField,
    /// params: color (r, g, b); ignored by distance evaluation
    Paint,
}

impl OpCode {
    /// Decode a raw word, `None` when it is not an opcode
    pub fn from_word(word: u32) -> Option<OpCode> {
        // Keep in sync with the variant list above.
        Some(match word {
            0 => OpCode::Return,
            1 => OpCode::Sphere,
            2 => OpCode::Ellipsoid,
            3 => OpCode::Box3d,
            4 => OpCode::Torus,
            5 => OpCode::Cylinder,
            6 => OpCode::Cone,
            7 => OpCode::CappedCone,
            8 => OpCode::Plane,
            9 => OpCode::Union,
            10 => OpCode::Inter,
            11 => OpCode::Diff,
            12 => OpCode::BlendUnion,
            13 => OpCode::BlendInter,
            14 => OpCode::BlendDiff,
            15 => OpCode::Flate,
            16 => OpCode::Push,
            17 => OpCode::Offset,
            18 => OpCode::Matrix,
            19 => OpCode::ScaleField,
            20 => OpCode::Paint,
            _ => return None,
        })
    }
}

/// Flat program storage
///
/// One `Vec<u32>` holds everything: opcodes as their discriminant, scalar
/// parameters bitcast through [`f32::to_bits`]. Parameter words are always
/// emitted; opcode words only on the CPU path, so a GPU upload of the same
/// buffer is a pure uniform array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramBuffer {
    words: Vec<u32>,
}

impl ProgramBuffer {
    /// Empty program
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of words emitted so far
    ///
    /// Captured before a parameter push, this is the index shader text
    /// refers to via `PARAMS[..]`.
    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True when nothing has been emitted
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Raw word stream
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Append an opcode word
    pub fn push_opcode(&mut self, opcode: OpCode) {
        self.words.push(opcode as u32);
    }

    /// Append one scalar parameter
    pub fn push_scalar(&mut self, value: f32) {
        self.words.push(value.to_bits());
    }

    /// Append three scalar parameters
    pub fn push_vector(&mut self, value: Vec3) {
        self.push_scalar(value.x);
        self.push_scalar(value.y);
        self.push_scalar(value.z);
    }

    /// Append sixteen scalar parameters, column major
    pub fn push_matrix(&mut self, value: Mat4) {
        for scalar in value.to_cols_array() {
            self.push_scalar(scalar);
        }
    }

    /// Read back one raw word
    #[inline]
    pub fn word_at(&self, index: usize) -> u32 {
        self.words[index]
    }

    /// Read back one scalar parameter
    #[inline]
    pub fn scalar_at(&self, index: usize) -> f32 {
        f32::from_bits(self.words[index])
    }

    /// Read back three scalar parameters
    #[inline]
    pub fn vector_at(&self, index: usize) -> Vec3 {
        Vec3::new(
            self.scalar_at(index),
            self.scalar_at(index + 1),
            self.scalar_at(index + 2),
        )
    }

    /// Read back a column-major matrix
    #[inline]
    pub fn matrix_at(&self, index: usize) -> Mat4 {
        let mut cols = [0.0f32; 16];
        for (offset, slot) in cols.iter_mut().enumerate() {
            *slot = self.scalar_at(index + offset);
        }
        Mat4::from_cols_array(&cols)
    }

    /// Shader-text parameter references for `count` words starting at `at`
    pub fn param_list(at: usize, count: usize) -> String {
        let refs: Vec<String> = (at..at + count).map(|i| format!("PARAMS[{}]", i)).collect();
        refs.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_roundtrip_is_bit_exact() {
        let mut program = ProgramBuffer::new();
        for value in [0.0f32, -0.0, 1.5, f32::INFINITY, f32::MIN_POSITIVE] {
            let at = program.len();
            program.push_scalar(value);
            assert_eq!(program.scalar_at(at).to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_opcode_decode_inverts_encode() {
        let all = [
            OpCode::Return,
            OpCode::Sphere,
            OpCode::Ellipsoid,
            OpCode::Box3d,
            OpCode::Torus,
            OpCode::Cylinder,
            OpCode::Cone,
            OpCode::CappedCone,
            OpCode::Plane,
            OpCode::Union,
            OpCode::Inter,
            OpCode::Diff,
            OpCode::BlendUnion,
            OpCode::BlendInter,
            OpCode::BlendDiff,
            OpCode::Flate,
            OpCode::Push,
            OpCode::Offset,
            OpCode::Matrix,
            OpCode::ScaleField,
            OpCode::Paint,
        ];
        for opcode in all {
            assert_eq!(OpCode::from_word(opcode as u32), Some(opcode));
        }
        assert_eq!(OpCode::from_word(999), None);
    }

    #[test]
    fn test_matrix_roundtrip() {
        let mut program = ProgramBuffer::new();
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let at = program.len();
        program.push_matrix(m);
        assert_eq!(program.len(), 16);
        assert_eq!(program.matrix_at(at), m);
    }

    #[test]
    fn test_param_list_naming() {
        assert_eq!(ProgramBuffer::param_list(4, 3), "PARAMS[4], PARAMS[5], PARAMS[6]");
    }
}
