//! Distance-field gradients
//!
//! Author: Moroya Sakamoto

use crate::eval::eval;
use crate::types::SdfNode;
use glam::Vec3;

/// Central-difference step for gradient estimation
pub const GRADIENT_EPSILON: f32 = 1e-4;

/// Tetrahedral tap directions, scaled by the epsilon at use
const TETRAHEDRON: [Vec3; 4] = [
    Vec3::new(1.0, -1.0, -1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(1.0, 1.0, 1.0),
];

/// Estimate the field gradient at a point
///
/// Four-tap tetrahedral estimate, one distance call per tap. When the taps
/// cancel (deep inside a symmetric region, or a flat in the field) it retries
/// with forward differences, and failing that returns an arbitrary unit
/// vector so callers always get something usable as a normal.
///
/// The result is *not* normalized: away from the surface of a blended or
/// flattened field the gradient magnitude genuinely differs from one, and
/// some callers want that magnitude.
pub fn gradient(node: &SdfNode, point: Vec3) -> Vec3 {
    let mut grad = Vec3::ZERO;
    for tap in TETRAHEDRON {
        grad += tap * eval(node, point + tap * GRADIENT_EPSILON);
    }
    if grad.length_squared() > 0.0 {
        return grad / (4.0 * GRADIENT_EPSILON);
    }

    // Degenerate taps; fall back to forward differences.
    let here = eval(node, point);
    let grad = Vec3::new(
        eval(node, point + Vec3::X * GRADIENT_EPSILON) - here,
        eval(node, point + Vec3::Y * GRADIENT_EPSILON) - here,
        eval(node, point + Vec3::Z * GRADIENT_EPSILON) - here,
    );
    if grad.length_squared() > 0.0 {
        grad / GRADIENT_EPSILON
    } else {
        Vec3::X
    }
}

/// [`gradient`] normalized for use as a surface normal
pub fn normal(node: &SdfNode, point: Vec3) -> Vec3 {
    gradient(node, point).normalize_or_zero()
}
