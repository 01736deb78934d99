//! Direct tree evaluation
//!
//! Recursive-descent distance evaluation over [`SdfNode`] trees. This is the
//! reference semantics: the bytecode interpreter in [`crate::compiled`] must
//! agree with it to the bit, and the octree in [`crate::octree`] only
//! accelerates it.
//!
//! Evaluation takes `&self` trees; pending pose edits are consumed through
//! pure folded views so concurrent readers never race an in-place fold.
//!
//! Author: Moroya Sakamoto

pub mod gradient;
pub mod material;
pub mod parallel;

pub use gradient::{gradient, normal};
pub use material::{get_material, sample};
pub use parallel::{eval_batch, eval_batch_parallel, eval_grid};

use crate::operations::*;
use crate::types::{SdfNode, SetFamily, SetNode};
use glam::Vec3;

/// Evaluate a tree at a single point
///
/// Returns the signed distance to the modeled surface, negative inside.
/// Marked `#[inline]` so shallow trees flatten into the caller.
#[inline]
pub fn eval(node: &SdfNode, point: Vec3) -> f32 {
    match node {
        SdfNode::Brush(brush) => {
            let local = brush.transform.apply_inverse(point);
            // Uniform scale shrinks local distances; rescale back to world.
            brush.shape.distance(local) * brush.transform.accumulated_scale
        }
        SdfNode::Set(set) => {
            let lhs = eval(&set.lhs, point);
            let rhs = eval(&set.rhs, point);
            combine(set, lhs, rhs)
        }
        SdfNode::Flate(flate) => eval(&flate.child, point) - flate.radius,
        // Stencils shade, they never displace.
        SdfNode::Stencil(stencil) => eval(&stencil.child, point),
    }
}

/// Apply a set node's operator to already-evaluated operands
#[inline(always)]
pub(crate) fn combine(set: &SetNode, lhs: f32, rhs: f32) -> f32 {
    match (set.family, set.blend) {
        (SetFamily::Union, None) => union_op(lhs, rhs),
        (SetFamily::Inter, None) => inter_op(lhs, rhs),
        (SetFamily::Diff, None) => diff_op(lhs, rhs),
        (SetFamily::Union, Some(threshold)) => smooth_union_op(lhs, rhs, threshold),
        (SetFamily::Inter, Some(threshold)) => smooth_inter_op(lhs, rhs, threshold),
        (SetFamily::Diff, Some(threshold)) => smooth_diff_op(lhs, rhs, threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn test_sphere_distances() {
        let node = SdfNode::sphere(1.0);
        assert!((eval(&node, Vec3::ZERO) + 1.0).abs() < 1e-6);
        assert!((eval(&node, Vec3::new(2.0, 0.0, 0.0)) - 1.0).abs() < 1e-6);
        assert!(eval(&node, Vec3::X).abs() < 1e-6);
    }

    #[test]
    fn test_moved_brush() {
        let node = SdfNode::sphere(1.0).moved(Vec3::new(3.0, 0.0, 0.0));
        assert!((eval(&node, Vec3::new(3.0, 0.0, 0.0)) + 1.0).abs() < 1e-6);
        assert!((eval(&node, Vec3::ZERO) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_scaled_brush_keeps_world_distances() {
        let node = SdfNode::sphere(1.0).scaled(2.0);
        // A radius-2 sphere: the origin sits 2 units inside.
        assert!((eval(&node, Vec3::ZERO) + 2.0).abs() < 1e-4);
        assert!((eval(&node, Vec3::new(3.0, 0.0, 0.0)) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_rotated_box() {
        let node = SdfNode::box3d(Vec3::new(2.0, 1.0, 1.0))
            .rotated(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        // The long axis now points along Y.
        assert!(eval(&node, Vec3::new(0.0, 1.9, 0.0)) < 0.0);
        assert!(eval(&node, Vec3::new(1.9, 0.0, 0.0)) > 0.0);
    }

    #[test]
    fn test_hard_csg() {
        let a = SdfNode::sphere(1.0).moved(Vec3::new(-0.5, 0.0, 0.0));
        let b = SdfNode::sphere(1.0).moved(Vec3::new(0.5, 0.0, 0.0));
        let union = a.clone().union(b.clone());
        let inter = a.clone().inter(b.clone());
        let diff = a.union(SdfNode::sphere(1.0)).diff(b);
        // Union interior covers both centers, intersection only the overlap.
        assert!(eval(&union, Vec3::new(-0.5, 0.0, 0.0)) < 0.0);
        assert!(eval(&union, Vec3::new(0.5, 0.0, 0.0)) < 0.0);
        assert!(eval(&inter, Vec3::ZERO) < 0.0);
        assert!(eval(&inter, Vec3::new(-1.2, 0.0, 0.0)) > 0.0);
        // Difference carves the right sphere back out.
        assert!(eval(&diff, Vec3::new(0.5, 0.0, 0.0)) > 0.0);
    }

    #[test]
    fn test_flate_offsets_surface() {
        let node = SdfNode::sphere(1.0).flate(0.5);
        assert!(eval(&node, Vec3::new(1.25, 0.0, 0.0)) < 0.0);
        assert!((eval(&node, Vec3::new(1.5, 0.0, 0.0))).abs() < 1e-6);
    }

    #[test]
    fn test_stencil_is_distance_transparent() {
        let paint = crate::material::Material::solid(Vec3::X);
        let plain = SdfNode::sphere(1.0);
        let masked = SdfNode::sphere(1.0).stencil(SdfNode::box3d(Vec3::ONE), paint, true);
        for p in [Vec3::ZERO, Vec3::new(0.3, 0.8, -0.2), Vec3::splat(2.0)] {
            assert_eq!(eval(&plain, p), eval(&masked, p));
        }
    }

    #[test]
    fn test_blend_matches_hard_outside_threshold() {
        let a = SdfNode::sphere(1.0).moved(Vec3::new(-5.0, 0.0, 0.0));
        let b = SdfNode::sphere(1.0).moved(Vec3::new(5.0, 0.0, 0.0));
        let hard = a.clone().union(b.clone());
        let soft = a.blend_union(0.2, b);
        let p = Vec3::new(-5.0, 2.0, 0.0);
        assert!((eval(&hard, p) - eval(&soft, p)).abs() < 1e-6);
    }
}
