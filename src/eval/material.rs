//! Material resolution over the tree
//!
//! Distance evaluation ignores paint entirely; these walks answer "which
//! material owns this point" after the fact. Set operators forward the query
//! to whichever operand wins the distance contest at that point, so the
//! answer is consistent with the surface [`eval`] produces.
//!
//! Author: Moroya Sakamoto

use crate::eval::{combine, eval};
use crate::material::{MaterialShared, NULL_COLOR};
use crate::types::{SdfNode, SetFamily};
use glam::{Vec3, Vec4};
use std::sync::Arc;

/// Material owning the given point, if any brush painted it
pub fn get_material(node: &SdfNode, point: Vec3) -> Option<MaterialShared> {
    match node {
        SdfNode::Brush(brush) => brush.material.clone(),
        SdfNode::Flate(flate) => get_material(&flate.child, point),
        SdfNode::Stencil(stencil) => {
            let inside = eval(&stencil.mask, point) < 0.0;
            if inside == stencil.apply_to_negative {
                Some(Arc::clone(&stencil.material))
            } else {
                get_material(&stencil.child, point)
            }
        }
        SdfNode::Set(set) => {
            let lhs = eval(&set.lhs, point);
            let rhs = eval(&set.rhs, point);
            let take_lhs = match (set.family, set.blend) {
                // Diff only ever shows left-hand surface.
                (SetFamily::Diff, None) => true,
                (SetFamily::Union, None) => lhs <= rhs,
                (SetFamily::Inter, None) => lhs >= rhs,
                // Blends credit the operand closest to the blended result,
                // ties to the left.
                (_, Some(_)) => {
                    let blended = combine(set, lhs, rhs);
                    (lhs - blended).abs() <= (rhs - blended).abs()
                }
            };
            if take_lhs {
                get_material(&set.lhs, point)
            } else {
                get_material(&set.rhs, point)
            }
        }
    }
}

/// Display color at the given point
///
/// Unpainted geometry samples [`NULL_COLOR`].
pub fn sample(node: &SdfNode, point: Vec3) -> Vec4 {
    match get_material(node, point) {
        Some(material) => material.guess_color(),
        None => NULL_COLOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{same_material, Material};

    #[test]
    fn test_union_picks_nearer_operand() {
        let red = Material::solid(Vec3::X);
        let blue = Material::solid(Vec3::Z);
        let node = SdfNode::sphere(1.0)
            .painted(&red, false)
            .moved(Vec3::new(-2.0, 0.0, 0.0))
            .union(
                SdfNode::sphere(1.0)
                    .painted(&blue, false)
                    .moved(Vec3::new(2.0, 0.0, 0.0)),
            );
        let left = get_material(&node, Vec3::new(-2.0, 0.0, 0.0)).unwrap();
        let right = get_material(&node, Vec3::new(2.0, 0.0, 0.0)).unwrap();
        assert!(same_material(&left, &red));
        assert!(same_material(&right, &blue));
    }

    #[test]
    fn test_diff_always_shows_left() {
        let red = Material::solid(Vec3::X);
        let blue = Material::solid(Vec3::Z);
        let node = SdfNode::sphere(1.0)
            .painted(&red, false)
            .diff(SdfNode::sphere(0.5).painted(&blue, false));
        // Even deep inside the carved region the left material answers.
        let m = get_material(&node, Vec3::ZERO).unwrap();
        assert!(same_material(&m, &red));
    }

    #[test]
    fn test_stencil_overrides_inside_mask() {
        let base = Material::solid(Vec3::ONE);
        let decal = Material::solid(Vec3::Y);
        let node = SdfNode::sphere(1.0).painted(&base, false).stencil(
            SdfNode::box3d(Vec3::splat(0.25)),
            Arc::clone(&decal),
            true,
        );
        let inside = get_material(&node, Vec3::ZERO).unwrap();
        let outside = get_material(&node, Vec3::new(0.9, 0.0, 0.0)).unwrap();
        assert!(same_material(&inside, &decal));
        assert!(same_material(&outside, &base));
    }

    #[test]
    fn test_unpainted_samples_null_color() {
        let node = SdfNode::sphere(1.0);
        assert_eq!(sample(&node, Vec3::ZERO), NULL_COLOR);
        assert!(get_material(&node, Vec3::ZERO).is_none());
    }
}
