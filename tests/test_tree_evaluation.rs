//! Integration tests: direct tree evaluation
//!
//! Distances, gradients, materials, and bounds straight off the node tree.
//!
//! Author: Moroya Sakamoto

mod common;

use hinoki_csg::material::Material;
use hinoki_csg::prelude::*;
use common::*;

// ============================================================================
// Distances
// ============================================================================

#[test]
fn sphere_distance_is_radial() {
    init_logging();
    let sphere = test_sphere();
    assert!((eval(&sphere, Vec3::ZERO) + 1.0).abs() < 1e-6);
    assert!(eval(&sphere, Vec3::new(2.0, 0.0, 0.0)) - 1.0 < 1e-6);
    assert!(eval(&sphere, Vec3::X).abs() < 1e-6);
}

#[test]
fn diff_carves_the_overlap() {
    init_logging();
    let shape = test_csg();
    // The box interior is removed from the sphere
    assert!(eval(&shape, Vec3::ZERO) > 0.0);
    // The sphere surface survives away from the box
    assert!(eval(&shape, Vec3::X).abs() < 1e-5);
}

#[test]
fn blend_union_never_exceeds_hard_union() {
    init_logging();
    let a = SdfNode::sphere(0.8);
    let b = SdfNode::sphere(0.8).moved(Vec3::new(1.0, 0.0, 0.0));
    let hard = a.clone().union(b.clone());
    let soft = a.blend_union(0.3, b);
    for p in test_points() {
        assert!(
            eval(&soft, p) <= eval(&hard, p) + 1e-6,
            "smooth union grew the field at {:?}",
            p
        );
    }
}

#[test]
fn moved_brush_shifts_the_field() {
    init_logging();
    let offset = Vec3::new(2.0, -1.0, 0.5);
    let sphere = test_sphere();
    let shifted = test_sphere().moved(offset);
    for p in test_points() {
        assert_eq!(
            eval(&sphere, p).to_bits(),
            eval(&shifted, p + offset).to_bits()
        );
    }
}

#[test]
fn scaled_brush_scales_distances() {
    init_logging();
    let doubled = test_sphere().scaled(2.0);
    assert!((eval(&doubled, Vec3::ZERO) + 2.0).abs() < 1e-5);
    assert!(eval(&doubled, Vec3::new(2.0, 0.0, 0.0)).abs() < 1e-5);
}

// ============================================================================
// Gradients
// ============================================================================

#[test]
fn sphere_gradient_is_radial() {
    init_logging();
    let sphere = test_sphere();
    for p in [Vec3::X, Vec3::new(0.3, 0.4, 0.5), Vec3::splat(1.0)] {
        let n = normal(&sphere, p);
        let expected = p.normalize();
        assert!(n.dot(expected) > 0.999, "normal {:?} at {:?}", n, p);
    }
}

// ============================================================================
// Materials
// ============================================================================

#[test]
fn paint_survives_union() {
    init_logging();
    let red = Material::solid(Vec3::new(1.0, 0.0, 0.0));
    let a = test_sphere().painted(&red, false);
    let b = SdfNode::sphere(0.5).moved(Vec3::new(3.0, 0.0, 0.0));
    let shape = a.union(b);
    let found = get_material(&shape, Vec3::X).expect("painted side has a material");
    assert!(hinoki_csg::material::same_material(&found, &red));
    assert!(get_material(&shape, Vec3::new(3.5, 0.0, 0.0)).is_none());
}

// ============================================================================
// Bounds
// ============================================================================

#[test]
fn bounds_contain_the_surface() {
    init_logging();
    let shape = test_complex_shape();
    let bounds = bounds(&shape);
    assert!(!bounds.degenerate());
    for p in test_points() {
        if eval(&shape, p).abs() < 1e-3 {
            assert!(bounds.contains(p), "surface point {:?} escaped bounds", p);
        }
    }
}

#[test]
fn plane_bounds_are_infinite() {
    init_logging();
    assert!(!has_finite_bounds(&SdfNode::plane(Vec3::Y)));
    assert!(has_finite_bounds(&test_csg()));
}

// ============================================================================
// Batch evaluation
// ============================================================================

#[test]
fn batch_matches_scalar() {
    init_logging();
    let shape = test_complex_shape();
    let points = test_points();
    let serial = eval_batch(&shape, &points);
    let parallel = eval_batch_parallel(&shape, &points);
    for (i, p) in points.iter().enumerate() {
        let scalar = eval(&shape, *p);
        assert_eq!(serial[i].to_bits(), scalar.to_bits());
        assert_eq!(parallel[i].to_bits(), scalar.to_bits());
    }
}
