//! Integration tests: adaptive octree evaluation
//!
//! Author: Moroya Sakamoto

mod common;

use hinoki_csg::octree::{OctreeConfig, SdfOctree};
use hinoki_csg::prelude::*;
use common::*;

fn surface_probes() -> Vec<Vec3> {
    let mut probes = Vec::new();
    for i in 0..32 {
        let theta = i as f32 * 0.39269908;
        let phi = i as f32 * 0.19634954;
        probes.push(Vec3::new(
            theta.cos() * phi.sin(),
            phi.cos(),
            theta.sin() * phi.sin(),
        ));
    }
    probes
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn build_rejects_unbounded_evaluators() {
    init_logging();
    assert!(SdfOctree::build(&SdfNode::plane(Vec3::Y), &OctreeConfig::default()).is_err());
}

#[test]
fn bounds_narrow_to_the_live_region() {
    init_logging();
    let tall = SdfNode::box3d(Vec3::new(0.25, 2.0, 0.25));
    let octree = SdfOctree::build(&tall, &OctreeConfig::default()).unwrap();
    let extent = octree.bounds().extent();
    // Construction starts from a padded cube, then every level shrinks its
    // bounds to the union of its live children, so the slab shows through.
    assert!(extent.y >= 4.0);
    assert!(extent.x >= 0.5);
    assert!(extent.x < extent.y);
}

#[test]
fn leaves_are_linked() {
    init_logging();
    let octree = SdfOctree::build(&test_sphere(), &OctreeConfig::default()).unwrap();
    let stats = octree.stats();
    assert_eq!(octree.leaves().count(), stats.leaves);
    assert!(stats.leaves > 0);
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn exact_eval_matches_the_tree_near_the_surface() {
    init_logging();
    let shape = test_sphere();
    let octree = SdfOctree::build(&shape, &OctreeConfig::default()).unwrap();
    for probe in surface_probes() {
        let from_octree = octree.eval(probe, true);
        let from_tree = eval(&shape, probe);
        assert_eq!(
            from_tree.to_bits(),
            from_octree.to_bits(),
            "divergence at {:?}",
            probe
        );
    }
}

#[test]
fn far_queries_miss_without_exact() {
    init_logging();
    // Coalescing can fold the whole tree into a terminus root, which
    // answers every non-exact query from its own evaluator. Keep the
    // subdivision so the far octant is genuinely culled.
    let config = OctreeConfig {
        coalesce: false,
        ..OctreeConfig::default()
    };
    let octree = SdfOctree::build(&test_sphere(), &config).unwrap();
    assert!(octree.eval(Vec3::splat(100.0), false).is_infinite());
}

#[test]
fn octree_gradient_is_radial_on_a_sphere() {
    init_logging();
    let octree = SdfOctree::build(&test_sphere(), &OctreeConfig::default()).unwrap();
    for probe in surface_probes() {
        let n = octree.gradient(probe).normalize_or_zero();
        assert!(n.dot(probe.normalize()) > 0.99, "gradient at {:?}", probe);
    }
}

#[test]
fn octree_materials_come_from_paint() {
    init_logging();
    let red = hinoki_csg::material::Material::solid(Vec3::new(1.0, 0.0, 0.0));
    let shape = test_sphere().painted(&red, true);
    let octree = SdfOctree::build(&shape, &OctreeConfig::default()).unwrap();
    let found = octree.get_material(Vec3::X).expect("painted surface");
    assert!(hinoki_csg::material::same_material(&found, &red));
}

// ============================================================================
// Coalescing and depth limits
// ============================================================================

#[test]
fn uniform_interiors_coalesce() {
    init_logging();
    let fine = OctreeConfig {
        target_size: 0.25,
        coalesce: false,
        ..OctreeConfig::default()
    };
    let coarse = OctreeConfig {
        target_size: 0.25,
        coalesce: true,
        ..OctreeConfig::default()
    };
    let shape = SdfNode::sphere(4.0);
    let split = SdfOctree::build(&shape, &fine).unwrap();
    let merged = SdfOctree::build(&shape, &coarse).unwrap();
    assert!(merged.stats().leaves <= split.stats().leaves);
}

#[test]
fn depth_cap_marks_incomplete_and_populate_resolves_it() {
    init_logging();
    let config = OctreeConfig {
        target_size: 0.05,
        max_depth: 2,
        ..OctreeConfig::default()
    };
    let shape = test_sphere();
    let mut octree = SdfOctree::build(&shape, &config).unwrap();
    assert!(octree.stats().incomplete);
    // Depth-capped cells still answer exact queries
    let probe = Vec3::new(0.7, 0.3, 0.1);
    assert_eq!(
        eval(&shape, probe).to_bits(),
        octree.eval(probe, true).to_bits()
    );
    octree.populate();
    assert!(!octree.stats().incomplete);
    assert_eq!(
        eval(&shape, probe).to_bits(),
        octree.eval(probe, true).to_bits()
    );
}

// ============================================================================
// Descent
// ============================================================================

#[test]
fn descend_lands_in_a_containing_cell() {
    init_logging();
    let octree = SdfOctree::build(&test_sphere(), &OctreeConfig::default()).unwrap();
    for probe in surface_probes() {
        let cell = octree.descend(probe, true).expect("probe is in bounds");
        assert!(
            cell.bounds.contains(probe),
            "cell {:?} does not hold {:?}",
            cell.bounds,
            probe
        );
    }
}
