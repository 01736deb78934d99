//! Common test helpers for Hinoki CSG integration tests
//!
//! Author: Moroya Sakamoto

use hinoki_csg::prelude::*;
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Initialize env_logger once for the whole test binary
pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

// ============================================================================
// Standard test shapes
// ============================================================================

/// Unit sphere at origin
pub fn test_sphere() -> SdfNode {
    SdfNode::sphere(1.0)
}

/// Unit box at origin
pub fn test_box() -> SdfNode {
    SdfNode::box3d(Vec3::splat(0.5))
}

/// CSG shape: sphere with a box carved out
pub fn test_csg() -> SdfNode {
    SdfNode::sphere(1.0).diff(SdfNode::box3d(Vec3::splat(0.6)))
}

/// Multi-operation shape with poses and a smooth seam
pub fn test_complex_shape() -> SdfNode {
    let base = SdfNode::sphere(1.0);
    let cut = SdfNode::box3d(Vec3::new(0.5, 2.0, 0.5)).moved(Vec3::new(0.5, 0.0, 0.0));
    let torus = SdfNode::torus(0.8, 0.2).moved(Vec3::new(0.0, 1.0, 0.0));
    base.diff(cut).blend_union(0.1, torus)
}

// ============================================================================
// Standard test points
// ============================================================================

/// Canonical probe points: origin, axes, diagonals, surface, far field
pub fn test_points() -> Vec<Vec3> {
    vec![
        Vec3::ZERO,
        Vec3::X,
        Vec3::Y,
        Vec3::Z,
        Vec3::NEG_X,
        Vec3::splat(0.5),
        Vec3::new(-0.5, 0.25, 0.75),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, -1.0, 0.0),
        Vec3::splat(2.0),
        Vec3::new(-3.0, 1.5, 0.25),
        Vec3::new(10.0, -10.0, 10.0),
    ]
}
