//! Closed-form brush distance functions
//!
//! One function per brush shape, evaluated in brush-local space (the
//! `TransformMachine` has already inverse-transformed the query point by the
//! time these run). Formulas are shared verbatim by the tree evaluator and
//! the bytecode interpreter so the two paths can never drift apart.
//!
//! Shapes are Y-up: cylinders, cones and capped cones extend along the Y
//! axis; the torus lies in the XZ plane.
//!
//! Author: Moroya Sakamoto

use glam::{Vec2, Vec3};

/// Signed distance to a sphere centered at the origin
#[inline(always)]
pub fn sdf_sphere(point: Vec3, radius: f32) -> f32 {
    point.length() - radius
}

/// Signed distance to an axis-aligned box by half-extents
#[inline(always)]
pub fn sdf_box3d(point: Vec3, half_extents: Vec3) -> f32 {
    let q = point.abs() - half_extents;
    q.max(Vec3::ZERO).length() + q.x.max(q.y.max(q.z)).min(0.0)
}

/// Approximate signed distance to an ellipsoid by semi-axis radii
///
/// Exact on the axes, a bound elsewhere (the usual k0/k1 scaling trick).
#[inline(always)]
pub fn sdf_ellipsoid(point: Vec3, radii: Vec3) -> f32 {
    // Guard against zero radii (division by zero in point / radii)
    let safe = radii.max(Vec3::splat(1e-10));
    let k0 = (point / safe).length();
    let k1 = (point / (safe * safe)).length();
    if k1 > 0.0 {
        k0 * (k0 - 1.0) / k1
    } else {
        -safe.min_element()
    }
}

/// Signed distance to a torus in the XZ plane
#[inline(always)]
pub fn sdf_torus(point: Vec3, major_radius: f32, minor_radius: f32) -> f32 {
    let q = Vec2::new(
        Vec2::new(point.x, point.z).length() - major_radius,
        point.y,
    );
    q.length() - minor_radius
}

/// Signed distance to a capped cylinder along the Y axis
#[inline(always)]
pub fn sdf_cylinder(point: Vec3, radius: f32, half_height: f32) -> f32 {
    let d = Vec2::new(
        Vec2::new(point.x, point.z).length() - radius,
        point.y.abs() - half_height,
    );
    d.x.max(d.y).min(0.0) + d.max(Vec2::ZERO).length()
}

/// Signed distance to a half-space through the origin
#[inline(always)]
pub fn sdf_plane(point: Vec3, normal: Vec3) -> f32 {
    point.dot(normal)
}

/// Signed distance to a capped cone along the Y axis
///
/// Base radius `r1` at `-half_height`, top radius `r2` at `+half_height`.
/// A plain cone is the `r2 = 0` special case.
#[inline(always)]
pub fn sdf_capped_cone(point: Vec3, r1: f32, r2: f32, half_height: f32) -> f32 {
    let h = half_height;
    let q = Vec2::new(Vec2::new(point.x, point.z).length(), point.y);
    let k1 = Vec2::new(r2, h);
    let k2 = Vec2::new(r2 - r1, 2.0 * h);

    let min_r = if q.y < 0.0 { r1 } else { r2 };
    let ca = Vec2::new(q.x - q.x.min(min_r), q.y.abs() - h);
    let k2_dot = k2.dot(k2);
    let t = if k2_dot > 1e-4 {
        ((k1 - q).dot(k2) / k2_dot).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cb = q - k1 + k2 * t;

    let s = if cb.x < 0.0 && ca.y < 0.0 { -1.0 } else { 1.0 };
    s * ca.dot(ca).min(cb.dot(cb)).sqrt()
}

/// Signed distance to a cone along the Y axis (apex up)
#[inline(always)]
pub fn sdf_cone(point: Vec3, radius: f32, half_height: f32) -> f32 {
    sdf_capped_cone(point, radius, 0.0, half_height)
}
