//! Sphere tracing against the distance field
//!
//! Author: Moroya Sakamoto

use crate::eval::eval;
use crate::types::SdfNode;
use glam::Vec3;

/// Ray marching tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct RaymarchConfig {
    /// Give up after this many steps
    pub max_steps: u32,
    /// Distance at which the surface counts as hit
    pub epsilon: f32,
    /// Stop once the ray has traveled this far
    pub max_travel: f32,
}

impl Default for RaymarchConfig {
    fn default() -> Self {
        RaymarchConfig {
            max_steps: 128,
            epsilon: 1e-4,
            max_travel: 1e3,
        }
    }
}

impl RaymarchConfig {
    /// Tighter epsilon and more steps for offline use
    pub fn high_quality() -> Self {
        RaymarchConfig {
            max_steps: 512,
            epsilon: 1e-5,
            max_travel: 1e4,
        }
    }
}

/// Outcome of a single marched ray
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    /// Whether the ray reached the surface
    pub hit: bool,
    /// Distance traveled along the ray; infinite on a miss
    pub travel: f32,
    /// Final ray position (the hit point when `hit`)
    pub position: Vec3,
}

impl RayHit {
    fn miss(position: Vec3) -> Self {
        RayHit {
            hit: false,
            travel: f32::INFINITY,
            position,
        }
    }
}

/// March a ray from `start` along `direction` until it hits the surface
///
/// Classic sphere tracing: each step advances by the field value, which
/// requires the tree to be a lower bound on true distance. `direction` is
/// normalized here; a zero direction is an immediate miss.
pub fn ray_march(node: &SdfNode, start: Vec3, direction: Vec3, config: &RaymarchConfig) -> RayHit {
    let direction = direction.normalize_or_zero();
    if direction == Vec3::ZERO {
        return RayHit::miss(start);
    }

    let mut travel = 0.0f32;
    for _ in 0..config.max_steps {
        let position = start + direction * travel;
        let distance = eval(node, position);
        if distance <= config.epsilon {
            return RayHit {
                hit: true,
                travel,
                position,
            };
        }
        travel += distance;
        if travel >= config.max_travel {
            break;
        }
    }
    RayHit::miss(start + direction * travel)
}
