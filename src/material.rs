//! Shared surface materials
//!
//! Materials are immutable after construction and shared between nodes
//! through [`MaterialShared`] handles. Because several brushes may hold the
//! same handle, material equality is *pointer identity*, never value
//! comparison. Two distinct materials with the same color are different
//! materials, and the octree's coalescing heuristic depends on that.
//!
//! Author: Moroya Sakamoto

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handle to an immutable material
pub type MaterialShared = Arc<Material>;

/// The color a point samples when nothing painted it
pub const NULL_COLOR: Vec4 = Vec4::new(1.0, 1.0, 1.0, 0.0);

/// Material variants
///
/// Only solid colors carry data today; the debug kinds exist so render-side
/// collaborators can tag regions without inventing out-of-band markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialKind {
    /// Flat albedo color
    SolidColor,
    /// Visualize surface normals
    DebugNormals,
    /// Visualize the distance-field gradient
    DebugGradient,
}

/// An immutable-after-construction surface material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    /// Which shading family this material belongs to
    pub kind: MaterialKind,
    /// Base color (meaningful for `SolidColor`, a guess otherwise)
    pub color: Vec3,
}

impl Material {
    /// Flat-color material wrapped in a shared handle
    pub fn solid(color: Vec3) -> MaterialShared {
        Arc::new(Material {
            kind: MaterialKind::SolidColor,
            color,
        })
    }

    /// Debug-normals material wrapped in a shared handle
    pub fn debug_normals() -> MaterialShared {
        Arc::new(Material {
            kind: MaterialKind::DebugNormals,
            color: Vec3::ONE,
        })
    }

    /// Best-effort display color for this material
    pub fn guess_color(&self) -> Vec4 {
        self.color.extend(1.0)
    }
}

/// Pointer-identity equality for shared materials
#[inline]
pub fn same_material(a: &MaterialShared, b: &MaterialShared) -> bool {
    Arc::ptr_eq(a, b)
}

/// Pointer-identity equality for optional shared materials
#[inline]
pub fn same_material_opt(a: &Option<MaterialShared>, b: &Option<MaterialShared>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}
