//! Conservative bounding boxes for CSG trees
//!
//! [`bounds`] may only over-report: every point with a negative distance
//! lies inside it. [`inner_bounds`] is the same walk minus the blend-seam
//! padding, for callers that want a tight box around the hard geometry.
//!
//! Author: Moroya Sakamoto

use crate::aabb::Aabb;
use crate::types::{SdfNode, SetFamily, SetNode};

/// Outer bounding box of the modeled solid
pub fn bounds(node: &SdfNode) -> Aabb {
    walk(node, true)
}

/// Bounding box ignoring blend-seam bulges
pub fn inner_bounds(node: &SdfNode) -> Aabb {
    walk(node, false)
}

/// True when the solid fits in a finite box
///
/// Unbounded trees (a bare plane, or a union with one) cannot be octree'd.
pub fn has_finite_bounds(node: &SdfNode) -> bool {
    bounds(node).is_finite()
}

fn walk(node: &SdfNode, liminal: bool) -> Aabb {
    match node {
        SdfNode::Brush(brush) => brush.transform.apply_aabb(brush.shape.local_bounds()),
        SdfNode::Set(set) => set_bounds(set, liminal),
        SdfNode::Flate(flate) => {
            let inner = walk(&flate.child, liminal);
            if flate.radius >= 0.0 {
                inner.inflate(flate.radius)
            } else {
                // Erosion can only shrink; the child box stays valid.
                inner
            }
        }
        SdfNode::Stencil(stencil) => walk(&stencil.child, liminal),
    }
}

fn set_bounds(set: &SetNode, liminal: bool) -> Aabb {
    let lhs = walk(&set.lhs, liminal);
    let rhs = walk(&set.rhs, liminal);
    let hard = match set.family {
        SetFamily::Union => lhs.union(&rhs),
        SetFamily::Inter => lhs.intersection(&rhs),
        SetFamily::Diff => lhs,
    };
    // Only a blended union grows material beyond the hard result; blended
    // intersection and difference both erode. The bulge lives where both
    // operands are within the threshold of each other.
    match set.blend {
        Some(threshold) if liminal && set.family == SetFamily::Union => {
            let seam = lhs
                .inflate(threshold)
                .intersection(&rhs.inflate(threshold));
            if seam.degenerate() {
                hard
            } else {
                hard.union(&seam)
            }
        }
        _ => hard,
    }
}

impl SdfNode {
    /// See [`bounds`]
    pub fn bounds(&self) -> Aabb {
        bounds(self)
    }

    /// See [`inner_bounds`]
    pub fn inner_bounds(&self) -> Aabb {
        inner_bounds(self)
    }

    /// See [`has_finite_bounds`]
    pub fn has_finite_bounds(&self) -> bool {
        has_finite_bounds(self)
    }
}
