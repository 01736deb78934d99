//! Interval pruning of CSG trees
//!
//! [`clip`] answers "which parts of this tree can influence distances within
//! `radius` of `point`" by rebuilding the tree with out-of-range subtrees
//! dropped. The octree clips each child cell against its parent's already
//! clipped evaluator, so deep cells end up with tiny trees.
//!
//! Pruning is conservative per node but the composition can over-drop near
//! blend seams, so callers must re-check `|eval(clipped, point)| <= radius`
//! and discard the clip when it fails.
//!
//! Author: Moroya Sakamoto

use crate::bounds;
use crate::eval::eval;
use crate::types::{SdfNode, SetFamily, SetNode};
use glam::Vec3;
use std::sync::Arc;

/// Prune the tree to what can matter within `radius` of `point`
///
/// Returns `None` when nothing in the tree reaches the query ball.
pub fn clip(node: &SdfNode, point: Vec3, radius: f32) -> Option<SdfNode> {
    match node {
        SdfNode::Brush(brush) => {
            // Cheap reject before touching the field. `overlaps_sphere`
            // over-reports, so a miss here guarantees the eval below
            // would also miss. Unbounded brushes skip the check.
            let aabb = bounds::bounds(node);
            if !aabb.degenerate() && !aabb.overlaps_sphere(point, radius) {
                return None;
            }
            if eval(node, point) <= radius {
                Some(SdfNode::Brush(brush.clone()))
            } else {
                None
            }
        }
        SdfNode::Set(set) => clip_set(set, point, radius),
        SdfNode::Flate(flate) => {
            // The offset surface reaches `radius + |offset|` further out.
            let child = clip(&flate.child, point, radius + flate.radius.abs())?;
            Some(child.flate(flate.radius))
        }
        SdfNode::Stencil(stencil) => {
            let child = clip(&stencil.child, point, radius)?;
            Some(child_with_mask(stencil, child))
        }
    }
}

fn child_with_mask(stencil: &crate::types::StencilNode, child: SdfNode) -> SdfNode {
    SdfNode::Stencil(crate::types::StencilNode {
        child: Box::new(child),
        mask: Arc::clone(&stencil.mask),
        material: Arc::clone(&stencil.material),
        apply_to_negative: stencil.apply_to_negative,
    })
}

fn clip_set(set: &SetNode, point: Vec3, radius: f32) -> Option<SdfNode> {
    if let Some(threshold) = set.blend {
        // Inside the blend seam either operand can bend the field, so both
        // get the widened query ball.
        let lhs = clip(&set.lhs, point, radius + threshold);
        let rhs = clip(&set.rhs, point, radius + threshold);
        match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => {
                return Some(SdfNode::Set(SetNode::new(
                    set.family,
                    Some(threshold),
                    lhs,
                    rhs,
                )));
            }
            (lhs, rhs) => {
                // One side out of reach: the seam is too, degrade to the
                // hard operator's survival rules.
                return hard_survivors(set.family, lhs, rhs);
            }
        }
    }

    let lhs = clip(&set.lhs, point, radius);
    let rhs = clip(&set.rhs, point, radius);
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => Some(SdfNode::Set(SetNode::new(set.family, None, lhs, rhs))),
        (lhs, rhs) => hard_survivors(set.family, lhs, rhs),
    }
}

/// Hard-operator rules when at most one operand survived the clip
fn hard_survivors(
    family: SetFamily,
    lhs: Option<SdfNode>,
    rhs: Option<SdfNode>,
) -> Option<SdfNode> {
    match family {
        // Union degrades to whichever side is still in range.
        SetFamily::Union => lhs.or(rhs),
        // Intersection needs both operands to produce any interior.
        SetFamily::Inter => None,
        // Out-of-range subtrahend cannot carve anything nearby.
        SetFamily::Diff => lhs,
    }
}
