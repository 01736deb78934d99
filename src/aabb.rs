//! Axis-aligned bounding boxes with degenerate-value handling
//!
//! A box is *well formed* iff no component is NaN/Inf and `max > min` on
//! every axis. Everything derived from a degenerate box (extent, center,
//! volume, bounding cube, inflation) collapses to a zero-sized result so a
//! single bad brush can never leak NaN into an entire tree evaluation.
//!
//! Author: Moroya Sakamoto

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Construct from explicit corners
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Aabb { min, max }
    }

    /// Box spanning `-high..high` on every axis
    #[inline]
    pub fn symmetric(high: Vec3) -> Self {
        Aabb {
            min: -high,
            max: high,
        }
    }

    /// Zero-sized box at the origin
    #[inline]
    pub fn zero() -> Self {
        Aabb {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }

    /// True if this box is not well formed
    ///
    /// Any NaN or infinite component counts, as does `max <= min` on any
    /// axis. Degenerate boxes answer all derived queries with zeros.
    pub fn degenerate(&self) -> bool {
        let any_inf = !self.min.is_finite() || !self.max.is_finite();
        let any_nan = self.min.is_nan() || self.max.is_nan();
        let not_well_formed = self.max.cmple(self.min).any();
        any_inf || any_nan || not_well_formed
    }

    /// True if the other box touches this one at all
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// True if the sphere touches this box at all
    ///
    /// Conservative: the distance term measures against the full extent
    /// rather than the half extent, so the effective box is twice the
    /// linear size. May answer true for spheres that clear the real box.
    pub fn overlaps_sphere(&self, center: Vec3, radius: f32) -> bool {
        if self.degenerate() {
            return false;
        }
        let pivot = center - self.center();
        let a = pivot.abs() - self.extent();
        let box_dist = a.max(Vec3::ZERO).length() + a.max_element().min(0.0);
        box_dist - radius <= 0.0
    }

    /// True if the point is within this box
    pub fn contains(&self, point: Vec3) -> bool {
        self.min.cmple(point).all() && point.cmple(self.max).all()
    }

    /// True if the sphere is fully within this box
    ///
    /// Same full-extent distance term as [`overlaps_sphere`], so a sphere
    /// poking slightly past a face still counts as contained as long as
    /// its center does. Callers treat this as a coarse culling test, not
    /// an exact one.
    ///
    /// [`overlaps_sphere`]: Aabb::overlaps_sphere
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        if self.degenerate() || !self.contains(center) {
            return false;
        }
        let pivot = center - self.center();
        let a = pivot.abs() - self.extent();
        let box_dist = a.max(Vec3::ZERO).length() + a.max_element().min(0.0);
        box_dist + radius <= 0.0
    }

    /// Size along each axis, or zero when degenerate
    pub fn extent(&self) -> Vec3 {
        if self.degenerate() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Box midpoint, or the origin when degenerate
    pub fn center(&self) -> Vec3 {
        if self.degenerate() {
            Vec3::ZERO
        } else {
            self.extent() * 0.5 + self.min
        }
    }

    /// Enclosed volume, or zero when degenerate
    pub fn volume(&self) -> f32 {
        if self.degenerate() {
            0.0
        } else {
            let e = self.extent();
            e.x * e.y * e.z
        }
    }

    /// Smallest cube that encloses this box, centered on the same span
    pub fn bounding_cube(&self) -> Aabb {
        if self.degenerate() {
            return Aabb::zero();
        }
        let extent = self.extent();
        let longest = extent.max_element();
        let padding = (Vec3::splat(longest) - extent) * 0.5;
        Aabb {
            min: self.min - padding,
            max: self.max + padding,
        }
    }

    /// Grow the box by a uniform margin on every side
    pub fn inflate(&self, margin: f32) -> Aabb {
        self.inflate_by(Vec3::splat(margin))
    }

    /// Grow the box by a per-axis margin on every side
    pub fn inflate_by(&self, margin: Vec3) -> Aabb {
        if self.degenerate() {
            Aabb::zero()
        } else {
            Aabb {
                min: self.min - margin,
                max: self.max + margin,
            }
        }
    }

    /// Convex union of two boxes
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Intersection of two boxes (may come out degenerate)
    pub fn intersection(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    /// True if neither corner carries an infinite component
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_and_volume() {
        let aabb = Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.extent(), Vec3::new(2.0, 4.0, 6.0));
        assert!((aabb.volume() - 48.0).abs() < 1e-5);
        assert_eq!(aabb.center(), Vec3::ZERO);
    }

    #[test]
    fn test_degenerate_zeroes_out() {
        let flipped = Aabb::new(Vec3::ONE, Vec3::ZERO);
        assert!(flipped.degenerate());
        assert_eq!(flipped.extent(), Vec3::ZERO);
        assert_eq!(flipped.center(), Vec3::ZERO);
        assert_eq!(flipped.volume(), 0.0);

        let nan = Aabb::new(Vec3::splat(f32::NAN), Vec3::ONE);
        assert!(nan.degenerate());
        assert_eq!(nan.extent(), Vec3::ZERO);
        assert_eq!(nan.bounding_cube(), Aabb::zero());

        let inf = Aabb::new(Vec3::splat(f32::NEG_INFINITY), Vec3::ONE);
        assert!(inf.degenerate());
        assert_eq!(inf.inflate(1.0), Aabb::zero());
    }

    #[test]
    fn test_bounding_cube() {
        let aabb = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 2.0, 4.0));
        let cube = aabb.bounding_cube();
        assert_eq!(cube.extent(), Vec3::splat(4.0));
        assert_eq!(cube.center(), aabb.center());
    }

    #[test]
    fn test_overlaps_sphere() {
        let aabb = Aabb::symmetric(Vec3::ONE);
        assert!(aabb.overlaps_sphere(Vec3::ZERO, 0.5));
        assert!(aabb.overlaps_sphere(Vec3::new(1.5, 0.0, 0.0), 0.6));
        assert!(!aabb.overlaps_sphere(Vec3::new(3.0, 0.0, 0.0), 0.5));
    }

    #[test]
    fn test_contains() {
        let aabb = Aabb::symmetric(Vec3::ONE);
        assert!(aabb.contains(Vec3::ZERO));
        assert!(aabb.contains(Vec3::ONE));
        assert!(!aabb.contains(Vec3::new(1.1, 0.0, 0.0)));
        assert!(aabb.contains_sphere(Vec3::ZERO, 0.5));
        // The full-extent distance term tolerates a sphere whose center is
        // inside even when its skin pokes past a face.
        assert!(aabb.contains_sphere(Vec3::new(0.9, 0.0, 0.0), 0.5));
        assert!(!aabb.contains_sphere(Vec3::new(0.9, 0.0, 0.0), 1.2));
        assert!(!aabb.contains_sphere(Vec3::new(1.5, 0.0, 0.0), 0.5));
    }
}
