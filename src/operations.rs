//! CSG set-operator math
//!
//! Hard operators are plain min/max; the smooth variants use the quadratic
//! polynomial blend parameterized by a world-space threshold. These exact
//! formulas are what the bytecode interpreter executes, so a GPU interpreter
//! emitting the same opcode stream reproduces them bit for bit.
//!
//! Author: Moroya Sakamoto

/// Hard union: minimum distance
#[inline(always)]
pub fn union_op(lhs: f32, rhs: f32) -> f32 {
    lhs.min(rhs)
}

/// Hard intersection: maximum distance
#[inline(always)]
pub fn inter_op(lhs: f32, rhs: f32) -> f32 {
    lhs.max(rhs)
}

/// Hard difference: intersect with the negated right operand
#[inline(always)]
pub fn diff_op(lhs: f32, rhs: f32) -> f32 {
    lhs.max(-rhs)
}

/// Smooth union with quadratic blend of width `threshold`
///
/// Strictly below the hard union inside the blend region, equal outside it.
#[inline(always)]
pub fn smooth_union_op(lhs: f32, rhs: f32, threshold: f32) -> f32 {
    let h = (threshold - (lhs - rhs).abs()).max(0.0);
    lhs.min(rhs) - h * h * 0.25 / threshold
}

/// Smooth intersection with quadratic blend of width `threshold`
#[inline(always)]
pub fn smooth_inter_op(lhs: f32, rhs: f32, threshold: f32) -> f32 {
    let h = (threshold - (lhs - rhs).abs()).max(0.0);
    lhs.max(rhs) + h * h * 0.25 / threshold
}

/// Smooth difference with quadratic blend of width `threshold`
#[inline(always)]
pub fn smooth_diff_op(lhs: f32, rhs: f32, threshold: f32) -> f32 {
    let h = (threshold - (lhs + rhs).abs()).max(0.0);
    lhs.max(-rhs) + h * h * 0.25 / threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_ops() {
        assert_eq!(union_op(1.0, 2.0), 1.0);
        assert_eq!(inter_op(1.0, 2.0), 2.0);
        assert_eq!(diff_op(1.0, 2.0), 1.0);
        assert_eq!(diff_op(1.0, -2.0), 2.0);
    }

    #[test]
    fn test_smooth_union_softens() {
        // Inside the blend region the smooth result must dip below min.
        let d = smooth_union_op(0.1, 0.15, 0.5);
        assert!(d < union_op(0.1, 0.15));
        // Far outside the blend region they agree.
        let d = smooth_union_op(0.1, 5.0, 0.5);
        assert!((d - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_smooth_inter_hardens() {
        let d = smooth_inter_op(0.1, 0.15, 0.5);
        assert!(d > inter_op(0.1, 0.15));
    }

    #[test]
    fn test_smooth_diff_matches_inter_of_negation() {
        // diff(a, b) == inter(a, -b) must also hold for the smooth pair.
        let (a, b, k) = (0.2, -0.1, 0.4);
        let lhs = smooth_diff_op(a, b, k);
        let rhs = smooth_inter_op(a, -b, k);
        assert!((lhs - rhs).abs() < 1e-6);
    }
}
