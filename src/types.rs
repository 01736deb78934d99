//! CSG expression tree
//!
//! The model is a tree of four node families:
//! - [`BrushNode`]: a posed primitive shape, optionally painted
//! - [`SetNode`]: union / intersection / difference, hard or smooth-blended
//! - [`FlateNode`]: uniform offset of the child surface
//! - [`StencilNode`]: material-only override masked by a second tree
//!
//! Nodes own their children by `Box`; stencil masks are `Arc`-shared so
//! clipped copies of a tree keep pointing at one mask. Materials are likewise
//! `Arc`-shared and compared by pointer identity, never by value.
//!
//! This module is structural only. Distance evaluation lives in [`crate::eval`],
//! interval pruning in [`crate::clip`], bounds in [`crate::bounds`], and the
//! bytecode path in [`crate::compiled`].
//!
//! Author: Moroya Sakamoto

use crate::aabb::Aabb;
use crate::material::MaterialShared;
use crate::primitives::*;
use crate::transform::TransformMachine;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================
// Brush shapes
// ============================================================

/// Closed-form primitive carried by a [`BrushNode`]
///
/// All shapes are centered on the local origin, Y-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BrushShape {
    /// Sphere of the given radius
    Sphere {
        /// Radius
        radius: f32,
    },
    /// Axis-aligned ellipsoid
    Ellipsoid {
        /// Per-axis radii
        radii: Vec3,
    },
    /// Axis-aligned box
    Box3d {
        /// Half extent along each axis
        half_extents: Vec3,
    },
    /// Torus lying in the XZ plane
    Torus {
        /// Ring radius
        major_radius: f32,
        /// Tube radius
        minor_radius: f32,
    },
    /// Cylinder along the Y axis
    Cylinder {
        /// Radius
        radius: f32,
        /// Half height
        half_height: f32,
    },
    /// Half space through the origin, interior on the anti-normal side
    Plane {
        /// Unit outward normal
        normal: Vec3,
    },
    /// Cone along the Y axis, base at the bottom, apex at the top
    Cone {
        /// Base radius
        radius: f32,
        /// Half height
        half_height: f32,
    },
    /// Truncated cone along the Y axis
    CappedCone {
        /// Radius at the bottom cap
        base_radius: f32,
        /// Radius at the top cap
        top_radius: f32,
        /// Half height
        half_height: f32,
    },
}

impl BrushShape {
    /// Exact signed distance in brush-local space
    #[inline(always)]
    pub fn distance(&self, local: Vec3) -> f32 {
        match *self {
            BrushShape::Sphere { radius } => sdf_sphere(local, radius),
            BrushShape::Ellipsoid { radii } => sdf_ellipsoid(local, radii),
            BrushShape::Box3d { half_extents } => sdf_box3d(local, half_extents),
            BrushShape::Torus {
                major_radius,
                minor_radius,
            } => sdf_torus(local, major_radius, minor_radius),
            BrushShape::Cylinder {
                radius,
                half_height,
            } => sdf_cylinder(local, radius, half_height),
            BrushShape::Plane { normal } => sdf_plane(local, normal),
            BrushShape::Cone {
                radius,
                half_height,
            } => sdf_cone(local, radius, half_height),
            BrushShape::CappedCone {
                base_radius,
                top_radius,
                half_height,
            } => sdf_capped_cone(local, base_radius, top_radius, half_height),
        }
    }

    /// Shader function name used by the textual compile path
    pub fn name(&self) -> &'static str {
        match self {
            BrushShape::Sphere { .. } => "SphereBrush",
            BrushShape::Ellipsoid { .. } => "EllipsoidBrush",
            BrushShape::Box3d { .. } => "BoxBrush",
            BrushShape::Torus { .. } => "TorusBrush",
            BrushShape::Cylinder { .. } => "CylinderBrush",
            BrushShape::Plane { .. } => "Plane",
            BrushShape::Cone { .. } => "ConeBrush",
            BrushShape::CappedCone { .. } => "CappedConeBrush",
        }
    }

    /// Scalar parameters in emission order, plus how many are live
    pub fn params(&self) -> ([f32; 4], usize) {
        match *self {
            BrushShape::Sphere { radius } => ([radius, 0.0, 0.0, 0.0], 1),
            BrushShape::Ellipsoid { radii } => ([radii.x, radii.y, radii.z, 0.0], 3),
            BrushShape::Box3d { half_extents } => {
                ([half_extents.x, half_extents.y, half_extents.z, 0.0], 3)
            }
            BrushShape::Torus {
                major_radius,
                minor_radius,
            } => ([major_radius, minor_radius, 0.0, 0.0], 2),
            BrushShape::Cylinder {
                radius,
                half_height,
            } => ([radius, half_height, 0.0, 0.0], 2),
            BrushShape::Plane { normal } => ([normal.x, normal.y, normal.z, 0.0], 3),
            BrushShape::Cone {
                radius,
                half_height,
            } => ([radius, half_height, 0.0, 0.0], 2),
            BrushShape::CappedCone {
                base_radius,
                top_radius,
                half_height,
            } => ([base_radius, top_radius, half_height, 0.0], 3),
        }
    }

    /// Brush-local bounding box
    ///
    /// The plane is unbounded; when its normal is exactly axis-aligned the
    /// interior half space clamps that one axis, the rest stay infinite.
    pub fn local_bounds(&self) -> Aabb {
        match *self {
            BrushShape::Sphere { radius } => Aabb::symmetric(Vec3::splat(radius)),
            BrushShape::Ellipsoid { radii } => Aabb::symmetric(radii),
            BrushShape::Box3d { half_extents } => Aabb::symmetric(half_extents),
            BrushShape::Torus {
                major_radius,
                minor_radius,
            } => {
                let reach = major_radius + minor_radius;
                Aabb::symmetric(Vec3::new(reach, minor_radius, reach))
            }
            BrushShape::Cylinder {
                radius,
                half_height,
            }
            | BrushShape::Cone {
                radius,
                half_height,
            } => Aabb::symmetric(Vec3::new(radius, half_height, radius)),
            BrushShape::CappedCone {
                base_radius,
                top_radius,
                half_height,
            } => {
                let radius = base_radius.max(top_radius);
                Aabb::symmetric(Vec3::new(radius, half_height, radius))
            }
            BrushShape::Plane { normal } => {
                let mut bounds = Aabb {
                    min: Vec3::splat(f32::NEG_INFINITY),
                    max: Vec3::splat(f32::INFINITY),
                };
                for axis in 0..3 {
                    let mut unit = Vec3::ZERO;
                    unit[axis] = 1.0;
                    if normal == unit {
                        bounds.max[axis] = 0.0;
                    } else if normal == -unit {
                        bounds.min[axis] = 0.0;
                    }
                }
                bounds
            }
        }
    }
}

// ============================================================
// Node families
// ============================================================

/// A posed, optionally painted primitive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrushNode {
    /// The primitive shape
    pub shape: BrushShape,
    /// Accumulated pose edits
    pub transform: TransformMachine,
    /// Paint, if any; shared by pointer identity
    pub material: Option<MaterialShared>,
}

impl BrushNode {
    /// Unposed, unpainted brush
    pub fn new(shape: BrushShape) -> Self {
        BrushNode {
            shape,
            transform: TransformMachine::new(),
            material: None,
        }
    }
}

/// Set operator family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetFamily {
    /// Boolean or
    Union,
    /// Boolean and
    Inter,
    /// Left minus right
    Diff,
}

/// A binary set operator, hard or smooth-blended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetNode {
    /// Which operator
    pub family: SetFamily,
    /// Blend threshold; `None` means the hard operator
    pub blend: Option<f32>,
    /// Left operand
    pub lhs: Box<SdfNode>,
    /// Right operand
    pub rhs: Box<SdfNode>,
}

impl SetNode {
    /// Build a set node, canonicalizing operand order
    ///
    /// Commutative operators put the operand with the larger interpreter
    /// stack requirement on the left, which keeps the compiled stack depth
    /// at its minimum. Diff is order-sensitive and is left alone.
    pub fn new(family: SetFamily, blend: Option<f32>, lhs: SdfNode, rhs: SdfNode) -> Self {
        let blend = blend.filter(|threshold| *threshold > 0.0);
        let (lhs, rhs) = if family != SetFamily::Diff && rhs.stack_size() > lhs.stack_size() {
            (rhs, lhs)
        } else {
            (lhs, rhs)
        };
        SetNode {
            family,
            blend,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

/// Uniform surface offset
///
/// Positive radii inflate the child, negative radii erode it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlateNode {
    /// The offset child
    pub child: Box<SdfNode>,
    /// Signed offset distance
    pub radius: f32,
}

/// Material-only mask override
///
/// Distance comes from the child untouched. Material lookup consults the
/// mask tree: where the query point is on the selected side of the mask
/// surface, the stencil's material wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StencilNode {
    /// The shaded child
    pub child: Box<SdfNode>,
    /// Mask tree, shared across clipped copies
    pub mask: Arc<SdfNode>,
    /// Override material
    pub material: MaterialShared,
    /// Override where the mask is negative (inside) when true, positive otherwise
    pub apply_to_negative: bool,
}

/// A node in the CSG expression tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SdfNode {
    /// Posed primitive
    Brush(BrushNode),
    /// Set operator
    Set(SetNode),
    /// Surface offset
    Flate(FlateNode),
    /// Material mask
    Stencil(StencilNode),
}

// ============================================================
// Constructors
// ============================================================

impl SdfNode {
    /// Sphere of the given radius
    pub fn sphere(radius: f32) -> Self {
        SdfNode::Brush(BrushNode::new(BrushShape::Sphere { radius }))
    }

    /// Axis-aligned ellipsoid with the given per-axis radii
    pub fn ellipsoid(radii: Vec3) -> Self {
        SdfNode::Brush(BrushNode::new(BrushShape::Ellipsoid { radii }))
    }

    /// Axis-aligned box with the given half extents
    pub fn box3d(half_extents: Vec3) -> Self {
        SdfNode::Brush(BrushNode::new(BrushShape::Box3d { half_extents }))
    }

    /// Torus in the XZ plane
    pub fn torus(major_radius: f32, minor_radius: f32) -> Self {
        SdfNode::Brush(BrushNode::new(BrushShape::Torus {
            major_radius,
            minor_radius,
        }))
    }

    /// Cylinder along the Y axis
    pub fn cylinder(radius: f32, half_height: f32) -> Self {
        SdfNode::Brush(BrushNode::new(BrushShape::Cylinder {
            radius,
            half_height,
        }))
    }

    /// Half space through the origin; the normal is normalized here
    pub fn plane(normal: Vec3) -> Self {
        SdfNode::Brush(BrushNode::new(BrushShape::Plane {
            normal: normal.normalize(),
        }))
    }

    /// Cone along the Y axis, apex up
    pub fn cone(radius: f32, half_height: f32) -> Self {
        SdfNode::Brush(BrushNode::new(BrushShape::Cone {
            radius,
            half_height,
        }))
    }

    /// Truncated cone along the Y axis
    pub fn capped_cone(base_radius: f32, top_radius: f32, half_height: f32) -> Self {
        SdfNode::Brush(BrushNode::new(BrushShape::CappedCone {
            base_radius,
            top_radius,
            half_height,
        }))
    }

    // ============================================================
    // Combinators
    // ============================================================

    /// Hard union with another tree
    pub fn union(self, rhs: SdfNode) -> Self {
        SdfNode::Set(SetNode::new(SetFamily::Union, None, self, rhs))
    }

    /// Hard intersection with another tree
    pub fn inter(self, rhs: SdfNode) -> Self {
        SdfNode::Set(SetNode::new(SetFamily::Inter, None, self, rhs))
    }

    /// Hard subtraction of another tree from this one
    pub fn diff(self, rhs: SdfNode) -> Self {
        SdfNode::Set(SetNode::new(SetFamily::Diff, None, self, rhs))
    }

    /// Smooth union; a non-positive threshold degrades to the hard operator
    pub fn blend_union(self, threshold: f32, rhs: SdfNode) -> Self {
        SdfNode::Set(SetNode::new(SetFamily::Union, Some(threshold), self, rhs))
    }

    /// Smooth intersection
    pub fn blend_inter(self, threshold: f32, rhs: SdfNode) -> Self {
        SdfNode::Set(SetNode::new(SetFamily::Inter, Some(threshold), self, rhs))
    }

    /// Smooth subtraction
    pub fn blend_diff(self, threshold: f32, rhs: SdfNode) -> Self {
        SdfNode::Set(SetNode::new(SetFamily::Diff, Some(threshold), self, rhs))
    }

    /// Offset the surface outward (positive) or inward (negative)
    pub fn flate(self, radius: f32) -> Self {
        SdfNode::Flate(FlateNode {
            child: Box::new(self),
            radius,
        })
    }

    /// Mask this tree's material by a second tree
    pub fn stencil(self, mask: SdfNode, material: MaterialShared, apply_to_negative: bool) -> Self {
        SdfNode::Stencil(StencilNode {
            child: Box::new(self),
            mask: Arc::new(mask),
            material,
            apply_to_negative,
        })
    }

    // ============================================================
    // Pose edits
    // ============================================================

    /// Translate the whole subtree
    pub fn move_by(&mut self, offset: Vec3) {
        match self {
            SdfNode::Brush(brush) => brush.transform.move_by(offset),
            SdfNode::Set(set) => {
                set.lhs.move_by(offset);
                set.rhs.move_by(offset);
            }
            SdfNode::Flate(flate) => flate.child.move_by(offset),
            SdfNode::Stencil(stencil) => {
                stencil.child.move_by(offset);
                Arc::make_mut(&mut stencil.mask).move_by(offset);
            }
        }
    }

    /// Rotate the whole subtree about the world origin
    pub fn rotate(&mut self, rotation: Quat) {
        match self {
            SdfNode::Brush(brush) => brush.transform.rotate(rotation),
            SdfNode::Set(set) => {
                set.lhs.rotate(rotation);
                set.rhs.rotate(rotation);
            }
            SdfNode::Flate(flate) => flate.child.rotate(rotation),
            SdfNode::Stencil(stencil) => {
                stencil.child.rotate(rotation);
                Arc::make_mut(&mut stencil.mask).rotate(rotation);
            }
        }
    }

    /// Uniformly scale the whole subtree about the world origin
    ///
    /// Blend thresholds and flate radii are world-space widths, so they
    /// scale along with the geometry.
    pub fn scale_by(&mut self, factor: f32) {
        match self {
            SdfNode::Brush(brush) => brush.transform.scale_by(factor),
            SdfNode::Set(set) => {
                set.lhs.scale_by(factor);
                set.rhs.scale_by(factor);
                if let Some(threshold) = set.blend.as_mut() {
                    *threshold *= factor;
                }
            }
            SdfNode::Flate(flate) => {
                flate.child.scale_by(factor);
                flate.radius *= factor;
            }
            SdfNode::Stencil(stencil) => {
                stencil.child.scale_by(factor);
                Arc::make_mut(&mut stencil.mask).scale_by(factor);
            }
        }
    }

    /// Rotate about the X axis by degrees
    pub fn rotate_x(&mut self, degrees: f32) {
        self.rotate(Quat::from_rotation_x(degrees.to_radians()));
    }

    /// Rotate about the Y axis by degrees
    pub fn rotate_y(&mut self, degrees: f32) {
        self.rotate(Quat::from_rotation_y(degrees.to_radians()));
    }

    /// Rotate about the Z axis by degrees
    pub fn rotate_z(&mut self, degrees: f32) {
        self.rotate(Quat::from_rotation_z(degrees.to_radians()));
    }

    /// Rotate the local +Y axis onto the given direction
    pub fn align(&mut self, direction: Vec3) {
        self.rotate(Quat::from_rotation_arc(Vec3::Y, direction.normalize()));
    }

    /// Chainable [`move_by`](Self::move_by)
    pub fn moved(mut self, offset: Vec3) -> Self {
        self.move_by(offset);
        self
    }

    /// Chainable [`rotate`](Self::rotate)
    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotate(rotation);
        self
    }

    /// Chainable [`scale_by`](Self::scale_by)
    pub fn scaled(mut self, factor: f32) -> Self {
        self.scale_by(factor);
        self
    }

    // ============================================================
    // Materials
    // ============================================================

    /// Paint every brush in the subtree
    ///
    /// Without `force` only unpainted brushes take the material, so inner
    /// paints survive an outer repaint.
    pub fn apply_material(&mut self, material: &MaterialShared, force: bool) {
        match self {
            SdfNode::Brush(brush) => {
                if force || brush.material.is_none() {
                    brush.material = Some(Arc::clone(material));
                }
            }
            SdfNode::Set(set) => {
                set.lhs.apply_material(material, force);
                set.rhs.apply_material(material, force);
            }
            SdfNode::Flate(flate) => flate.child.apply_material(material, force),
            SdfNode::Stencil(stencil) => stencil.child.apply_material(material, force),
        }
    }

    /// Chainable [`apply_material`](Self::apply_material)
    pub fn painted(mut self, material: &MaterialShared, force: bool) -> Self {
        self.apply_material(material, force);
        self
    }

    /// Visit every material reachable from shaded geometry
    ///
    /// Mask trees are not visited; they gate lookup but never shade.
    pub fn walk_materials(&self, visit: &mut dyn FnMut(&MaterialShared)) {
        match self {
            SdfNode::Brush(brush) => {
                if let Some(material) = &brush.material {
                    visit(material);
                }
            }
            SdfNode::Set(set) => {
                set.lhs.walk_materials(visit);
                set.rhs.walk_materials(visit);
            }
            SdfNode::Flate(flate) => flate.child.walk_materials(visit),
            SdfNode::Stencil(stencil) => {
                visit(&stencil.material);
                stencil.child.walk_materials(visit);
            }
        }
    }

    /// True when anything in the subtree carries paint
    pub fn has_paint(&self) -> bool {
        match self {
            SdfNode::Brush(brush) => brush.material.is_some(),
            SdfNode::Set(set) => set.lhs.has_paint() || set.rhs.has_paint(),
            SdfNode::Flate(flate) => flate.child.has_paint(),
            SdfNode::Stencil(_) => true,
        }
    }

    // ============================================================
    // Shape queries
    // ============================================================

    /// Number of brush leaves reachable through evaluation
    ///
    /// Stencil masks are excluded: material lookup touches them, distance
    /// evaluation never does.
    pub fn leaf_count(&self) -> usize {
        match self {
            SdfNode::Brush(_) => 1,
            SdfNode::Set(set) => set.lhs.leaf_count() + set.rhs.leaf_count(),
            SdfNode::Flate(flate) => flate.child.leaf_count(),
            SdfNode::Stencil(stencil) => stencil.child.leaf_count(),
        }
    }

    /// Interpreter stack slots this tree needs
    pub fn stack_size(&self) -> usize {
        self.stack_size_at(1)
    }

    /// Stack requirement when evaluation starts `depth` slots deep
    ///
    /// A set operator holds its left result on the stack while the right
    /// side runs one slot deeper; commutative constructors exploit this by
    /// putting the deeper operand on the left.
    pub fn stack_size_at(&self, depth: usize) -> usize {
        match self {
            SdfNode::Brush(_) => depth,
            SdfNode::Set(set) => (depth + 1)
                .max(set.lhs.stack_size_at(depth))
                .max(set.rhs.stack_size_at(depth + 1)),
            SdfNode::Flate(flate) => flate.child.stack_size_at(depth),
            SdfNode::Stencil(stencil) => stencil.child.stack_size_at(depth),
        }
    }

    /// Canonicalize every pending pose run in place
    ///
    /// Shared stencil masks are only folded when this tree holds the last
    /// reference; evaluation reads pure folded views either way, so a mask
    /// left pending is slower, never wrong.
    pub fn fold_transforms(&mut self) {
        match self {
            SdfNode::Brush(brush) => brush.transform.fold(),
            SdfNode::Set(set) => {
                set.lhs.fold_transforms();
                set.rhs.fold_transforms();
            }
            SdfNode::Flate(flate) => flate.child.fold_transforms(),
            SdfNode::Stencil(stencil) => {
                stencil.child.fold_transforms();
                if let Some(mask) = Arc::get_mut(&mut stencil.mask) {
                    mask.fold_transforms();
                }
            }
        }
    }

    /// Copy of this tree with transforms folded
    pub fn folded(&self) -> SdfNode {
        let mut out = self.clone();
        out.fold_transforms();
        out
    }

    /// One-line structural dump for logs and tests
    pub fn pretty(&self) -> String {
        match self {
            SdfNode::Brush(brush) => {
                let (params, count) = brush.shape.params();
                let params: Vec<String> =
                    params[..count].iter().map(|p| format!("{:.3}", p)).collect();
                let name = format!("{}({})", brush.shape.name(), params.join(", "));
                brush.transform.pretty(&name)
            }
            SdfNode::Set(set) => {
                let family = match set.family {
                    SetFamily::Union => "Union",
                    SetFamily::Inter => "Inter",
                    SetFamily::Diff => "Diff",
                };
                match set.blend {
                    Some(threshold) => format!(
                        "Blend{}({:.3}, {}, {})",
                        family,
                        threshold,
                        set.lhs.pretty(),
                        set.rhs.pretty()
                    ),
                    None => format!("{}({}, {})", family, set.lhs.pretty(), set.rhs.pretty()),
                }
            }
            SdfNode::Flate(flate) => {
                format!("Flate({:.3}, {})", flate.radius, flate.child.pretty())
            }
            SdfNode::Stencil(stencil) => format!(
                "Stencil({}, mask: {})",
                stencil.child.pretty(),
                stencil.mask.pretty()
            ),
        }
    }
}

impl PartialEq for SdfNode {
    /// Structural equality
    ///
    /// Poses compare by their folded views, materials and stencil masks by
    /// pointer identity plus structure respectively.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SdfNode::Brush(a), SdfNode::Brush(b)) => {
                a.shape == b.shape
                    && a.transform == b.transform
                    && crate::material::same_material_opt(&a.material, &b.material)
            }
            (SdfNode::Set(a), SdfNode::Set(b)) => {
                a.family == b.family
                    && a.blend == b.blend
                    && a.lhs == b.lhs
                    && a.rhs == b.rhs
            }
            (SdfNode::Flate(a), SdfNode::Flate(b)) => {
                a.radius == b.radius && a.child == b.child
            }
            (SdfNode::Stencil(a), SdfNode::Stencil(b)) => {
                a.apply_to_negative == b.apply_to_negative
                    && crate::material::same_material(&a.material, &b.material)
                    && (Arc::ptr_eq(&a.mask, &b.mask) || a.mask == b.mask)
                    && a.child == b.child
            }
            _ => false,
        }
    }
}
