//! Poses and the lazily-folded brush transform machine
//!
//! Two representations live here:
//! - [`Transform`]: a plain translation + rotation + uniform scale pose,
//!   owned by whatever entity is being posed.
//! - [`TransformMachine`]: the accumulator brushes carry. Successive
//!   move/rotate/scale edits are batched into "runs" and only folded into a
//!   translation or a full matrix pair when the pose is actually consumed.
//!   The fold state is monotonic: `Identity -> Offset -> Matrix`, never
//!   backwards.
//!
//! Evaluation paths take `&self`, so consumption goes through a pure
//! [`TransformMachine::folded`] view; `fold()` canonicalizes in place and is
//! only needed before sharing a tree across threads or testing equality.
//!
//! Author: Moroya Sakamoto

use crate::aabb::Aabb;
use crate::compiled::{OpCode, ProgramBuffer};
use glam::{Mat4, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// A plain affine pose: rotation, translation, uniform scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Orientation
    pub rotation: Quat,
    /// Position offset
    pub translation: Vec3,
    /// Uniform scale factor
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            rotation: Quat::IDENTITY,
            translation: Vec3::ZERO,
            scale: 1.0,
        }
    }
}

impl Transform {
    /// Identity pose
    pub fn identity() -> Self {
        Self::default()
    }

    /// Reset to identity
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Translate the pose
    pub fn move_by(&mut self, offset: Vec3) {
        self.translation += offset;
    }

    /// Rotate the pose about the origin
    pub fn rotate(&mut self, rotation: Quat) {
        self.rotation = rotation * self.rotation;
        self.translation = rotation * self.translation;
    }

    /// Scale the pose about the origin
    pub fn scale_by(&mut self, scale: f32) {
        self.scale *= scale;
        self.translation *= scale;
    }

    /// Pose that undoes this one
    pub fn inverse(&self) -> Transform {
        let inv_rotation = self.rotation.inverse();
        let inv_scale = 1.0 / self.scale;
        Transform {
            rotation: inv_rotation,
            translation: inv_rotation * (-self.translation * inv_scale),
            scale: inv_scale,
        }
    }

    /// Equivalent affine matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.translation,
        )
    }

    /// Transform a point by this pose
    pub fn apply(&self, point: Vec3) -> Vec3 {
        self.rotation * (point * self.scale) + self.translation
    }

    /// Transform a point by the inverse of this pose
    pub fn apply_inverse(&self, point: Vec3) -> Vec3 {
        (self.rotation.inverse() * (point - self.translation)) / self.scale
    }
}

/// Fold state of a [`TransformMachine`]
///
/// Ordered: folding may advance the state but never regress it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FoldState {
    /// No pose applied yet
    Identity,
    /// Pose is a pure translation
    Offset,
    /// Pose needs the full matrix pair
    Matrix,
}

/// Snapshot of a machine with all pending runs folded in
///
/// Borrowed consumption path: computing this never mutates the machine, so
/// `eval` and friends stay `&self` even when edits are still pending.
#[derive(Debug, Clone, Copy)]
pub struct Folded {
    /// Resulting fold state
    pub state: FoldState,
    /// Forward transform
    pub fold: Mat4,
    /// Inverse transform (what evaluation actually applies)
    pub fold_inverse: Mat4,
}

/// Lazily-folded brush pose accumulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformMachine {
    fold_state: FoldState,
    last_fold: Mat4,
    last_fold_inverse: Mat4,
    offset_pending: bool,
    offset_run: Vec3,
    rotate_pending: bool,
    rotate_run: Quat,
    /// Product of every uniform scale applied so far
    pub accumulated_scale: f32,
}

impl Default for TransformMachine {
    fn default() -> Self {
        TransformMachine {
            fold_state: FoldState::Identity,
            last_fold: Mat4::IDENTITY,
            last_fold_inverse: Mat4::IDENTITY,
            offset_pending: false,
            offset_run: Vec3::ZERO,
            rotate_pending: false,
            rotate_run: Quat::IDENTITY,
            accumulated_scale: 1.0,
        }
    }
}

impl TransformMachine {
    /// Fresh identity machine
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all accumulated pose edits
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Queue a translation
    ///
    /// A pending rotation run is folded first so runs of a single kind can
    /// keep accumulating cheaply.
    pub fn move_by(&mut self, offset: Vec3) {
        if self.rotate_pending {
            self.fold_rotation();
        }
        // Runs accumulate the inverse offset; the fold inverts once.
        self.offset_run -= offset;
        self.offset_pending = true;
    }

    /// Queue a rotation about the origin
    pub fn rotate(&mut self, rotation: Quat) {
        if self.offset_pending {
            self.fold_offset();
        }
        self.rotate_run = rotation * self.rotate_run;
        self.rotate_pending = true;
    }

    /// Apply a uniform scale about the origin
    ///
    /// Scaling always folds immediately and commits the machine to the
    /// `Matrix` state.
    pub fn scale_by(&mut self, scale: f32) {
        self.fold();
        self.last_fold_inverse *= Mat4::from_scale(Vec3::splat(1.0 / scale));
        self.last_fold = self.last_fold_inverse.inverse();
        self.accumulated_scale *= scale;
        self.fold_state = FoldState::Matrix;
    }

    fn fold_offset(&mut self) {
        self.last_fold_inverse *= Mat4::from_translation(self.offset_run);
        self.last_fold = self.last_fold_inverse.inverse();
        self.offset_run = Vec3::ZERO;
        self.offset_pending = false;
        self.fold_state = self.fold_state.max(FoldState::Offset);
    }

    fn fold_rotation(&mut self) {
        self.last_fold_inverse *= Mat4::from_quat(self.rotate_run).transpose();
        self.last_fold = self.last_fold_inverse.inverse();
        self.rotate_run = Quat::IDENTITY;
        self.rotate_pending = false;
        self.fold_state = FoldState::Matrix;
    }

    /// Fold any pending runs into the canonical matrix pair
    pub fn fold(&mut self) {
        if self.rotate_pending {
            self.fold_rotation();
        } else if self.offset_pending {
            self.fold_offset();
        }
    }

    /// True when `fold()` would be a no-op
    pub fn is_folded(&self) -> bool {
        !self.offset_pending && !self.rotate_pending
    }

    /// Pure folded view of the accumulated pose
    ///
    /// At most one kind of run can be pending at a time (queueing the other
    /// kind folds first), so this composes a single trailing run.
    pub fn folded(&self) -> Folded {
        if self.rotate_pending {
            let fold_inverse =
                self.last_fold_inverse * Mat4::from_quat(self.rotate_run).transpose();
            Folded {
                state: FoldState::Matrix,
                fold: fold_inverse.inverse(),
                fold_inverse,
            }
        } else if self.offset_pending {
            let fold_inverse = self.last_fold_inverse * Mat4::from_translation(self.offset_run);
            Folded {
                state: self.fold_state.max(FoldState::Offset),
                fold: fold_inverse.inverse(),
                fold_inverse,
            }
        } else {
            Folded {
                state: self.fold_state,
                fold: self.last_fold,
                fold_inverse: self.last_fold_inverse,
            }
        }
    }

    /// Transform a point into brush-local space
    #[inline]
    pub fn apply_inverse(&self, point: Vec3) -> Vec3 {
        let folded = self.folded();
        if folded.state == FoldState::Identity {
            return point;
        }
        let tmp = folded.fold_inverse * Vec4::new(point.x, point.y, point.z, 1.0);
        tmp.truncate() / tmp.w
    }

    /// Transform a point out of brush-local space
    #[inline]
    pub fn apply(&self, point: Vec3) -> Vec3 {
        let folded = self.folded();
        if folded.state == FoldState::Identity {
            return point;
        }
        let tmp = folded.fold * Vec4::new(point.x, point.y, point.z, 1.0);
        tmp.truncate() / tmp.w
    }

    /// Transform a local-space bounding box into world space
    pub fn apply_aabb(&self, bounds: Aabb) -> Aabb {
        let folded = self.folded();
        match folded.state {
            FoldState::Identity => bounds,
            FoldState::Offset => {
                let offset = folded.fold.w_axis.truncate();
                Aabb {
                    min: bounds.min + offset,
                    max: bounds.max + offset,
                }
            }
            FoldState::Matrix => {
                let a = bounds.min;
                let b = bounds.max;
                let corners = [
                    b,
                    Vec3::new(b.x, a.y, a.z),
                    Vec3::new(a.x, b.y, a.z),
                    Vec3::new(a.x, a.y, b.z),
                    Vec3::new(a.x, b.y, b.z),
                    Vec3::new(b.x, a.y, b.z),
                    Vec3::new(b.x, b.y, a.z),
                ];
                let transform = |point: Vec3| -> Vec3 {
                    let tmp = folded.fold * Vec4::new(point.x, point.y, point.z, 1.0);
                    tmp.truncate() / tmp.w
                };
                let first = transform(a);
                let mut out = Aabb {
                    min: first,
                    max: first,
                };
                for corner in corners {
                    let tmp = transform(corner);
                    out.min = out.min.min(tmp);
                    out.max = out.max.max(tmp);
                }
                out
            }
        }
    }

    /// Emit the pose as bytecode + a transformed point expression
    ///
    /// Identity passes the point expression through untouched, Offset emits
    /// 3 params, Matrix emits the 16 params of the inverse matrix. Opcode
    /// words are only appended when `with_opcodes` is set; the parameter
    /// words always are, so the textual expression's `PARAMS[..]` indices
    /// stay valid for the GPU path.
    pub fn compile(&self, with_opcodes: bool, program: &mut ProgramBuffer, point: &str) -> String {
        let folded = self.folded();
        match folded.state {
            FoldState::Identity => point.to_string(),
            FoldState::Offset => {
                if with_opcodes {
                    program.push_opcode(OpCode::Offset);
                }
                let offset = folded.fold.w_axis.truncate();
                let at = program.len();
                program.push_vector(offset);
                format!("({} - vec3({}))", point, ProgramBuffer::param_list(at, 3))
            }
            FoldState::Matrix => {
                if with_opcodes {
                    program.push_opcode(OpCode::Matrix);
                }
                let at = program.len();
                program.push_matrix(folded.fold_inverse);
                format!(
                    "MatrixTransform({}, mat4({}))",
                    point,
                    ProgramBuffer::param_list(at, 16)
                )
            }
        }
    }

    /// Debug-printer wrapper naming for a posed brush
    pub fn pretty(&self, brush: &str) -> String {
        match self.folded().state {
            FoldState::Identity => brush.to_string(),
            FoldState::Offset => format!("Move({})", brush),
            FoldState::Matrix => format!("Matrix({})", brush),
        }
    }
}

impl PartialEq for TransformMachine {
    /// Equality over the *folded* pose
    ///
    /// Both sides are viewed folded first; identical fold state plus
    /// bitwise-equal fold matrices (or both identity) count as equal.
    fn eq(&self, other: &Self) -> bool {
        let lhs = self.folded();
        let rhs = other.folded();
        if lhs.state != rhs.state {
            return false;
        }
        lhs.state == FoldState::Identity || lhs.fold == rhs.fold
    }
}
