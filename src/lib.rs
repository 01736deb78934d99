//! # Hinoki CSG
//!
//! A procedural geometry kernel built on signed distance functions.
//!
//! Models are CSG expression trees of posed brushes. The same tree drives
//! three evaluation paths that agree bit for bit on distances:
//!
//! - **Tree walking**: [`eval::eval`] and friends, straight off the nodes
//! - **Bytecode**: [`compiled::SdfInterpreter`] runs a flat program on a
//!   small value stack; [`compiled::compile_shader`] emits the same program
//!   as GLSL-flavored source
//! - **Octree**: [`octree::SdfOctree`] subdivides space adaptively, clipping
//!   each cell's evaluator down to the subtree that matters there
//!
//! On top sit a raymarcher, a multi-queue thread-pool [`scheduler`], and
//! [`meshing`], which runs surface nets over the octree leaves as chained
//! parallel stages.
//!
//! ## Example
//!
//! ```rust
//! use hinoki_csg::prelude::*;
//!
//! // A sphere with a box carved out of it
//! let shape = SdfNode::sphere(1.0).diff(SdfNode::box3d(glam::Vec3::splat(0.5)));
//!
//! // Evaluate distance at a point
//! let distance = eval(&shape, glam::Vec3::ZERO);
//! assert!(distance > 0.0);
//!
//! // Build an octree and mesh it
//! let octree = SdfOctree::build(&shape, &OctreeConfig::default()).unwrap();
//! let mesh = mesh_octree(&octree, &MeshingConfig::default());
//! assert!(!mesh.is_empty());
//! ```
//!
//! ## Author
//!
//! Moroya Sakamoto

#![warn(missing_docs)]

pub mod aabb;
pub mod bounds;
pub mod clip;
pub mod compiled;
pub mod eval;
pub mod material;
pub mod meshing;
pub mod octree;
pub mod operations;
pub mod primitives;
pub mod raycast;
pub mod scheduler;
pub mod transform;
pub mod types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and functions
pub mod prelude {
    pub use crate::aabb::Aabb;
    pub use crate::bounds::{bounds, has_finite_bounds, inner_bounds};
    pub use crate::clip::clip;
    pub use crate::compiled::{compile, compile_shader, OpCode, ProgramBuffer, SdfInterpreter};
    pub use crate::eval::{
        eval, eval_batch, eval_batch_parallel, eval_grid, get_material, gradient, normal, sample,
    };
    pub use crate::material::{Material, MaterialKind, MaterialShared};
    pub use crate::meshing::{
        mesh_octree, mesh_octree_async, Mesh, MeshingConfig, MeshingContext,
    };
    pub use crate::octree::{OctreeCell, OctreeConfig, OctreeError, SdfOctree};
    pub use crate::operations::*;
    pub use crate::primitives::*;
    pub use crate::raycast::{ray_march, RayHit, RaymarchConfig};
    pub use crate::scheduler::{
        AsyncTask, ContinuousStatus, ContinuousTask, DomainTaskChain, IndexRange, IterDomain,
        LeafChain, ParallelTask, Scheduler, SchedulerConfig, SchedulerError, TaskDomain,
    };
    pub use crate::transform::{Transform, TransformMachine};
    pub use crate::types::{BrushShape, SdfNode};
    pub use glam::{Quat, Vec3};
}

// Re-exports for convenience
pub use eval::eval;
pub use octree::SdfOctree;
pub use types::SdfNode;
