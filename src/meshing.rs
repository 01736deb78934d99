//! Octree meshing
//!
//! Naive surface nets run independently over every octree leaf: sample the
//! leaf's clipped interpreter on a regular lattice, drop one vertex in each
//! mixed-sign lattice cell at the mean of its edge crossings, and stitch a
//! quad around every sign-changing lattice edge. Leaves mesh in isolation,
//! so seams between leaves are not welded.
//!
//! The synchronous [`mesh_octree`] does both passes inline. The asynchronous
//! [`mesh_octree_async`] runs two chained parallel stages on a scheduler:
//! leaves first, then one gradient-driven normal per emitted vertex.
//!
//! Author: Moroya Sakamoto

use crate::octree::{OctreeCell, SdfOctree};
use crate::scheduler::{DomainTaskChain, IndexRange, LeafChain, Scheduler};
use glam::Vec3;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// An indexed triangle mesh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    /// Vertex positions
    pub positions: Vec<Vec3>,
    /// Per-vertex unit normals, zero until the normal pass runs
    pub normals: Vec<Vec3>,
    /// Triangle list, three indices per face
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Whether the mesh has no geometry
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Meshing knobs
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshingConfig {
    /// Lattice spacing, defaulting to the octree's target cell size
    pub cell_size: Option<f32>,
}

/// Shared state for an asynchronous meshing run
///
/// Wrap it in an `Arc` and keep a reference for as long as the result is
/// wanted; the chain stages hold it weakly, so dropping every external
/// reference cancels the run.
pub struct MeshingContext {
    octree: Arc<SdfOctree>,
    config: MeshingConfig,
    mesh: Mutex<Mesh>,
    vertex_count: Arc<AtomicUsize>,
    cancel: AtomicBool,
    done: AtomicBool,
}

impl MeshingContext {
    /// A fresh context for meshing `octree`
    pub fn new(octree: Arc<SdfOctree>, config: MeshingConfig) -> MeshingContext {
        MeshingContext {
            octree,
            config,
            mesh: Mutex::new(Mesh::default()),
            vertex_count: Arc::new(AtomicUsize::new(0)),
            cancel: AtomicBool::new(false),
            done: AtomicBool::new(false),
        }
    }

    fn step(&self) -> f32 {
        self.config
            .cell_size
            .unwrap_or(self.octree.config().target_size)
    }

    /// Ask in-flight stages to stop claiming work
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Whether the normal pass has finished
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Take the finished mesh, leaving an empty one behind
    pub fn take_mesh(&self) -> Mesh {
        std::mem::take(&mut *self.mesh.lock())
    }
}

// Surface nets over one leaf. Appends into the shared sink under a single
// short lock at the end.
fn mesh_leaf(cell: &OctreeCell, step: f32, sink: &Mutex<Mesh>) {
    let interpreter = match &cell.interpreter {
        Some(interpreter) => interpreter,
        None => return,
    };
    let min = cell.bounds.min;
    let extent = cell.bounds.extent();
    // At least two cells per axis, otherwise a leaf spanning a single
    // lattice step has no interior edges and emits no quads.
    let nx = ((extent.x / step).ceil() as usize).max(2);
    let ny = ((extent.y / step).ceil() as usize).max(2);
    let nz = ((extent.z / step).ceil() as usize).max(2);
    let spacing = extent / Vec3::new(nx as f32, ny as f32, nz as f32);

    let lattice = |i: usize, j: usize, k: usize| {
        min + spacing * Vec3::new(i as f32, j as f32, k as f32)
    };
    let mut samples = vec![0.0f32; (nx + 1) * (ny + 1) * (nz + 1)];
    let sample_index = |i: usize, j: usize, k: usize| (i * (ny + 1) + j) * (nz + 1) + k;
    for i in 0..=nx {
        for j in 0..=ny {
            for k in 0..=nz {
                samples[sample_index(i, j, k)] = interpreter.eval(lattice(i, j, k));
            }
        }
    }
    let inside = |d: f32| d < 0.0;

    // One vertex per mixed-sign lattice cell, at the mean of its edge
    // crossings.
    const CUBE_EDGES: [((usize, usize, usize), (usize, usize, usize)); 12] = [
        ((0, 0, 0), (1, 0, 0)),
        ((0, 1, 0), (1, 1, 0)),
        ((0, 0, 1), (1, 0, 1)),
        ((0, 1, 1), (1, 1, 1)),
        ((0, 0, 0), (0, 1, 0)),
        ((1, 0, 0), (1, 1, 0)),
        ((0, 0, 1), (0, 1, 1)),
        ((1, 0, 1), (1, 1, 1)),
        ((0, 0, 0), (0, 0, 1)),
        ((1, 0, 0), (1, 0, 1)),
        ((0, 1, 0), (0, 1, 1)),
        ((1, 1, 0), (1, 1, 1)),
    ];
    let mut positions: Vec<Vec3> = Vec::new();
    let mut cell_vertex: HashMap<(usize, usize, usize), u32> = HashMap::new();
    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                let mut crossing_sum = Vec3::ZERO;
                let mut crossings = 0u32;
                for (a, b) in CUBE_EDGES {
                    let d0 = samples[sample_index(i + a.0, j + a.1, k + a.2)];
                    let d1 = samples[sample_index(i + b.0, j + b.1, k + b.2)];
                    if inside(d0) != inside(d1) {
                        let t = (d0 / (d0 - d1)).clamp(0.0, 1.0);
                        let p0 = lattice(i + a.0, j + a.1, k + a.2);
                        let p1 = lattice(i + b.0, j + b.1, k + b.2);
                        crossing_sum += p0.lerp(p1, t);
                        crossings += 1;
                    }
                }
                if crossings > 0 {
                    cell_vertex.insert((i, j, k), positions.len() as u32);
                    positions.push(crossing_sum / crossings as f32);
                }
            }
        }
    }
    if positions.is_empty() {
        return;
    }

    // One quad around every interior sign-changing lattice edge. The four
    // cells sharing the edge each contain both endpoints, so their vertices
    // exist whenever the edge crosses.
    let mut indices: Vec<u32> = Vec::new();
    let mut emit_quad = |cells: [(usize, usize, usize); 4], flip: bool| {
        let quad = [
            cell_vertex.get(&cells[0]),
            cell_vertex.get(&cells[1]),
            cell_vertex.get(&cells[2]),
            cell_vertex.get(&cells[3]),
        ];
        if let [Some(&a), Some(&b), Some(&c), Some(&d)] = quad {
            if flip {
                indices.extend_from_slice(&[a, d, c, a, c, b]);
            } else {
                indices.extend_from_slice(&[a, b, c, a, c, d]);
            }
        }
    };
    for i in 0..nx {
        for j in 1..ny {
            for k in 1..nz {
                let d0 = samples[sample_index(i, j, k)];
                let d1 = samples[sample_index(i + 1, j, k)];
                if inside(d0) != inside(d1) {
                    emit_quad(
                        [
                            (i, j - 1, k - 1),
                            (i, j, k - 1),
                            (i, j, k),
                            (i, j - 1, k),
                        ],
                        inside(d1),
                    );
                }
            }
        }
    }
    for j in 0..ny {
        for i in 1..nx {
            for k in 1..nz {
                let d0 = samples[sample_index(i, j, k)];
                let d1 = samples[sample_index(i, j + 1, k)];
                if inside(d0) != inside(d1) {
                    emit_quad(
                        [
                            (i - 1, j, k - 1),
                            (i - 1, j, k),
                            (i, j, k),
                            (i, j, k - 1),
                        ],
                        inside(d1),
                    );
                }
            }
        }
    }
    for k in 0..nz {
        for i in 1..nx {
            for j in 1..ny {
                let d0 = samples[sample_index(i, j, k)];
                let d1 = samples[sample_index(i, j, k + 1)];
                if inside(d0) != inside(d1) {
                    emit_quad(
                        [
                            (i - 1, j - 1, k),
                            (i, j - 1, k),
                            (i, j, k),
                            (i - 1, j, k),
                        ],
                        inside(d1),
                    );
                }
            }
        }
    }

    let mut mesh = sink.lock();
    let base = mesh.positions.len() as u32;
    mesh.positions.extend_from_slice(&positions);
    mesh.normals
        .extend(std::iter::repeat(Vec3::ZERO).take(positions.len()));
    mesh.indices.extend(indices.iter().map(|index| index + base));
}

fn solve_normal(octree: &SdfOctree, position: Vec3) -> Vec3 {
    octree.gradient(position).normalize_or_zero()
}

/// Mesh an octree synchronously on the calling thread
pub fn mesh_octree(octree: &SdfOctree, config: &MeshingConfig) -> Mesh {
    let step = config.cell_size.unwrap_or(octree.config().target_size);
    let sink = Mutex::new(Mesh::default());
    for cell in octree.leaves() {
        mesh_leaf(cell, step, &sink);
    }
    let mut mesh = sink.into_inner();
    for index in 0..mesh.positions.len() {
        mesh.normals[index] = solve_normal(octree, mesh.positions[index]);
    }
    log::debug!(
        "meshed {} vertices / {} triangles",
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    mesh
}

/// Mesh an octree as two chained parallel stages on `scheduler`
///
/// Stage one walks the leaf chain emitting geometry; its finish publishes
/// the vertex count and the baton starts stage two, which solves one normal
/// per vertex. Poll [`MeshingContext::is_done`] and then take the mesh.
pub fn mesh_octree_async(scheduler: &Scheduler, context: &Arc<MeshingContext>) {
    let step = context.step();
    let normals = DomainTaskChain::new(
        "mesh normals",
        context,
        IndexRange::shared(Arc::clone(&context.vertex_count)),
        |context: &MeshingContext, index| {
            if context.cancelled() {
                return;
            }
            let position = context.mesh.lock().positions[index];
            let normal = solve_normal(&context.octree, position);
            context.mesh.lock().normals[index] = normal;
        },
    )
    .with_finish(|context: &MeshingContext| {
        context.done.store(true, Ordering::SeqCst);
    });
    let leaves = DomainTaskChain::new(
        "mesh leaves",
        context,
        LeafChain::new(Arc::clone(&context.octree)),
        move |context: &MeshingContext, cell_index| {
            if context.cancelled() {
                return;
            }
            let cell = &context.octree.cells()[cell_index as usize];
            mesh_leaf(cell, step, &context.mesh);
        },
    )
    .with_finish(|context: &MeshingContext| {
        let emitted = context.mesh.lock().positions.len();
        context.vertex_count.store(emitted, Ordering::SeqCst);
    })
    .then(Box::new(normals));
    scheduler.enqueue_parallel(Box::new(leaves));
}
