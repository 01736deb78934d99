//! Batch and data-parallel evaluation
//!
//! Rayon-backed helpers for evaluating a shared tree over many points.
//! Evaluation is `&self`-pure, so one tree serves every worker without
//! locking.
//!
//! Author: Moroya Sakamoto

use crate::eval::eval;
use crate::types::SdfNode;
use glam::Vec3;
use rayon::prelude::*;

/// Evaluate at every point, single-threaded
#[inline]
pub fn eval_batch(node: &SdfNode, points: &[Vec3]) -> Vec<f32> {
    points.iter().map(|&p| eval(node, p)).collect()
}

/// Evaluate at every point on the rayon pool
#[inline]
pub fn eval_batch_parallel(node: &SdfNode, points: &[Vec3]) -> Vec<f32> {
    points.par_iter().map(|&p| eval(node, p)).collect()
}

/// Sample a cubic lattice of `resolution^3` points over `[min, max]`
///
/// Output is X-major (`x + y*res + z*res*res`); parallelism is over Z
/// slices so each worker streams one contiguous chunk.
pub fn eval_grid(node: &SdfNode, min: Vec3, max: Vec3, resolution: usize) -> Vec<f32> {
    assert!(resolution >= 2, "a grid needs at least two samples per axis");
    let step = (max - min) / (resolution as f32 - 1.0);
    let slice = resolution * resolution;
    let mut buffer = vec![0.0f32; slice * resolution];

    buffer
        .par_chunks_mut(slice)
        .enumerate()
        .for_each(|(z, out)| {
            let z_pos = min.z + z as f32 * step.z;
            for y in 0..resolution {
                let y_pos = min.y + y as f32 * step.y;
                let row = y * resolution;
                for x in 0..resolution {
                    let p = Vec3::new(min.x + x as f32 * step.x, y_pos, z_pos);
                    out[row + x] = eval(node, p);
                }
            }
        });

    buffer
}
