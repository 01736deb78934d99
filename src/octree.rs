//! Adaptive octree over clipped evaluators
//!
//! Space subdivides around the surface: each cell clips its *parent's*
//! already-clipped evaluator against the cell's bounding sphere, so trees
//! shrink on the way down and a deep cell usually holds just the brush or
//! two that cross it. Subdivision stops at the target size, on empty clips,
//! and when coalescing proves a subtree redundant.
//!
//! Cells live in one arena `Vec` addressed by `u32` indices; terminal cells
//! are additionally threaded into a forward list so leaf walks need no
//! recursion. Each live cell carries its folded evaluator and a compiled
//! interpreter for it.
//!
//! Author: Moroya Sakamoto

use crate::aabb::Aabb;
use crate::clip::clip;
use crate::compiled::SdfInterpreter;
use crate::eval;
use crate::material::MaterialShared;
use crate::types::SdfNode;
use glam::Vec3;
use std::sync::Arc;
use thiserror::Error;

/// Why octree construction can fail
#[derive(Debug, Error)]
pub enum OctreeError {
    /// The evaluator's solid does not fit in any finite box
    #[error("cannot build an octree over an evaluator with unbounded geometry")]
    UnboundedEvaluator,
}

/// Octree construction knobs
#[derive(Debug, Clone, Copy)]
pub struct OctreeConfig {
    /// Stop subdividing once a cell's span reaches this size
    pub target_size: f32,
    /// Collapse subtrees that cannot refine their parent's evaluator
    pub coalesce: bool,
    /// Depth at which subdivision is deferred until [`SdfOctree::populate`]
    pub max_depth: u32,
    /// Extra padding around the root cube
    pub margin: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        OctreeConfig {
            target_size: 0.25,
            coalesce: true,
            max_depth: 24,
            margin: 0.0,
        }
    }
}

impl OctreeConfig {
    /// Coarse settings for interactive preview
    pub fn preview() -> Self {
        OctreeConfig {
            target_size: 1.0,
            coalesce: true,
            max_depth: 10,
            margin: 0.0,
        }
    }
}

/// One cell of the arena
#[derive(Debug, Clone)]
pub struct OctreeCell {
    /// Region this cell answers for; narrowed to its live children
    pub bounds: Aabb,
    /// Subdivision center of the original cube, used for octant descent
    pub pivot: Vec3,
    /// Depth of this cell, root = 1
    pub depth: u32,
    /// Clipped, folded evaluator; `None` marks a provably empty region
    pub evaluator: Option<Arc<SdfNode>>,
    /// Compiled form of `evaluator`
    pub interpreter: Option<Arc<SdfInterpreter>>,
    /// Brush leaves in `evaluator`
    pub leaf_count: usize,
    /// No children below this cell
    pub terminus: bool,
    /// Subdivision was deferred by the depth limit
    pub incomplete: bool,
    children: [Option<u32>; 8],
    parent: Option<u32>,
    next: Option<u32>,
}

impl OctreeCell {
    /// Index of the next cell in the leaf chain
    pub fn next_leaf(&self) -> Option<u32> {
        self.next
    }

    /// Index of the parent cell
    pub fn parent(&self) -> Option<u32> {
        self.parent
    }

    fn octant(&self, point: Vec3) -> usize {
        let mut index = 0;
        if point.x > self.pivot.x {
            index |= 1;
        }
        if point.y > self.pivot.y {
            index |= 2;
        }
        if point.z > self.pivot.z {
            index |= 4;
        }
        index
    }
}

/// Summary counters for logs and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OctreeStats {
    /// Total arena cells
    pub cells: usize,
    /// Terminal cells holding an evaluator
    pub leaves: usize,
    /// Deepest cell
    pub max_depth: u32,
    /// Whether any cell still defers subdivision
    pub incomplete: bool,
}

// Build-time tree; flattened into the arena once shaping is done, so
// coalesced subtrees never occupy arena slots.
struct BuildCell {
    bounds: Aabb,
    pivot: Vec3,
    depth: u32,
    evaluator: Option<Arc<SdfNode>>,
    interpreter: Option<Arc<SdfInterpreter>>,
    leaf_count: usize,
    terminus: bool,
    incomplete: bool,
    children: [Option<Box<BuildCell>>; 8],
}

impl BuildCell {
    fn new(parent_evaluator: &SdfNode, config: &OctreeConfig, bounds: Aabb, depth: u32) -> Self {
        let extent = bounds.max - bounds.min;
        let span = extent.max_element();
        let pivot = bounds.min + Vec3::splat(span * 0.5);
        let radius = Vec3::splat(span).length() * 0.5;

        let evaluator = clip(parent_evaluator, pivot, radius)
            // Clipping composes per-node bounds; re-check the promise and
            // discard over-optimistic survivors.
            .filter(|clipped| eval::eval(clipped, pivot).abs() <= radius)
            .map(|clipped| Arc::new(clipped.folded()));
        let interpreter = evaluator.as_ref().map(|e| Arc::new(SdfInterpreter::new(e)));
        let leaf_count = evaluator.as_ref().map_or(0, |e| e.leaf_count());

        let mut cell = BuildCell {
            bounds,
            pivot,
            depth,
            evaluator,
            interpreter,
            leaf_count,
            terminus: true,
            incomplete: false,
            children: std::array::from_fn(|_| None),
        };

        let evaluator = match &cell.evaluator {
            Some(evaluator) if span > config.target_size => Arc::clone(evaluator),
            _ => return cell,
        };
        if depth >= config.max_depth {
            cell.incomplete = true;
            return cell;
        }
        cell.terminus = false;
        cell.populate(&evaluator, config);
        cell
    }

    fn populate(&mut self, evaluator: &Arc<SdfNode>, config: &OctreeConfig) {
        let mut uniform = true;
        let mut penultimate = true;
        let mut live = 0usize;
        let mut live_bounds = Aabb::zero();

        for octant in 0..8 {
            let mut child_bounds = self.bounds;
            if octant & 1 != 0 {
                child_bounds.min.x = self.pivot.x;
            } else {
                child_bounds.max.x = self.pivot.x;
            }
            if octant & 2 != 0 {
                child_bounds.min.y = self.pivot.y;
            } else {
                child_bounds.max.y = self.pivot.y;
            }
            if octant & 4 != 0 {
                child_bounds.min.z = self.pivot.z;
            } else {
                child_bounds.max.z = self.pivot.z;
            }

            let child = BuildCell::new(evaluator, config, child_bounds, self.depth + 1);
            if child.evaluator.is_none() {
                continue;
            }
            uniform &= child
                .evaluator
                .as_ref()
                .map_or(false, |child_eval| **child_eval == **evaluator);
            penultimate &= child.terminus;
            live_bounds = if live == 0 {
                child.bounds
            } else {
                live_bounds.union(&child.bounds)
            };
            live += 1;
            self.children[octant] = Some(Box::new(child));
        }

        if live == 0 {
            // Every octant proved empty, so this region is too.
            self.evaluator = None;
            self.interpreter = None;
            self.leaf_count = 0;
            self.terminus = true;
            return;
        }

        self.bounds = live_bounds;

        // A depth-capped descendant still owes a refinement pass. Folding it
        // away here would erase the marker `populate` keys on.
        let refinable = self
            .children
            .iter()
            .flatten()
            .any(|child| tree_has_incomplete(child));

        if config.coalesce
            && !refinable
            && ((penultimate && uniform) || self.leaf_count <= (self.depth as usize).max(3))
        {
            self.children = std::array::from_fn(|_| None);
            self.terminus = true;
        }
    }
}

/// The octree proper
pub struct SdfOctree {
    cells: Vec<OctreeCell>,
    config: OctreeConfig,
    first_leaf: Option<u32>,
    incomplete: bool,
}

impl SdfOctree {
    /// Build an octree over the given tree
    pub fn build(evaluator: &SdfNode, config: &OctreeConfig) -> Result<SdfOctree, OctreeError> {
        if !evaluator.has_finite_bounds() {
            log::warn!("rejecting octree build: evaluator has unbounded geometry");
            return Err(OctreeError::UnboundedEvaluator);
        }

        let bounds = evaluator.bounds().bounding_cube().inflate(config.margin);
        let root = BuildCell::new(evaluator, config, bounds, 1);
        let incomplete = root.evaluator.is_some() && tree_has_incomplete(&root);

        let mut octree = SdfOctree {
            cells: Vec::new(),
            config: *config,
            first_leaf: None,
            incomplete,
        };
        octree.flatten(root, None);
        octree.link_leaves();
        log::debug!(
            "octree built: {} cells, {} leaves",
            octree.cells.len(),
            octree.stats().leaves
        );
        Ok(octree)
    }

    /// Construction settings this octree was built with
    pub fn config(&self) -> &OctreeConfig {
        &self.config
    }

    /// All cells, root first
    pub fn cells(&self) -> &[OctreeCell] {
        &self.cells
    }

    /// Root cell bounds
    pub fn bounds(&self) -> Aabb {
        self.cells[0].bounds
    }

    /// Summary counters
    pub fn stats(&self) -> OctreeStats {
        OctreeStats {
            cells: self.cells.len(),
            leaves: self.leaves().count(),
            max_depth: self.cells.iter().map(|cell| cell.depth).max().unwrap_or(0),
            incomplete: self.incomplete,
        }
    }

    fn flatten(&mut self, build: BuildCell, parent: Option<u32>) -> u32 {
        let index = self.cells.len() as u32;
        self.cells.push(OctreeCell {
            bounds: build.bounds,
            pivot: build.pivot,
            depth: build.depth,
            evaluator: build.evaluator,
            interpreter: build.interpreter,
            leaf_count: build.leaf_count,
            terminus: build.terminus,
            incomplete: build.incomplete,
            children: [None; 8],
            parent,
            next: None,
        });
        for (octant, child) in build.children.into_iter().enumerate() {
            if let Some(child) = child {
                let child_index = self.flatten(*child, Some(index));
                self.cells[index as usize].children[octant] = Some(child_index);
            }
        }
        index
    }

    /// Rethread the leaf chain
    ///
    /// Terminal cells that hold an evaluator are linked in depth-first
    /// order; empty terminal cells are skipped.
    pub fn link_leaves(&mut self) {
        for cell in &mut self.cells {
            cell.next = None;
        }
        self.first_leaf = None;
        let mut order = Vec::new();
        self.collect_leaves(0, &mut order);
        for window in order.windows(2) {
            self.cells[window[0] as usize].next = Some(window[1]);
        }
        self.first_leaf = order.first().copied();
    }

    fn collect_leaves(&self, index: u32, order: &mut Vec<u32>) {
        let cell = &self.cells[index as usize];
        if cell.terminus || cell.incomplete {
            if cell.evaluator.is_some() {
                order.push(index);
            }
            return;
        }
        for child in cell.children.iter().flatten() {
            self.collect_leaves(*child, order);
        }
    }

    /// First cell of the leaf chain
    pub fn first_leaf(&self) -> Option<u32> {
        self.first_leaf
    }

    /// Iterator over the leaf chain
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            octree: self,
            cursor: self.first_leaf,
        }
    }

    /// Find the cell answering for `point`
    ///
    /// `exact = false` treats empty octants as a definitive miss, which
    /// lets interior queries skip ancestor fallbacks. `exact = true` falls
    /// back to the nearest ancestor that still holds an evaluator.
    pub fn descend(&self, point: Vec3, exact: bool) -> Option<&OctreeCell> {
        self.descend_index(0, point, exact)
            .map(|index| &self.cells[index as usize])
    }

    fn descend_index(&self, index: u32, point: Vec3, exact: bool) -> Option<u32> {
        let cell = &self.cells[index as usize];
        if !cell.terminus && !cell.incomplete {
            let octant = cell.octant(point);
            if let Some(child) = cell.children[octant] {
                let found = self.descend_index(child, point, exact);
                if found.is_some() || !exact {
                    return found;
                }
            } else if !exact {
                return None;
            }
        }
        cell.evaluator.as_ref().map(|_| index)
    }

    /// Evaluator answering for `point`, per [`descend`](Self::descend)
    pub fn select_evaluator(&self, point: Vec3, exact: bool) -> Option<&Arc<SdfNode>> {
        self.descend(point, exact)
            .and_then(|cell| cell.evaluator.as_ref())
    }

    /// Interpreter answering for `point`
    pub fn select_interpreter(&self, point: Vec3, exact: bool) -> Option<&Arc<SdfInterpreter>> {
        self.descend(point, exact)
            .and_then(|cell| cell.interpreter.as_ref())
    }

    /// Accelerated distance query
    ///
    /// With `exact = false` a miss answers `f32::INFINITY`, which reads as
    /// "no surface near here" to marching and meshing loops.
    pub fn eval(&self, point: Vec3, exact: bool) -> f32 {
        match self.select_interpreter(point, exact) {
            Some(interpreter) => interpreter.eval(point),
            None => f32::INFINITY,
        }
    }

    /// Accelerated field gradient
    pub fn gradient(&self, point: Vec3) -> Vec3 {
        match self.select_evaluator(point, true) {
            Some(evaluator) => eval::gradient(evaluator, point),
            None => Vec3::X,
        }
    }

    /// Accelerated material lookup
    pub fn get_material(&self, point: Vec3) -> Option<MaterialShared> {
        self.select_evaluator(point, true)
            .and_then(|evaluator| eval::get_material(evaluator, point))
    }

    /// Expand every cell whose subdivision was deferred by `max_depth`
    pub fn populate(&mut self) {
        if !self.incomplete {
            return;
        }
        let config = OctreeConfig {
            max_depth: u32::MAX,
            ..self.config
        };
        let pending: Vec<u32> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.incomplete)
            .map(|(index, _)| index as u32)
            .collect();
        for index in pending {
            let cell = &self.cells[index as usize];
            let evaluator = match &cell.evaluator {
                Some(evaluator) => Arc::clone(evaluator),
                None => continue,
            };
            let rebuilt = BuildCell::new(&evaluator, &config, cell.bounds, cell.depth);
            let parent = cell.parent;
            self.replace(index, rebuilt, parent);
        }
        self.incomplete = false;
        self.link_leaves();
        log::debug!("octree populated: now {} cells", self.cells.len());
    }

    // Overwrite an arena slot with a rebuilt cell, appending its subtree.
    fn replace(&mut self, index: u32, build: BuildCell, parent: Option<u32>) {
        self.cells[index as usize] = OctreeCell {
            bounds: build.bounds,
            pivot: build.pivot,
            depth: build.depth,
            evaluator: build.evaluator,
            interpreter: build.interpreter,
            leaf_count: build.leaf_count,
            terminus: build.terminus,
            incomplete: build.incomplete,
            children: [None; 8],
            parent,
            next: None,
        };
        for (octant, child) in build.children.into_iter().enumerate() {
            if let Some(child) = child {
                let child_index = self.flatten(*child, Some(index));
                self.cells[index as usize].children[octant] = Some(child_index);
            }
        }
    }
}

fn tree_has_incomplete(build: &BuildCell) -> bool {
    build.incomplete
        || build
            .children
            .iter()
            .flatten()
            .any(|child| tree_has_incomplete(child))
}

/// Iterator over the threaded leaf chain
pub struct Leaves<'a> {
    octree: &'a SdfOctree,
    cursor: Option<u32>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a OctreeCell;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let cell = &self.octree.cells[index as usize];
        self.cursor = cell.next;
        Some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_spheres() -> SdfNode {
        SdfNode::sphere(1.0)
            .moved(Vec3::new(-1.5, 0.0, 0.0))
            .union(SdfNode::sphere(1.0).moved(Vec3::new(1.5, 0.0, 0.0)))
    }

    // Coalescing folds tiny scenes into the root; tests that care about
    // actual subdivision turn it off.
    fn subdividing() -> OctreeConfig {
        OctreeConfig {
            target_size: 0.5,
            coalesce: false,
            ..OctreeConfig::default()
        }
    }

    #[test]
    fn test_rejects_unbounded_evaluator() {
        let result = SdfOctree::build(&SdfNode::plane(Vec3::Y), &OctreeConfig::default());
        assert!(matches!(result, Err(OctreeError::UnboundedEvaluator)));
    }

    #[test]
    fn test_eval_matches_tree_near_surface() {
        let tree = two_spheres();
        let probes = [
            Vec3::new(-2.5, 0.0, 0.0),
            Vec3::new(-1.5, 0.9, 0.0),
            Vec3::new(0.0, 0.1, 0.0),
            Vec3::new(1.5, 0.0, 0.9),
            Vec3::new(2.4, 0.1, 0.1),
        ];
        for config in [OctreeConfig::default(), subdividing()] {
            let octree = SdfOctree::build(&tree, &config).unwrap();
            for p in probes {
                let direct = eval::eval(&tree, p);
                let accelerated = octree.eval(p, true);
                assert!(
                    (direct - accelerated).abs() < 1e-5,
                    "divergence at {:?}: {} vs {}",
                    p,
                    direct,
                    accelerated
                );
            }
        }
    }

    #[test]
    fn test_non_exact_miss_is_infinite() {
        let tree = two_spheres();
        let octree = SdfOctree::build(&tree, &subdividing()).unwrap();
        // Far corner of the root cube, nowhere near the surface.
        let corner = octree.bounds().max * 10.0;
        assert!(octree.eval(corner, false).is_infinite());
        // Exact mode still answers through ancestor fallback.
        assert!(octree.eval(corner, true).is_finite());
    }

    #[test]
    fn test_leaf_chain_covers_all_live_termini() {
        let tree = two_spheres();
        let octree = SdfOctree::build(&tree, &subdividing()).unwrap();
        let by_walk: Vec<usize> = octree
            .cells()
            .iter()
            .enumerate()
            .filter(|(_, cell)| {
                (cell.terminus || cell.incomplete) && cell.evaluator.is_some()
            })
            .map(|(index, _)| index)
            .collect();
        let by_chain: Vec<usize> = octree
            .leaves()
            .map(|cell| {
                octree
                    .cells()
                    .iter()
                    .position(|other| std::ptr::eq(other, cell))
                    .unwrap()
            })
            .collect();
        assert_eq!(by_walk, by_chain);
        assert!(!by_chain.is_empty());
    }

    #[test]
    fn test_leaves_hold_small_evaluators() {
        let tree = two_spheres();
        let octree = SdfOctree::build(&tree, &subdividing()).unwrap();
        // Away from the midline every deep leaf should have clipped down to
        // one sphere.
        let mut checked = 0;
        for cell in octree.leaves() {
            if cell.depth >= 4 && (cell.bounds.max.x < -1.0 || cell.bounds.min.x > 1.0) {
                assert_eq!(cell.leaf_count, 1, "fat evaluator at {:?}", cell.bounds);
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_coalesce_collapses_uniform_interior() {
        let tree = SdfNode::sphere(4.0);
        let coalesced = SdfOctree::build(
            &tree,
            &OctreeConfig {
                target_size: 1.0,
                coalesce: true,
                ..OctreeConfig::default()
            },
        )
        .unwrap();
        let exhaustive = SdfOctree::build(
            &tree,
            &OctreeConfig {
                target_size: 1.0,
                coalesce: false,
                ..OctreeConfig::default()
            },
        )
        .unwrap();
        // A single brush clips to itself everywhere, so coalescing collapses
        // the whole tree to the root.
        assert_eq!(coalesced.stats().cells, 1);
        assert!(exhaustive.stats().cells > coalesced.stats().cells);
    }

    #[test]
    fn test_coalesce_preserves_depth_capped_cells() {
        let tree = two_spheres();
        let config = OctreeConfig {
            target_size: 0.1,
            coalesce: true,
            max_depth: 2,
            margin: 0.0,
        };
        let mut octree = SdfOctree::build(&tree, &config).unwrap();
        // Folding away a depth-capped subtree would lose the marker that
        // the lazy refinement pass keys on.
        assert!(octree.stats().incomplete);
        octree.populate();
        assert!(!octree.stats().incomplete);
    }

    #[test]
    fn test_max_depth_defers_until_populate() {
        let tree = two_spheres();
        let config = OctreeConfig {
            target_size: 0.1,
            coalesce: false,
            max_depth: 2,
            margin: 0.0,
        };
        let mut octree = SdfOctree::build(&tree, &config).unwrap();
        assert!(octree.stats().incomplete);
        let before = octree.stats().cells;
        // Incomplete cells still answer exact queries.
        assert!(octree.eval(Vec3::new(1.5, 0.9, 0.0), true).is_finite());
        octree.populate();
        let stats = octree.stats();
        assert!(!stats.incomplete);
        assert!(stats.cells > before);
        assert!(
            (octree.eval(Vec3::new(1.5, 0.9, 0.0), true)
                - eval::eval(&tree, Vec3::new(1.5, 0.9, 0.0)))
            .abs()
                < 1e-5
        );
    }

    #[test]
    fn test_material_lookup_through_cells() {
        let paint = crate::material::Material::solid(Vec3::X);
        let tree = two_spheres().painted(&paint, false);
        let octree = SdfOctree::build(&tree, &OctreeConfig::default()).unwrap();
        let found = octree.get_material(Vec3::new(1.5, 0.0, 0.0)).unwrap();
        assert!(crate::material::same_material(&found, &paint));
    }
}
