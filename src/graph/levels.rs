//! Layer assignment for layout.
//!
//! Every node gets a level such that, ignoring edges inside a dependency
//! cycle, a node sits strictly above (numerically higher than) everything it
//! depends on. Level 0 is reserved for standalone nodes with neither
//! dependencies nor reverse dependencies.
//!
//! The assignment runs a top-down relaxation, a bottom-up tightening pass,
//! optionally a second top-down pass, and finally compacts the levels into a
//! gap-free range.

use std::collections::{BTreeSet, VecDeque};

use petgraph::stable_graph::NodeIndex;
use tracing::{debug, info, instrument};

use super::package_graph::PackageGraph;

/// Extra levels to add for a node given its dependency and reverse-dependency counts.
pub type LevelBoost = fn(deps: usize, required_by: usize) -> usize;

/// Spreads highly connected nodes over deeper levels: `floor(ln(1 + deps + required_by))`.
///
/// Purely cosmetic; structural ordering holds with or without it.
///
/// ```
/// use pkgscope::graph::levels::magic_boost;
///
/// assert_eq!(magic_boost(0, 0), 0);
/// assert_eq!(magic_boost(1, 1), 1);
/// assert_eq!(magic_boost(10, 10), 3);
/// ```
pub fn magic_boost(deps: usize, required_by: usize) -> usize {
    ((1 + deps + required_by) as f64).ln().floor() as usize
}

/// Options for [`assign_levels`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelingOptions {
    /// Added on top of `1 + max(dependency level)` in the top-down pass.
    pub boost: Option<LevelBoost>,
    /// Run the top-down pass again after the bottom-up pass.
    pub align_top: bool,
}

/// FIFO of nodes awaiting re-evaluation; a node is queued at most once at a time.
struct Pending {
    queue: VecDeque<NodeIndex>,
    queued: Vec<bool>,
}

impl Pending {
    fn all(graph: &PackageGraph) -> Self {
        let mut queued = vec![false; graph.node_bound()];
        let queue: VecDeque<NodeIndex> = graph.indices().into_iter().collect();
        for idx in &queue {
            queued[idx.index()] = true;
        }
        Self { queue, queued }
    }

    fn pop(&mut self) -> Option<NodeIndex> {
        let idx = self.queue.pop_front()?;
        self.queued[idx.index()] = false;
        Some(idx)
    }

    fn extend(&mut self, nodes: impl IntoIterator<Item = NodeIndex>) {
        for idx in nodes {
            if !self.queued[idx.index()] {
                self.queued[idx.index()] = true;
                self.queue.push_back(idx);
            }
        }
    }
}

/// Dependencies of `idx` outside its own cycle.
fn outside_deps(graph: &PackageGraph, idx: NodeIndex) -> Vec<NodeIndex> {
    let node = graph.node(idx);
    graph
        .dep_indices(idx)
        .into_iter()
        .filter(|&d| !node.in_cycle_with(&graph.node(d).name))
        .collect()
}

/// Reverse dependencies of `idx` outside its own cycle.
fn outside_reqs(graph: &PackageGraph, idx: NodeIndex) -> Vec<NodeIndex> {
    let node = graph.node(idx);
    graph
        .req_indices(idx)
        .into_iter()
        .filter(|&r| !node.in_cycle_with(&graph.node(r).name))
        .collect()
}

/// Raises (or re-derives) each node to one above its highest dependency.
///
/// Nodes without dependencies outside their cycle keep their level, except
/// fully isolated nodes, which are pinned to 0. Returns the number of
/// level updates performed.
pub fn top_down(graph: &mut PackageGraph, boost: Option<LevelBoost>) -> usize {
    let mut pending = Pending::all(graph);
    let mut updates = 0;

    while let Some(idx) = pending.pop() {
        let deps = outside_deps(graph, idx);
        if deps.is_empty() {
            if graph.dep_count(idx) == 0 && graph.req_count(idx) == 0 {
                graph.node_mut(idx).level = 0;
            }
            continue;
        }

        let highest = deps
            .iter()
            .map(|&d| graph.node(d).level)
            .max()
            .unwrap_or(0);
        let extra = boost.map_or(0, |f| f(graph.dep_count(idx), graph.req_count(idx)));
        let new_level = highest + 1 + extra;

        if new_level != graph.node(idx).level {
            graph.node_mut(idx).level = new_level;
            updates += 1;
            pending.extend(outside_reqs(graph, idx));
        }
    }

    debug!(updates, "top-down pass");
    updates
}

/// Pulls each node up to one below its lowest reverse dependency when that is higher.
///
/// Never assigns level 0. Returns the number of level updates performed.
pub fn bottom_up(graph: &mut PackageGraph) -> usize {
    let mut pending = Pending::all(graph);
    let mut updates = 0;

    while let Some(idx) = pending.pop() {
        let reqs = outside_reqs(graph, idx);
        let Some(lowest) = reqs.iter().map(|&r| graph.node(r).level).min() else {
            continue;
        };
        let new_level = lowest.saturating_sub(1);

        if new_level > graph.node(idx).level {
            graph.node_mut(idx).level = new_level;
            updates += 1;
            pending.extend(outside_deps(graph, idx));
        }
    }

    debug!(updates, "bottom-up pass");
    updates
}

/// Renumbers levels into a contiguous range.
///
/// Level 0 stays 0; all other distinct levels are mapped, in order, onto
/// `1..=n`. Returns the highest level after compaction.
pub fn compact(graph: &mut PackageGraph) -> usize {
    let indices = graph.indices();
    let distinct: BTreeSet<usize> = indices
        .iter()
        .map(|&idx| graph.node(idx).level)
        .filter(|&level| level > 0)
        .collect();
    let mapping: Vec<usize> = distinct.iter().copied().collect();

    for idx in indices {
        let level = graph.node(idx).level;
        if level == 0 {
            continue;
        }
        if let Ok(pos) = mapping.binary_search(&level) {
            graph.node_mut(idx).level = pos + 1;
        }
    }

    mapping.len()
}

/// Runs the full leveling sequence and returns the highest level.
///
/// Expects cycle membership to be annotated already (see
/// [`find_cycles`](super::cycles::find_cycles)).
#[instrument(skip_all, fields(nodes = graph.node_count(), align_top = options.align_top))]
pub fn assign_levels(graph: &mut PackageGraph, options: &LevelingOptions) -> usize {
    top_down(graph, options.boost);
    bottom_up(graph);
    if options.align_top {
        top_down(graph, options.boost);
    }
    let max_level = compact(graph);
    info!(max_level, "assigned levels");
    max_level
}
