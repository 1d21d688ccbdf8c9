//! Cumulative size aggregation.
//!
//! For every node, simulates removing it and sums the installed size of
//! everything that goes with it:
//!
//! - **strict** (`cumulative_size`): the node plus everything that
//!   transitively depends on it.
//! - **relaxed** (`cumulative_size_relaxed`): additionally, implicit
//!   (non-explicit) dependencies whose every dependant is being removed,
//!   repeated until nothing else becomes orphaned.

use std::collections::HashSet;

use petgraph::stable_graph::NodeIndex;
use tracing::{info, instrument, trace};

use super::package_graph::PackageGraph;

/// Size assigned to every node when the database has no size information.
pub const PLACEHOLDER_SIZE: u64 = 1;

/// Replaces every node's installed size with [`PLACEHOLDER_SIZE`].
///
/// Cumulative sizes then count nodes instead of bytes.
pub fn apply_placeholder_sizes(graph: &mut PackageGraph) {
    for idx in graph.indices() {
        graph.node_mut(idx).install_size = PLACEHOLDER_SIZE;
    }
    graph.set_sizes_are_counts(true);
}

/// Tracks the removal set and the implicit dependencies worth re-checking.
struct Removal<'g> {
    graph: &'g PackageGraph,
    removing: HashSet<NodeIndex>,
    candidates: Vec<NodeIndex>,
    track_orphans: bool,
}

impl<'g> Removal<'g> {
    fn new(graph: &'g PackageGraph, track_orphans: bool) -> Self {
        Self {
            graph,
            removing: HashSet::new(),
            candidates: Vec::new(),
            track_orphans,
        }
    }

    /// Adds `start` and everything transitively requiring it to the removal set.
    fn remove(&mut self, start: NodeIndex) {
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if !self.removing.insert(idx) {
                continue;
            }
            if self.track_orphans {
                self.candidates.extend(
                    self.graph
                        .dep_indices(idx)
                        .into_iter()
                        .filter(|&d| !self.graph.node(d).explicit),
                );
            }
            stack.extend(
                self.graph
                    .req_indices(idx)
                    .into_iter()
                    .filter(|r| !self.removing.contains(r)),
            );
        }
    }

    /// Sweeps in orphaned implicit dependencies until none are left.
    ///
    /// A node enters the removal set at most once and only removed nodes
    /// add candidates, so the worklist drains even with dependency cycles.
    fn sweep_orphans(&mut self) {
        while let Some(candidate) = self.candidates.pop() {
            if self.removing.contains(&candidate) {
                continue;
            }
            let orphaned = self
                .graph
                .req_indices(candidate)
                .iter()
                .all(|r| self.removing.contains(r));
            if orphaned {
                self.remove(candidate);
            }
        }
    }

    fn total_size(&self) -> u64 {
        self.removing
            .iter()
            .map(|&idx| self.graph.node(idx).install_size)
            .sum()
    }
}

/// Nodes removed together with `start` under the strict rule.
pub fn removal_set(graph: &PackageGraph, start: NodeIndex) -> HashSet<NodeIndex> {
    let mut removal = Removal::new(graph, false);
    removal.remove(start);
    removal.removing
}

/// Nodes removed together with `start` under the relaxed rule.
pub fn relaxed_removal_set(graph: &PackageGraph, start: NodeIndex) -> HashSet<NodeIndex> {
    let mut removal = Removal::new(graph, true);
    removal.remove(start);
    removal.sweep_orphans();
    removal.removing
}

/// Strict cumulative size of `start`.
pub fn cumulative_size(graph: &PackageGraph, start: NodeIndex) -> u64 {
    let mut removal = Removal::new(graph, false);
    removal.remove(start);
    removal.total_size()
}

/// Relaxed cumulative size of `start`.
pub fn cumulative_size_relaxed(graph: &PackageGraph, start: NodeIndex) -> u64 {
    let mut removal = Removal::new(graph, true);
    removal.remove(start);
    removal.sweep_orphans();
    removal.total_size()
}

/// Computes both cumulative sizes for every node.
///
/// Returns the largest strict and relaxed sizes seen.
#[instrument(skip_all, fields(nodes = graph.node_count()))]
pub fn compute_sizes(graph: &mut PackageGraph) -> (u64, u64) {
    let mut max_strict = 0;
    let mut max_relaxed = 0;

    for idx in graph.indices() {
        let strict = cumulative_size(graph, idx);
        let relaxed = cumulative_size_relaxed(graph, idx);
        let node = graph.node_mut(idx);
        trace!(node = %node.name, strict, relaxed, "cumulative size");
        node.cumulative_size = Some(strict);
        node.cumulative_size_relaxed = Some(relaxed);
        max_strict = max_strict.max(strict);
        max_relaxed = max_relaxed.max(relaxed);
    }

    info!(max_strict, max_relaxed, "computed cumulative sizes");
    (max_strict, max_relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::{graph_from_edges, name};
    use crate::graph::build_graph;
    use crate::parser::{PackageRecord, RecordSource};
    use proptest::prelude::*;

    fn sizes(graph: &PackageGraph, node: &str) -> (u64, u64) {
        let n = graph.get(node).unwrap();
        (n.cumulative_size.unwrap(), n.cumulative_size_relaxed.unwrap())
    }

    #[test]
    fn test_fan_in_scenario() {
        let source = RecordSource::new(vec![
            PackageRecord::new("A", "1").with_size(10),
            PackageRecord::new("B", "1").with_size(5).with_depends(["A"]),
            PackageRecord::new("C", "1").with_size(7).with_depends(["A"]),
        ]);
        let mut graph = build_graph(&source, false).unwrap();
        compute_sizes(&mut graph);

        assert_eq!(sizes(&graph, "A").0, 22);
        assert_eq!(sizes(&graph, "B").0, 5);
        assert_eq!(sizes(&graph, "C").0, 7);
    }

    #[test]
    fn test_relaxed_sweeps_orphaned_implicit_deps() {
        let source = RecordSource::new(vec![
            PackageRecord::new("app", "1").with_size(100).with_depends(["lib", "shared"]),
            PackageRecord::new("lib", "1").with_size(20).with_depends(["libdep"]).as_dependency(),
            PackageRecord::new("libdep", "1").with_size(3).as_dependency(),
            PackageRecord::new("shared", "1").with_size(8).as_dependency(),
            PackageRecord::new("other", "1").with_size(50).with_depends(["shared"]),
        ]);
        let mut graph = build_graph(&source, false).unwrap();
        compute_sizes(&mut graph);

        // removing app orphans lib, then libdep; shared is still needed by other
        assert_eq!(sizes(&graph, "app"), (100, 123));
        assert_eq!(sizes(&graph, "libdep"), (3 + 20 + 100, 123));
        assert_eq!(sizes(&graph, "other"), (50, 50));
    }

    #[test]
    fn test_relaxed_keeps_explicit_deps() {
        let source = RecordSource::new(vec![
            PackageRecord::new("app", "1").with_size(1).with_depends(["tool"]),
            PackageRecord::new("tool", "1").with_size(9),
        ]);
        let mut graph = build_graph(&source, false).unwrap();
        compute_sizes(&mut graph);
        assert_eq!(sizes(&graph, "app"), (1, 1));
    }

    #[test]
    fn test_cycle_counts_once() {
        let mut graph = graph_from_edges(3, &[(0, 1), (1, 0), (2, 0)]);
        for i in 0..3 {
            graph.get_mut(&name(i)).unwrap().install_size = 10;
        }
        compute_sizes(&mut graph);
        assert_eq!(sizes(&graph, "p0").0, 30);
        assert_eq!(sizes(&graph, "p1").0, 30);
        assert_eq!(sizes(&graph, "p2").0, 10);
    }

    #[test]
    fn test_relaxed_terminates_on_implicit_cycle() {
        // root -> a <-> b, both implicit
        let source = RecordSource::new(vec![
            PackageRecord::new("root", "1").with_size(1).with_depends(["a"]),
            PackageRecord::new("a", "1").with_size(2).with_depends(["b"]).as_dependency(),
            PackageRecord::new("b", "1").with_size(4).with_depends(["a"]).as_dependency(),
        ]);
        let mut graph = build_graph(&source, false).unwrap();
        compute_sizes(&mut graph);
        // a is still required by b when root goes, so it is not swept
        assert_eq!(sizes(&graph, "root"), (1, 1));
        assert_eq!(sizes(&graph, "a"), (7, 7));
    }

    #[test]
    fn test_placeholder_sizes_count_nodes() {
        let source = RecordSource::new(vec![
            PackageRecord::new("A", "1"),
            PackageRecord::new("B", "1").with_depends(["A"]).with_groups(["g"]),
            PackageRecord::new("C", "1").with_depends(["A"]),
        ]);
        let mut graph = build_graph(&source, false).unwrap();
        assert!(!graph.sizes_are_counts());
        apply_placeholder_sizes(&mut graph);
        compute_sizes(&mut graph);
        assert!(graph.sizes_are_counts());

        // A, B, C and the group g that contains B
        assert_eq!(sizes(&graph, "A").0, 4);
        assert_eq!(sizes(&graph, "B").0, 2);
        assert_eq!(sizes(&graph, "C").0, 1);
    }

    #[test]
    fn test_removal_sets() {
        let mut graph = graph_from_edges(3, &[(1, 0), (2, 1)]);
        graph.get_mut("p1").unwrap().explicit = false;
        graph.get_mut("p0").unwrap().explicit = false;

        let p0 = graph.index_of("p0").unwrap();
        assert_eq!(removal_set(&graph, p0).len(), 3);
        let p2 = graph.index_of("p2").unwrap();
        assert_eq!(removal_set(&graph, p2).len(), 1);
        // p1 and then p0 are left with no dependants
        assert_eq!(relaxed_removal_set(&graph, p2).len(), 3);
    }

    proptest! {
        #[test]
        fn prop_relaxed_at_least_strict(
            n in 1usize..12,
            raw_edges in proptest::collection::vec((0usize..12, 0usize..12), 0..30),
            explicit_mask in any::<u16>(),
            sizes_seed in proptest::collection::vec(0u64..1000, 12),
        ) {
            let edges: Vec<(usize, usize)> = raw_edges
                .into_iter()
                .filter(|&(a, b)| a < n && b < n && a != b)
                .collect();
            let mut graph = graph_from_edges(n, &edges);
            for i in 0..n {
                let node = graph.get_mut(&name(i)).unwrap();
                node.install_size = sizes_seed[i];
                node.explicit = explicit_mask & (1 << i) != 0;
            }
            compute_sizes(&mut graph);

            for i in 0..n {
                let node = graph.get(&name(i)).unwrap();
                let strict = node.cumulative_size.unwrap();
                let relaxed = node.cumulative_size_relaxed.unwrap();
                prop_assert!(relaxed >= strict);
                prop_assert!(strict >= node.install_size);
                if graph.required_by(&name(i)).unwrap().is_empty() {
                    prop_assert_eq!(strict, node.install_size);
                }
            }
        }
    }
}
