//! Dependency cycle detection.
//!
//! Tarjan's strongly connected components algorithm over the `deps`
//! relation, written with an explicit call stack so that long dependency
//! chains cannot exhaust the thread stack. petgraph's `tarjan_scc` recurses
//! once per node on the current path, so a chain of a few hundred thousand
//! packages overflows it.
//!
//! All members of a component share one `Arc`'d member set.

use std::collections::BTreeSet;
use std::sync::Arc;

use petgraph::stable_graph::NodeIndex;
use tracing::{info, instrument};

use super::package_graph::PackageGraph;

/// One pending `strongconnect` call.
struct Frame {
    node: NodeIndex,
    deps: Vec<NodeIndex>,
    next: usize,
}

/// Bookkeeping for one run of Tarjan's algorithm, indexed by `NodeIndex::index()`.
struct Tarjan<'g> {
    graph: &'g PackageGraph,
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<NodeIndex>,
    calls: Vec<Frame>,
    counter: usize,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g PackageGraph) -> Self {
        let bound = graph.node_bound();
        Self {
            graph,
            index: vec![None; bound],
            lowlink: vec![0; bound],
            on_stack: vec![false; bound],
            stack: Vec::new(),
            calls: Vec::new(),
            counter: 0,
        }
    }

    fn enter(&mut self, node: NodeIndex) {
        let i = node.index();
        self.index[i] = Some(self.counter);
        self.lowlink[i] = self.counter;
        self.counter += 1;
        self.stack.push(node);
        self.on_stack[i] = true;
        self.calls.push(Frame {
            node,
            deps: self.graph.dep_indices(node),
            next: 0,
        });
    }

    /// Runs `strongconnect(root)` to completion, appending finished components.
    fn visit(&mut self, root: NodeIndex, components: &mut Vec<Vec<NodeIndex>>) {
        self.enter(root);

        while let Some(frame) = self.calls.last_mut() {
            let v = frame.node.index();
            if let Some(&w) = frame.deps.get(frame.next) {
                frame.next += 1;
                match self.index[w.index()] {
                    None => self.enter(w),
                    Some(w_index) if self.on_stack[w.index()] => {
                        self.lowlink[v] = self.lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            let finished = frame.node;
            self.calls.pop();
            if Some(self.lowlink[v]) == self.index[v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w.index()] = false;
                    component.push(w);
                    if w == finished {
                        break;
                    }
                }
                components.push(component);
            }
            if let Some(parent) = self.calls.last() {
                let p = parent.node.index();
                self.lowlink[p] = self.lowlink[p].min(self.lowlink[v]);
            }
        }
    }
}

/// Computes the strongly connected components of the graph.
///
/// Every node appears in exactly one component. Roots are visited in name
/// order, so the output is deterministic.
pub fn strongly_connected_components(graph: &PackageGraph) -> Vec<Vec<NodeIndex>> {
    let mut tarjan = Tarjan::new(graph);
    let mut components = Vec::new();
    for root in graph.indices() {
        if tarjan.index[root.index()].is_none() {
            tarjan.visit(root, &mut components);
        }
    }
    components
}

/// Annotates every node with the members of its strongly connected component.
///
/// Returns the number of components with more than one member.
#[instrument(skip_all, fields(nodes = graph.node_count()))]
pub fn find_cycles(graph: &mut PackageGraph) -> usize {
    let components = strongly_connected_components(graph);
    let mut cycles = 0;

    for component in &components {
        let members: Arc<BTreeSet<String>> = Arc::new(
            component
                .iter()
                .map(|&idx| graph.node(idx).name.clone())
                .collect(),
        );
        if members.len() > 1 {
            cycles += 1;
            tracing::debug!(members = ?members, "dependency cycle");
        }
        for &idx in component {
            graph.node_mut(idx).cycle_members = Arc::clone(&members);
        }
    }

    info!(components = components.len(), cycles, "found dependency cycles");
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::{graph_from_edges, name};
    use proptest::prelude::*;
    use std::collections::{HashSet, VecDeque};

    fn members(graph: &PackageGraph, node: &str) -> Vec<String> {
        graph
            .get(node)
            .unwrap()
            .cycle_members
            .iter()
            .cloned()
            .collect()
    }

    #[test]
    fn test_no_cycles() {
        let mut graph = graph_from_edges(3, &[(0, 1), (1, 2)]);
        assert_eq!(find_cycles(&mut graph), 0);
        assert_eq!(members(&graph, "p0"), vec!["p0"]);
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn test_two_node_cycle() {
        let mut graph = graph_from_edges(2, &[(0, 1), (1, 0)]);
        assert_eq!(find_cycles(&mut graph), 1);
        assert_eq!(members(&graph, "p0"), vec!["p0", "p1"]);
        assert_eq!(members(&graph, "p1"), vec!["p0", "p1"]);
    }

    #[test]
    fn test_cycle_with_tail() {
        // p0 -> p1 -> p2 -> p0, p2 -> p3
        let mut graph = graph_from_edges(4, &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        assert_eq!(find_cycles(&mut graph), 1);
        assert_eq!(members(&graph, "p1"), vec!["p0", "p1", "p2"]);
        assert_eq!(members(&graph, "p3"), vec!["p3"]);
        assert_eq!(graph.cycles()[0].cycle_path(), "p0 -> p1 -> p2 -> p0");
    }

    #[test]
    fn test_two_separate_cycles() {
        let mut graph = graph_from_edges(5, &[(0, 1), (1, 0), (2, 3), (3, 2), (1, 2), (4, 4)]);
        assert_eq!(find_cycles(&mut graph), 2);
        assert_eq!(members(&graph, "p4"), vec!["p4"]);
        assert_eq!(graph.cycles().len(), 2);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let n = 200_000;
        let edges: Vec<(usize, usize)> = (0..n - 1).map(|i| (i, i + 1)).collect();
        let mut graph = graph_from_edges(n, &edges);
        assert_eq!(find_cycles(&mut graph), 0);
    }

    #[test]
    fn test_large_ring_is_one_component() {
        let n = 1_000;
        let mut edges: Vec<(usize, usize)> = (0..n - 1).map(|i| (i, i + 1)).collect();
        edges.push((n - 1, 0));
        let mut graph = graph_from_edges(n, &edges);
        assert_eq!(find_cycles(&mut graph), 1);
        assert_eq!(graph.get(&name(0)).unwrap().cycle_members.len(), n);
    }

    #[test]
    fn test_component_members_share_one_set() {
        let mut graph = graph_from_edges(3, &[(0, 1), (1, 2), (2, 0)]);
        find_cycles(&mut graph);

        let first = &graph.get(&name(0)).unwrap().cycle_members;
        for i in 1..3 {
            assert!(Arc::ptr_eq(first, &graph.get(&name(i)).unwrap().cycle_members));
        }
    }

    fn reachable(edges: &[(usize, usize)], from: usize) -> HashSet<usize> {
        let mut seen = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(v) = queue.pop_front() {
            for &(a, b) in edges {
                if a == v && seen.insert(b) {
                    queue.push_back(b);
                }
            }
        }
        seen
    }

    proptest! {
        #[test]
        fn prop_components_partition_and_match_reachability(
            n in 1usize..12,
            raw_edges in proptest::collection::vec((0usize..12, 0usize..12), 0..30),
        ) {
            let edges: Vec<(usize, usize)> = raw_edges
                .into_iter()
                .filter(|&(a, b)| a < n && b < n && a != b)
                .collect();
            let mut graph = graph_from_edges(n, &edges);
            find_cycles(&mut graph);

            let components = strongly_connected_components(&graph);
            let total: usize = components.iter().map(Vec::len).sum();
            prop_assert_eq!(total, n);

            for a in 0..n {
                let from_a = reachable(&edges, a);
                for b in 0..n {
                    let mutual = from_a.contains(&b) && reachable(&edges, b).contains(&a);
                    let same = graph.get(&name(a)).unwrap().in_cycle_with(&name(b));
                    prop_assert_eq!(mutual, same);
                }
            }
            prop_assert!(graph.verify().is_ok());
        }
    }
}
