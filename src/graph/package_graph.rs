//! Package graph implementation using petgraph.
//!
//! Provides the single graph-owning structure for packages, package groups
//! and virtual dependencies. Edges point from the dependant to its
//! dependency; the reverse view (`required_by`) is read from the same edges,
//! so the two directions can never disagree.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, NodeIndexable};
use petgraph::Direction;

use crate::parser::{MalformedVersionSpec, PackageRecord};

/// Errors raised by graph construction and lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A name was looked up that was never registered.
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    /// Two nodes were registered under the same name.
    #[error("duplicate node '{0}'")]
    DuplicateNode(String),

    /// A dependency string could not be parsed.
    #[error(transparent)]
    MalformedVersionSpec(#[from] MalformedVersionSpec),
}

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Package-only metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    /// Full version string
    pub version: String,
    /// Human readable description
    pub description: String,
    /// Repository the package comes from
    pub repo: String,
    /// Groups the package belongs to
    pub groups: Vec<String>,
    /// Resolved optional dependency names
    pub optdeps: Vec<String>,
    /// Bare capability names the package provides
    pub provides: Vec<String>,
}

/// The variant of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An installable package.
    Package(PackageInfo),
    /// A package group; depends on each of its members.
    Group,
    /// A capability only satisfied through `provides`; depends on its providers.
    VirtualDependency,
}

impl NodeKind {
    /// Short label for the variant.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Package(_) => "package",
            NodeKind::Group => "group",
            NodeKind::VirtualDependency => "vdep",
        }
    }
}

/// A node in the package graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    /// Unique name
    pub name: String,
    /// Variant and variant-specific data
    pub kind: NodeKind,
    /// Layer assignment; 1 until leveling runs, 0 means standalone
    pub level: usize,
    /// Names in this node's strongly connected component, always including itself.
    /// Shared by every member of the component.
    pub cycle_members: Arc<BTreeSet<String>>,
    /// Installed size in bytes (or the placeholder 1 when sizes are unknown)
    pub install_size: u64,
    /// Size of everything that breaks when this node is removed
    pub cumulative_size: Option<u64>,
    /// Like `cumulative_size`, also counting implicit dependencies left orphaned
    pub cumulative_size_relaxed: Option<u64>,
    /// Whether the user asked for this node explicitly
    pub explicit: bool,
}

impl PackageNode {
    fn with_kind(name: impl Into<String>, kind: NodeKind, install_size: u64, explicit: bool) -> Self {
        let name = name.into();
        let cycle_members = Arc::new(BTreeSet::from([name.clone()]));
        Self {
            name,
            kind,
            level: 1,
            cycle_members,
            install_size,
            cumulative_size: None,
            cumulative_size_relaxed: None,
            explicit,
        }
    }

    /// Creates a package node from a record.
    ///
    /// Relations (`optdeps`, `provides`) start empty; the resolver fills them.
    pub fn package(record: &PackageRecord) -> Self {
        let info = PackageInfo {
            version: record.version.clone(),
            description: record.description.clone(),
            repo: record.repo.clone(),
            groups: record.groups.clone(),
            optdeps: Vec::new(),
            provides: Vec::new(),
        };
        Self::with_kind(
            &record.name,
            NodeKind::Package(info),
            record.install_size.unwrap_or(0),
            record.explicit,
        )
    }

    /// Creates a group node.
    pub fn group(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::Group, 0, true)
    }

    /// Creates a virtual dependency node.
    pub fn virtual_dependency(name: impl Into<String>) -> Self {
        Self::with_kind(name, NodeKind::VirtualDependency, 0, false)
    }

    /// Package metadata, if this node is a package.
    pub fn package_info(&self) -> Option<&PackageInfo> {
        match &self.kind {
            NodeKind::Package(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_package(&self) -> bool {
        matches!(self.kind, NodeKind::Package(_))
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group)
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.kind, NodeKind::VirtualDependency)
    }

    /// Returns true if `other` is in the same strongly connected component.
    pub fn in_cycle_with(&self, other: &str) -> bool {
        self.cycle_members.contains(other)
    }

    /// Returns true if the node shares a component with at least one other node.
    pub fn is_in_cycle(&self) -> bool {
        self.cycle_members.len() > 1
    }
}

/// A directed graph of packages, groups and virtual dependencies.
///
/// The graph uses petgraph's `StableDiGraph` internally so that pruning
/// virtual dependencies does not invalidate the indices of other nodes.
///
/// # Example
///
/// ```rust
/// use pkgscope::graph::{PackageGraph, PackageNode};
/// use pkgscope::parser::PackageRecord;
///
/// let mut graph = PackageGraph::new();
/// graph.create_node(PackageNode::package(&PackageRecord::new("bash", "5.2-1"))).unwrap();
/// graph.create_node(PackageNode::package(&PackageRecord::new("glibc", "2.39-1"))).unwrap();
/// graph.add_edge("bash", "glibc").unwrap();
///
/// assert_eq!(graph.deps("bash").unwrap(), vec!["glibc"]);
/// assert_eq!(graph.required_by("glibc").unwrap(), vec!["bash"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    /// The underlying directed graph
    graph: StableDiGraph<PackageNode, ()>,
    /// Maps node names to their indices for O(1) lookup
    node_indices: HashMap<String, NodeIndex>,
    /// Installed sizes are placeholders, so size sums count nodes
    sizes_are_counts: bool,
}

impl PackageGraph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new graph with pre-allocated capacity.
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            graph: StableDiGraph::with_capacity(nodes, edges),
            node_indices: HashMap::with_capacity(nodes),
            sizes_are_counts: false,
        }
    }

    /// Returns true if sizes are node counts rather than bytes.
    pub fn sizes_are_counts(&self) -> bool {
        self.sizes_are_counts
    }

    pub(crate) fn set_sizes_are_counts(&mut self, counts: bool) {
        self.sizes_are_counts = counts;
    }

    /// Registers a node.
    ///
    /// # Errors
    ///
    /// [`GraphError::DuplicateNode`] if a node with the same name exists.
    pub fn create_node(&mut self, node: PackageNode) -> GraphResult<NodeIndex> {
        if self.node_indices.contains_key(&node.name) {
            return Err(GraphError::DuplicateNode(node.name));
        }
        let name = node.name.clone();
        let idx = self.graph.add_node(node);
        self.node_indices.insert(name, idx);
        Ok(idx)
    }

    /// Adds a dependency edge from `from` (the dependant) to `to`.
    ///
    /// Returns `Ok(false)` when the edge already exists or would be a
    /// self-loop, in which case nothing changes.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownNode`] if either endpoint is not registered.
    pub fn add_edge(&mut self, from: &str, to: &str) -> GraphResult<bool> {
        let from_idx = self.index_of(from)?;
        let to_idx = self.index_of(to)?;
        Ok(self.add_edge_by_index(from_idx, to_idx))
    }

    pub(crate) fn add_edge_by_index(&mut self, from: NodeIndex, to: NodeIndex) -> bool {
        if from == to || self.graph.contains_edge(from, to) {
            return false;
        }
        self.graph.add_edge(from, to, ());
        true
    }

    /// Gets a node by name.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnknownNode`] if the name is not registered.
    pub fn get(&self, name: &str) -> GraphResult<&PackageNode> {
        let idx = self.index_of(name)?;
        Ok(&self.graph[idx])
    }

    /// Gets a mutable node by name.
    pub fn get_mut(&mut self, name: &str) -> GraphResult<&mut PackageNode> {
        let idx = self.index_of(name)?;
        Ok(&mut self.graph[idx])
    }

    /// Returns the index of a node.
    pub fn index_of(&self, name: &str) -> GraphResult<NodeIndex> {
        self.node_indices
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(name.to_string()))
    }

    /// Checks if a node exists in the graph.
    pub fn contains(&self, name: &str) -> bool {
        self.node_indices.contains_key(name)
    }

    /// Names this node depends on, in insertion order.
    pub fn deps(&self, name: &str) -> GraphResult<Vec<&str>> {
        let idx = self.index_of(name)?;
        Ok(self.names(self.dep_indices(idx)))
    }

    /// Names of nodes that depend on this node, in insertion order.
    pub fn required_by(&self, name: &str) -> GraphResult<Vec<&str>> {
        let idx = self.index_of(name)?;
        Ok(self.names(self.req_indices(idx)))
    }

    /// Returns the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Checks if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All nodes, sorted by name.
    pub fn nodes(&self) -> Vec<&PackageNode> {
        self.indices().into_iter().map(|idx| &self.graph[idx]).collect()
    }

    /// Highest level currently assigned.
    pub fn max_level(&self) -> usize {
        self.graph.node_weights().map(|n| n.level).max().unwrap_or(0)
    }

    /// Every strongly connected component with more than one member.
    ///
    /// Cycle members are reported in name order and each cycle once.
    pub fn cycles(&self) -> Vec<CycleInfo> {
        self.nodes()
            .into_iter()
            .filter(|n| n.is_in_cycle() && n.cycle_members.first() == Some(&n.name))
            .map(|n| CycleInfo {
                nodes: n.cycle_members.iter().cloned().collect(),
            })
            .collect()
    }

    /// Checks that every name in a cycle set refers to a registered node.
    pub fn verify(&self) -> GraphResult<()> {
        for node in self.graph.node_weights() {
            for member in node.cycle_members.iter() {
                self.index_of(member)?;
            }
        }
        Ok(())
    }

    /// Node indices, sorted by node name for deterministic traversal.
    pub(crate) fn indices(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        indices.sort_by(|a, b| self.graph[*a].name.cmp(&self.graph[*b].name));
        indices
    }

    /// Dependencies of `idx`, ordered by edge insertion.
    pub(crate) fn dep_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors_ordered(idx, Direction::Outgoing)
    }

    /// Reverse dependencies of `idx`, ordered by edge insertion.
    pub(crate) fn req_indices(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors_ordered(idx, Direction::Incoming)
    }

    pub(crate) fn dep_count(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Outgoing).count()
    }

    pub(crate) fn req_count(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    /// Upper bound on `NodeIndex::index()` for indexing side tables.
    pub(crate) fn node_bound(&self) -> usize {
        self.graph.node_bound()
    }

    pub(crate) fn node(&self, idx: NodeIndex) -> &PackageNode {
        &self.graph[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIndex) -> &mut PackageNode {
        &mut self.graph[idx]
    }

    /// Removes a node together with all its edges.
    pub(crate) fn remove_node(&mut self, idx: NodeIndex) -> Option<PackageNode> {
        let node = self.graph.remove_node(idx)?;
        self.node_indices.remove(&node.name);
        Some(node)
    }

    fn neighbors_ordered(&self, idx: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, dir)
            .map(|e| {
                let other = match dir {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.id(), other)
            })
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, other)| other).collect()
    }

    fn names(&self, indices: Vec<NodeIndex>) -> Vec<&str> {
        indices
            .into_iter()
            .map(|idx| self.graph[idx].name.as_str())
            .collect()
    }
}

/// Information about a detected dependency cycle.
///
/// Contains the names of the packages that form the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleInfo {
    /// The names in the cycle
    pub nodes: Vec<String>,
}

impl CycleInfo {
    /// Returns a formatted string representation of the cycle.
    ///
    /// For example: "a -> b -> c -> a"
    pub fn cycle_path(&self) -> String {
        let Some(first) = self.nodes.first() else {
            return String::new();
        };
        format!("{} -> {}", self.nodes.join(" -> "), first)
    }

    /// Returns the number of packages in the cycle.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the cycle is empty (should not happen in practice).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
