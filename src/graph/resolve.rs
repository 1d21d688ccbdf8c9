//! Graph construction and dependency resolution.
//!
//! Builds a [`PackageGraph`] from a [`PackageSource`]: one node per record,
//! one node per package group, and a virtual dependency node for every
//! capability that is only available through `provides`. Raw dependency
//! strings are then resolved into edges.

use petgraph::stable_graph::NodeIndex;
use tracing::{debug, info, instrument, warn};

use super::package_graph::{GraphError, GraphResult, NodeKind, PackageGraph, PackageNode};
use crate::parser::version::optdepend_name;
use crate::parser::{DepSpec, PackageSource};

/// Outcome of resolving one dependency string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The dependency maps to this node.
    Resolved(String),
    /// Nothing in the graph satisfies it; the dependency is outside the snapshot.
    Unresolved,
}

/// Counters collected while building, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub packages: usize,
    pub groups: usize,
    pub virtual_deps: usize,
    pub pruned: usize,
    pub unresolved: usize,
    pub malformed: usize,
}

/// Builds and resolves the graph for every record in `source`.
///
/// Unless `keep_unused_virtual_deps` is set, virtual dependencies nobody
/// depends on are pruned afterwards.
///
/// # Errors
///
/// [`GraphError::DuplicateNode`] if two records (or a record and a group)
/// share a name. Unresolved and malformed dependencies are dropped.
///
/// # Example
///
/// ```
/// use pkgscope::graph::build_graph;
/// use pkgscope::parser::{PackageRecord, RecordSource};
///
/// let source = RecordSource::new(vec![
///     PackageRecord::new("x", "1").with_provides(["y"]),
///     PackageRecord::new("z", "1").with_depends(["y"]),
/// ]);
/// let graph = build_graph(&source, false).unwrap();
///
/// assert!(graph.get("y").unwrap().is_virtual());
/// assert_eq!(graph.required_by("y").unwrap(), vec!["z"]);
/// assert_eq!(graph.deps("y").unwrap(), vec!["x"]);
/// ```
#[instrument(skip_all, fields(records = source.records().len()))]
pub fn build_graph<S: PackageSource + ?Sized>(
    source: &S,
    keep_unused_virtual_deps: bool,
) -> GraphResult<PackageGraph> {
    let records = source.records();
    let edge_hint: usize = records.iter().map(|r| r.depends.len()).sum();
    let mut graph = PackageGraph::with_capacity(records.len(), edge_hint);
    let mut stats = BuildStats::default();

    let mut package_indices = Vec::with_capacity(records.len());
    for record in records {
        package_indices.push(graph.create_node(PackageNode::package(record))?);
        stats.packages += 1;
    }

    for (record, &member) in records.iter().zip(&package_indices) {
        for group in &record.groups {
            let group_idx = match graph.index_of(group) {
                Ok(idx) if graph.node(idx).is_group() => idx,
                Ok(_) => return Err(GraphError::DuplicateNode(group.clone())),
                Err(_) => {
                    stats.groups += 1;
                    graph.create_node(PackageNode::group(group.as_str()))?
                }
            };
            graph.add_edge_by_index(group_idx, member);
        }
    }

    for (record, &provider) in records.iter().zip(&package_indices) {
        for provide in &record.provides {
            let capability = DepSpec::strip_version(provide);
            if capability.is_empty() {
                continue;
            }
            record_provide(&mut graph, provider, capability);
            if capability == record.name {
                continue;
            }
            let cap_idx = match graph.index_of(capability) {
                Ok(idx) if graph.node(idx).is_virtual() => idx,
                // a real node of that name already exists: plain alias
                Ok(_) => continue,
                Err(_) => {
                    stats.virtual_deps += 1;
                    graph.create_node(PackageNode::virtual_dependency(capability))?
                }
            };
            graph.add_edge_by_index(cap_idx, provider);
        }
    }

    for (record, &consumer) in records.iter().zip(&package_indices) {
        for raw in &record.depends {
            match resolve_dependency(&graph, source, raw) {
                Ok(Resolution::Resolved(target)) => {
                    let target_idx = graph.index_of(&target)?;
                    graph.add_edge_by_index(consumer, target_idx);
                }
                Ok(Resolution::Unresolved) => {
                    stats.unresolved += 1;
                    debug!(package = %record.name, dependency = %raw, "unresolved dependency");
                }
                Err(err) => {
                    stats.malformed += 1;
                    warn!(package = %record.name, %err, "dropping dependency");
                }
            }
        }

        let optdeps = resolve_optdepends(&graph, source, &record.name, &record.optdepends);
        if let NodeKind::Package(info) = &mut graph.node_mut(consumer).kind {
            info.optdeps = optdeps;
        }
    }

    if !keep_unused_virtual_deps {
        stats.pruned = prune_virtual_deps(&mut graph);
    }

    info!(
        packages = stats.packages,
        groups = stats.groups,
        virtual_deps = stats.virtual_deps - stats.pruned,
        pruned = stats.pruned,
        unresolved = stats.unresolved,
        malformed = stats.malformed,
        edges = graph.edge_count(),
        "built package graph"
    );
    Ok(graph)
}

/// Resolves one raw dependency string against the graph and the source.
///
/// An exact node name wins. Otherwise the source's satisfier is used; when
/// the satisfier only matches through `provides` and a virtual dependency
/// node exists for the capability, the edge goes to that node instead so it
/// records who needs the capability.
///
/// # Errors
///
/// [`GraphError::MalformedVersionSpec`] if the comparator cannot be parsed.
pub fn resolve_dependency<S: PackageSource + ?Sized>(
    graph: &PackageGraph,
    source: &S,
    raw: &str,
) -> GraphResult<Resolution> {
    if graph.contains(raw) {
        return Ok(Resolution::Resolved(raw.to_string()));
    }
    let spec = DepSpec::parse(raw)?;
    let Some(satisfier) = source.find_satisfier(&spec) else {
        return Ok(Resolution::Unresolved);
    };
    if satisfier != spec.name {
        if let Ok(capability) = graph.get(&spec.name) {
            if capability.is_virtual() {
                return Ok(Resolution::Resolved(capability.name.clone()));
            }
        }
    }
    if graph.contains(satisfier) {
        Ok(Resolution::Resolved(satisfier.to_string()))
    } else {
        Ok(Resolution::Unresolved)
    }
}

/// Resolves optional dependencies to package names without touching the graph.
fn resolve_optdepends<S: PackageSource + ?Sized>(
    graph: &PackageGraph,
    source: &S,
    package: &str,
    optdepends: &[String],
) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::new();
    for raw in optdepends {
        let name = optdepend_name(raw);
        let target = if graph.get(name).is_ok_and(|n| n.is_package()) {
            Some(name.to_string())
        } else {
            match DepSpec::parse(name) {
                Ok(spec) => source.find_satisfier(&spec).map(str::to_string),
                Err(err) => {
                    warn!(%package, %err, "dropping optional dependency");
                    None
                }
            }
        };
        match target {
            Some(target) if target != package && !resolved.contains(&target) => {
                resolved.push(target)
            }
            Some(_) => {}
            None => debug!(%package, optdepend = %raw, "unresolved optional dependency"),
        }
    }
    resolved
}

fn record_provide(graph: &mut PackageGraph, provider: NodeIndex, capability: &str) {
    if let NodeKind::Package(info) = &mut graph.node_mut(provider).kind {
        if !info.provides.iter().any(|p| p == capability) {
            info.provides.push(capability.to_string());
        }
    }
}

/// Removes virtual dependencies with no reverse dependencies.
///
/// Returns the number of nodes removed. Their edges to providers go with them.
pub fn prune_virtual_deps(graph: &mut PackageGraph) -> usize {
    let unused: Vec<NodeIndex> = graph
        .indices()
        .into_iter()
        .filter(|&idx| graph.node(idx).is_virtual() && graph.req_count(idx) == 0)
        .collect();
    for &idx in &unused {
        if let Some(node) = graph.remove_node(idx) {
            debug!(capability = %node.name, "pruned unused virtual dependency");
        }
    }
    unused.len()
}
