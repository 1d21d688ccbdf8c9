//! Export functionality for analyzed package graphs.
//!
//! [`GraphView`] flattens a [`PackageGraph`] into the node and edge lists a
//! renderer needs, applying the [`ViewOptions`] filters. Exporters then
//! write that view as JSON, CSV, or Markdown.

pub mod csv;
pub mod json;
pub mod markdown;

use crate::graph::{CycleInfo, GraphResult, PackageGraph, PackageNode};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// JSON format - the full node and edge lists
    #[default]
    Json,
    /// CSV format - one row per node
    Csv,
    /// Markdown format - summary report
    Markdown,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            _ => Err(format!(
                "Unknown export format: '{}'. Valid formats: json, csv, markdown",
                s
            )),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Presentation filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    /// Nodes at or beyond this level are left out.
    pub max_level: usize,
    /// Dependency edges are left out for dependants with at least this many deps.
    pub max_deps: usize,
    /// Dependency edges are left out for dependencies with at least this many dependants.
    pub max_reqs: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            max_level: usize::MAX,
            max_deps: usize::MAX,
            max_reqs: usize::MAX,
        }
    }
}

/// Id of the synthetic node standalone nodes are attached to.
pub const ANCHOR_ID: usize = 0;

/// Label of the anchor node.
pub const ANCHOR_NAME: &str = "standalone packages";

/// Display class of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeClass {
    /// The synthetic anchor
    Anchor,
    /// No dependencies and no dependants
    Standalone,
    Group,
    Vdep,
    /// Installed on request
    Explicit,
    /// Installed as a dependency
    Normal,
}

impl NodeClass {
    fn of(node: &PackageNode) -> Self {
        if node.level == 0 {
            NodeClass::Standalone
        } else if node.is_group() {
            NodeClass::Group
        } else if node.is_virtual() {
            NodeClass::Vdep
        } else if node.explicit {
            NodeClass::Explicit
        } else {
            NodeClass::Normal
        }
    }

    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            NodeClass::Anchor => "anchor",
            NodeClass::Standalone => "standalone",
            NodeClass::Group => "group",
            NodeClass::Vdep => "vdep",
            NodeClass::Explicit => "explicit",
            NodeClass::Normal => "normal",
        }
    }
}

/// Kind of a rendered edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Dependant to dependency
    Normal,
    /// Cycle-mate to node
    Cycle,
    /// Dependant to optional dependency
    Optional,
    /// Standalone node to the anchor
    StandaloneAnchor,
}

/// A node as handed to a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewNode {
    pub id: usize,
    pub name: String,
    pub level: usize,
    pub class: NodeClass,
    pub install_size: u64,
    pub cumulative_size: u64,
    pub cumulative_size_relaxed: u64,
    pub deps: Vec<String>,
    pub required_by: Vec<String>,
    pub optdeps: Vec<String>,
    pub groups: Vec<String>,
    pub provides: Vec<String>,
    /// Other members of the node's cycle
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycle: Vec<String>,
    pub description: String,
    pub version: String,
    pub repo: String,
}

impl ViewNode {
    fn anchor() -> Self {
        Self {
            id: ANCHOR_ID,
            name: ANCHOR_NAME.to_string(),
            level: 0,
            class: NodeClass::Anchor,
            install_size: 0,
            cumulative_size: 0,
            cumulative_size_relaxed: 0,
            deps: Vec::new(),
            required_by: Vec::new(),
            optdeps: Vec::new(),
            groups: Vec::new(),
            provides: Vec::new(),
            cycle: Vec::new(),
            description: String::new(),
            version: String::new(),
            repo: String::new(),
        }
    }

    fn from_node(id: usize, node: &PackageNode, graph: &PackageGraph) -> Self {
        let info = node.package_info().cloned().unwrap_or_default();
        Self {
            id,
            name: node.name.clone(),
            level: node.level,
            class: NodeClass::of(node),
            install_size: node.install_size,
            cumulative_size: node.cumulative_size.unwrap_or(node.install_size),
            cumulative_size_relaxed: node.cumulative_size_relaxed.unwrap_or(node.install_size),
            deps: owned(graph.deps(&node.name)),
            required_by: owned(graph.required_by(&node.name)),
            optdeps: info.optdeps,
            groups: info.groups,
            provides: info.provides,
            cycle: node
                .cycle_members
                .iter()
                .filter(|m| **m != node.name)
                .cloned()
                .collect(),
            description: info.description,
            version: info.version,
            repo: info.repo,
        }
    }
}

fn owned(names: GraphResult<Vec<&str>>) -> Vec<String> {
    names
        .map(|v| v.into_iter().map(str::to_string).collect())
        .unwrap_or_default()
}

/// An edge as handed to a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewEdge {
    pub id: usize,
    pub from: usize,
    pub to: usize,
    pub kind: EdgeKind,
}

/// The renderable form of an analyzed graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphView {
    /// Anchor first, then nodes by ascending level, ties by name
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
    /// Cycles among the visible nodes
    #[serde(serialize_with = "serialize_cycles")]
    pub cycles: Vec<CycleInfo>,
    pub max_level: usize,
    /// Sizes are node counts (the database had no size information)
    pub sizes_are_counts: bool,
}

fn serialize_cycles<S: serde::Serializer>(
    cycles: &[CycleInfo],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(cycles.iter().map(|c| &c.nodes))
}

impl GraphView {
    /// Builds the view of an analyzed graph.
    ///
    /// # Example
    ///
    /// ```
    /// use pkgscope::export::{EdgeKind, GraphView, ViewOptions};
    /// use pkgscope::graph::{analyze, AnalysisOptions};
    /// use pkgscope::parser::{PackageRecord, RecordSource};
    ///
    /// let source = RecordSource::new(vec![
    ///     PackageRecord::new("glibc", "2.39-1"),
    ///     PackageRecord::new("bash", "5.2-1").with_depends(["glibc"]),
    /// ]);
    /// let graph = analyze(&source, &AnalysisOptions::default()).unwrap();
    /// let view = GraphView::from_graph(&graph, &ViewOptions::default());
    ///
    /// assert_eq!(view.nodes.len(), 3);
    /// assert_eq!(view.nodes[1].name, "glibc");
    /// assert_eq!(view.edges[0].kind, EdgeKind::Normal);
    /// ```
    pub fn from_graph(graph: &PackageGraph, options: &ViewOptions) -> Self {
        // nodes() is name-sorted and the sort is stable, so ties stay by name
        let mut ordered = graph.nodes();
        ordered.sort_by_key(|n| n.level);
        ordered.retain(|n| n.level < options.max_level);

        let ids: HashMap<&str, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.as_str(), i + 1))
            .collect();

        let mut nodes = Vec::with_capacity(ordered.len() + 1);
        nodes.push(ViewNode::anchor());
        nodes.extend(
            ordered
                .iter()
                .map(|n| ViewNode::from_node(ids[n.name.as_str()], n, graph)),
        );

        let mut edges = Vec::new();
        let mut push = |from: usize, to: usize, kind: EdgeKind| {
            let id = edges.len();
            edges.push(ViewEdge { id, from, to, kind });
        };

        for node in nodes.iter().skip(1) {
            if node.deps.is_empty() && node.required_by.is_empty() {
                push(node.id, ANCHOR_ID, EdgeKind::StandaloneAnchor);
            }
            if node.deps.len() < options.max_deps {
                for dep in &node.deps {
                    if node.cycle.contains(dep) {
                        continue;
                    }
                    let Some(&dep_id) = ids.get(dep.as_str()) else {
                        continue;
                    };
                    if nodes[dep_id].required_by.len() < options.max_reqs {
                        push(node.id, dep_id, EdgeKind::Normal);
                    }
                }
            }
            for mate in &node.cycle {
                if let Some(&mate_id) = ids.get(mate.as_str()) {
                    push(mate_id, node.id, EdgeKind::Cycle);
                }
            }
            for optdep in &node.optdeps {
                if let Some(&opt_id) = ids.get(optdep.as_str()) {
                    push(node.id, opt_id, EdgeKind::Optional);
                }
            }
        }

        let cycles = graph
            .cycles()
            .into_iter()
            .filter(|c| c.nodes.iter().all(|n| ids.contains_key(n.as_str())))
            .collect();
        let max_level = nodes.iter().map(|n| n.level).max().unwrap_or(0);

        Self {
            nodes,
            edges,
            cycles,
            max_level,
            sizes_are_counts: graph.sizes_are_counts(),
        }
    }

    /// Real nodes, without the anchor.
    pub fn packages(&self) -> impl Iterator<Item = &ViewNode> {
        self.nodes.iter().filter(|n| n.class != NodeClass::Anchor)
    }

    /// Number of real nodes of the given class.
    pub fn count(&self, class: NodeClass) -> usize {
        self.packages().filter(|n| n.class == class).count()
    }

    /// Sum of installed sizes over all real nodes.
    pub fn total_install_size(&self) -> u64 {
        self.packages().map(|n| n.install_size).sum()
    }

    /// Formats a size column: bytes normally, a plain count when sizes are counts.
    pub fn display_size(&self, value: u64) -> String {
        if self.sizes_are_counts {
            value.to_string()
        } else {
            format_size(value)
        }
    }
}

/// Format a byte size as a human-readable string.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Trait for exporters.
pub trait Exporter {
    /// Export the view to the given writer.
    fn export<W: Write>(&self, view: &GraphView, writer: &mut W) -> io::Result<()>;
}

/// Export the view in the specified format.
pub fn export<W: Write>(format: ExportFormat, view: &GraphView, writer: &mut W) -> io::Result<()> {
    match format {
        ExportFormat::Json => json::JsonExporter.export(view, writer),
        ExportFormat::Csv => csv::CsvExporter.export(view, writer),
        ExportFormat::Markdown => markdown::MarkdownExporter.export(view, writer),
    }
}

/// Export the view to a string.
pub fn export_to_string(format: ExportFormat, view: &GraphView) -> io::Result<String> {
    let mut buffer = Vec::new();
    export(format, view, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}


#[cfg(test)]
mod tests {
    use super::fixtures::{sample_graph, sample_view};
    use super::*;

    fn node<'v>(view: &'v GraphView, name: &str) -> &'v ViewNode {
        view.nodes.iter().find(|n| n.name == name).unwrap()
    }

    fn has_edge(view: &GraphView, from: &str, to: &str, kind: EdgeKind) -> bool {
        let (from, to) = (node(view, from).id, node(view, to).id);
        view.edges
            .iter()
            .any(|e| e.from == from && e.to == to && e.kind == kind)
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(
            "markdown".parse::<ExportFormat>().unwrap(),
            ExportFormat::Markdown
        );
        assert_eq!(
            "md".parse::<ExportFormat>().unwrap(),
            ExportFormat::Markdown
        );
        assert!("invalid".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_export_format_display() {
        assert_eq!(format!("{}", ExportFormat::Json), "json");
        assert_eq!(format!("{}", ExportFormat::Csv), "csv");
        assert_eq!(format!("{}", ExportFormat::Markdown), "markdown");
    }

    #[test]
    fn test_anchor_comes_first() {
        let view = sample_view();
        assert_eq!(view.nodes[0].id, ANCHOR_ID);
        assert_eq!(view.nodes[0].class, NodeClass::Anchor);
        assert_eq!(view.nodes[0].level, 0);
    }

    #[test]
    fn test_ids_follow_level_order() {
        let view = sample_view();
        for (i, pair) in view.nodes.windows(2).enumerate() {
            assert_eq!(pair[1].id, i + 1);
            assert!(pair[0].level <= pair[1].level);
            if pair[0].level == pair[1].level && pair[0].id != ANCHOR_ID {
                assert!(pair[0].name < pair[1].name);
            }
        }
    }

    #[test]
    fn test_node_classes() {
        let view = sample_view();
        assert_eq!(node(&view, "cowsay").class, NodeClass::Standalone);
        assert_eq!(node(&view, "base").class, NodeClass::Group);
        assert_eq!(node(&view, "sh").class, NodeClass::Vdep);
        assert_eq!(node(&view, "bash").class, NodeClass::Explicit);
        assert_eq!(node(&view, "glibc").class, NodeClass::Normal);
        assert_eq!(view.count(NodeClass::Standalone), 1);
    }

    #[test]
    fn test_edge_kinds() {
        let view = sample_view();
        assert!(has_edge(&view, "bash", "glibc", EdgeKind::Normal));
        assert!(has_edge(&view, "cowsay", ANCHOR_NAME, EdgeKind::StandaloneAnchor));
        assert!(has_edge(&view, "bash", "bash-completion", EdgeKind::Optional));
        // cycle edges run from each mate to the node, in both directions here
        assert!(has_edge(&view, "gmp", "mpfr", EdgeKind::Cycle));
        assert!(has_edge(&view, "mpfr", "gmp", EdgeKind::Cycle));
        assert!(!has_edge(&view, "mpfr", "gmp", EdgeKind::Normal));
    }

    #[test]
    fn test_edge_ids_are_sequential() {
        let view = sample_view();
        for (i, edge) in view.edges.iter().enumerate() {
            assert_eq!(edge.id, i);
        }
    }

    #[test]
    fn test_cycle_members_listed() {
        let view = sample_view();
        assert_eq!(node(&view, "gmp").cycle, vec!["mpfr"]);
        assert!(node(&view, "bash").cycle.is_empty());
        assert_eq!(view.cycles.len(), 1);
    }

    #[test]
    fn test_max_level_drops_nodes_and_edges() {
        let graph = sample_graph();
        let options = ViewOptions {
            max_level: 2,
            ..Default::default()
        };
        let view = GraphView::from_graph(&graph, &options);

        assert!(view.packages().all(|n| n.level < 2));
        assert!(view.nodes.iter().any(|n| n.name == "glibc"));
        assert!(!view.nodes.iter().any(|n| n.name == "base"));
        let max_id = view.nodes.len();
        assert!(view.edges.iter().all(|e| e.from < max_id && e.to < max_id));
    }

    #[test]
    fn test_max_deps_and_reqs_suppress_normal_edges() {
        let graph = sample_graph();
        let options = ViewOptions {
            max_reqs: 2,
            ..Default::default()
        };
        let view = GraphView::from_graph(&graph, &options);
        // glibc has two dependants
        assert!(!has_edge(&view, "bash", "glibc", EdgeKind::Normal));
        assert!(has_edge(&view, "gawk", "sh", EdgeKind::Normal));

        let options = ViewOptions {
            max_deps: 1,
            ..Default::default()
        };
        let view = GraphView::from_graph(&graph, &options);
        assert!(!view.edges.iter().any(|e| e.kind == EdgeKind::Normal));
        // other kinds are unaffected
        assert!(view.edges.iter().any(|e| e.kind == EdgeKind::StandaloneAnchor));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
    }

    #[test]
    fn test_export_to_string_all_formats() {
        let view = sample_view();
        for format in [ExportFormat::Json, ExportFormat::Csv, ExportFormat::Markdown] {
            let out = export_to_string(format, &view).unwrap();
            assert!(out.contains("bash"), "{} output misses bash", format);
        }
    }
}
