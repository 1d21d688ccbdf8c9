//! JSON export implementation.
//!
//! Writes the full view (nodes, edges, cycles) plus a summary block, for
//! renderers and other machine consumers.

use super::{EdgeKind, Exporter, GraphView, NodeClass, ViewEdge, ViewNode};
use serde::Serialize;
use std::io::{self, Write};

/// JSON exporter implementation.
pub struct JsonExporter;

/// Summary statistics for JSON output.
#[derive(Serialize)]
struct JsonSummary {
    nodes: usize,
    edges: usize,
    explicit: usize,
    normal: usize,
    groups: usize,
    virtual_dependencies: usize,
    standalone: usize,
    cycles: usize,
    max_level: usize,
    total_install_size: u64,
    sizes_are_counts: bool,
}

/// Root JSON export structure.
#[derive(Serialize)]
struct JsonExport<'a> {
    summary: JsonSummary,
    nodes: &'a [ViewNode],
    edges: &'a [ViewEdge],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cycles: Vec<JsonCycle<'a>>,
}

/// Serializable cycle info for JSON output.
#[derive(Serialize)]
struct JsonCycle<'a> {
    packages: &'a [String],
    path: String,
}

impl Exporter for JsonExporter {
    fn export<W: Write>(&self, view: &GraphView, writer: &mut W) -> io::Result<()> {
        let cycles: Vec<JsonCycle> = view
            .cycles
            .iter()
            .map(|c| JsonCycle {
                packages: &c.nodes,
                path: c.cycle_path(),
            })
            .collect();

        let export = JsonExport {
            summary: JsonSummary {
                nodes: view.packages().count(),
                edges: view
                    .edges
                    .iter()
                    .filter(|e| e.kind != EdgeKind::StandaloneAnchor)
                    .count(),
                explicit: view.count(NodeClass::Explicit),
                normal: view.count(NodeClass::Normal),
                groups: view.count(NodeClass::Group),
                virtual_dependencies: view.count(NodeClass::Vdep),
                standalone: view.count(NodeClass::Standalone),
                cycles: view.cycles.len(),
                max_level: view.max_level,
                total_install_size: view.total_install_size(),
                sizes_are_counts: view.sizes_are_counts,
            },
            nodes: &view.nodes,
            edges: &view.edges,
            cycles,
        };

        let json = serde_json::to_string_pretty(&export)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        writeln!(writer, "{}", json)
    }
}
