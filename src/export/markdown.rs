//! Markdown export implementation.
//!
//! Exports a summary report: node counts, level distribution, dependency
//! cycles, and the packages whose removal frees the most space.

use super::{Exporter, GraphView, NodeClass, ViewNode};
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Rows in the largest-removal table.
const TOP_REMOVALS: usize = 15;

/// Markdown exporter implementation.
pub struct MarkdownExporter;

impl MarkdownExporter {
    fn write_removals<W: Write>(view: &GraphView, writer: &mut W) -> io::Result<()> {
        let mut largest: Vec<&ViewNode> = view
            .packages()
            .filter(|n| {
                matches!(
                    n.class,
                    NodeClass::Explicit | NodeClass::Normal | NodeClass::Standalone
                )
            })
            .collect();
        largest.sort_by(|a, b| {
            b.cumulative_size_relaxed
                .cmp(&a.cumulative_size_relaxed)
                .then_with(|| a.name.cmp(&b.name))
        });
        largest.truncate(TOP_REMOVALS);

        if largest.is_empty() {
            return Ok(());
        }

        writeln!(writer, "## Largest Removals")?;
        writeln!(writer)?;
        writeln!(writer, "| Package | Installed | Breaks | Frees (with orphans) |")?;
        writeln!(writer, "|---------|-----------|--------|----------------------|")?;
        for node in largest {
            writeln!(
                writer,
                "| {} | {} | {} | {} |",
                node.name,
                view.display_size(node.install_size),
                view.display_size(node.cumulative_size),
                view.display_size(node.cumulative_size_relaxed)
            )?;
        }
        writeln!(writer)
    }
}

impl Exporter for MarkdownExporter {
    fn export<W: Write>(&self, view: &GraphView, writer: &mut W) -> io::Result<()> {
        // Title
        writeln!(writer, "# Package Graph Report")?;
        writeln!(writer)?;

        // Summary section
        writeln!(writer, "## Summary")?;
        writeln!(writer)?;
        writeln!(writer, "| Metric | Count |")?;
        writeln!(writer, "|--------|-------|")?;
        writeln!(writer, "| Total Nodes | {} |", view.packages().count())?;
        writeln!(writer, "| Explicit | {} |", view.count(NodeClass::Explicit))?;
        writeln!(writer, "| Dependencies | {} |", view.count(NodeClass::Normal))?;
        writeln!(writer, "| Standalone | {} |", view.count(NodeClass::Standalone))?;
        writeln!(writer, "| Groups | {} |", view.count(NodeClass::Group))?;
        writeln!(
            writer,
            "| Virtual Dependencies | {} |",
            view.count(NodeClass::Vdep)
        )?;
        writeln!(writer, "| Dependency Cycles | {} |", view.cycles.len())?;
        writeln!(writer, "| Levels | {} |", view.max_level)?;
        writeln!(
            writer,
            "| Total Installed Size | {} |",
            view.display_size(view.total_install_size())
        )?;
        writeln!(writer)?;

        // Level distribution
        let mut per_level: BTreeMap<usize, usize> = BTreeMap::new();
        for node in view.packages() {
            *per_level.entry(node.level).or_default() += 1;
        }
        if !per_level.is_empty() {
            writeln!(writer, "## Levels")?;
            writeln!(writer)?;
            writeln!(writer, "| Level | Nodes |")?;
            writeln!(writer, "|-------|-------|")?;
            for (level, count) in &per_level {
                writeln!(writer, "| {} | {} |", level, count)?;
            }
            writeln!(writer)?;
        }

        // Circular dependencies
        if !view.cycles.is_empty() {
            writeln!(writer, "## Dependency Cycles")?;
            writeln!(writer)?;
            writeln!(writer, "The following dependency cycles were detected:")?;
            writeln!(writer)?;
            for (i, cycle) in view.cycles.iter().enumerate() {
                writeln!(writer, "{}. `{}`", i + 1, cycle.cycle_path())?;
            }
            writeln!(writer)?;
        }

        Self::write_removals(view, writer)?;

        // Footer
        writeln!(writer, "---")?;
        writeln!(writer, "*Generated by pkgscope*")?;

        Ok(())
    }
}
