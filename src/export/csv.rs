//! CSV export implementation.
//!
//! Exports one row per node for spreadsheet use. List columns are joined
//! with spaces.

use super::{Exporter, GraphView};
use std::io::{self, Write};

/// CSV exporter implementation.
pub struct CsvExporter;

impl CsvExporter {
    /// Escape a field value for CSV format.
    ///
    /// Wraps the value in quotes if it contains commas, quotes, or newlines.
    fn escape_field(value: &str) -> String {
        if value.contains(',') || value.contains('"') || value.contains('\n') {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }

    fn list(values: &[String]) -> String {
        Self::escape_field(&values.join(" "))
    }
}

impl Exporter for CsvExporter {
    fn export<W: Write>(&self, view: &GraphView, writer: &mut W) -> io::Result<()> {
        writeln!(
            writer,
            "id,name,version,repo,class,level,install_size,cumulative_size,\
             cumulative_size_relaxed,deps,required_by,optdeps,in_cycle,description"
        )?;

        for node in view.packages() {
            writeln!(
                writer,
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                node.id,
                Self::escape_field(&node.name),
                Self::escape_field(&node.version),
                Self::escape_field(&node.repo),
                node.class.label(),
                node.level,
                node.install_size,
                node.cumulative_size,
                node.cumulative_size_relaxed,
                Self::list(&node.deps),
                Self::list(&node.required_by),
                Self::list(&node.optdeps),
                !node.cycle.is_empty(),
                Self::escape_field(&node.description),
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures::sample_view;

    fn export_lines() -> Vec<String> {
        let mut output = Vec::new();
        CsvExporter.export(&sample_view(), &mut output).unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn row<'a>(lines: &'a [String], name: &str) -> &'a str {
        lines
            .iter()
            .find(|l| l.split(',').nth(1) == Some(name))
            .unwrap()
    }

    #[test]
    fn test_csv_export_basic() {
        let lines = export_lines();

        // Header + 9 nodes, anchor excluded
        assert_eq!(lines.len(), 10);
        assert!(lines[0].starts_with("id,name,version,repo,class,level"));
        assert!(lines[1].starts_with("1,cowsay,3.04-1,extra,standalone,0,100,"));
    }

    #[test]
    fn test_csv_export_classes() {
        let lines = export_lines();
        assert!(row(&lines, "base").contains(",group,"));
        assert!(row(&lines, "sh").contains(",vdep,"));
        assert!(row(&lines, "bash").contains(",explicit,"));
        assert!(row(&lines, "glibc").contains(",normal,"));
    }

    #[test]
    fn test_csv_export_cycles() {
        let lines = export_lines();
        assert!(row(&lines, "gmp").contains(",true,"));
        assert!(row(&lines, "mpfr").contains(",true,"));
        assert!(row(&lines, "bash").contains(",false,"));
    }

    #[test]
    fn test_csv_export_lists() {
        let lines = export_lines();
        // gawk depends on sh then mpfr
        assert!(row(&lines, "gawk").contains(",sh mpfr,"));
    }

    #[test]
    fn test_csv_escape_field() {
        // No escaping needed
        assert_eq!(CsvExporter::escape_field("simple"), "simple");

        // Contains comma
        assert_eq!(
            CsvExporter::escape_field("has,comma"),
            "\"has,comma\""
        );

        // Contains quotes
        assert_eq!(
            CsvExporter::escape_field("has\"quote"),
            "\"has\"\"quote\""
        );

        // Contains newline
        assert_eq!(
            CsvExporter::escape_field("has\nnewline"),
            "\"has\nnewline\""
        );
    }

    #[test]
    fn test_csv_export_special_characters() {
        let lines = export_lines();
        assert!(row(&lines, "cowsay")
            .ends_with(",\"Configurable talking cow, with \"\"quotes\"\"\""));
    }
}
