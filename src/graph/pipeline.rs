//! End-to-end analysis: build, detect cycles, level, size.

use tracing::{info, instrument};

use super::cycles::find_cycles;
use super::levels::{assign_levels, magic_boost, LevelBoost, LevelingOptions};
use super::package_graph::{GraphResult, PackageGraph};
use super::resolve::build_graph;
use super::sizes::{apply_placeholder_sizes, compute_sizes};
use crate::parser::PackageSource;

/// Engine options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Spread highly connected nodes over more levels.
    pub use_magic_leveling: bool,
    /// Run an extra top-down pass after the bottom-up pass.
    pub align_top: bool,
    /// Keep virtual dependencies that nothing depends on.
    pub show_all_virtual_deps: bool,
}

impl AnalysisOptions {
    fn leveling(&self) -> LevelingOptions {
        LevelingOptions {
            boost: self.use_magic_leveling.then_some(magic_boost as LevelBoost),
            align_top: self.align_top,
        }
    }
}

/// Builds the graph for `source` and runs every analysis over it.
///
/// # Errors
///
/// Propagates [`GraphError::DuplicateNode`](super::GraphError::DuplicateNode)
/// from graph construction.
#[instrument(skip_all, fields(records = source.records().len()))]
pub fn analyze<S: PackageSource + ?Sized>(
    source: &S,
    options: &AnalysisOptions,
) -> GraphResult<PackageGraph> {
    let mut graph = build_graph(source, options.show_all_virtual_deps)?;

    let cycles = find_cycles(&mut graph);
    let max_level = assign_levels(&mut graph, &options.leveling());

    if source.sizes_unavailable() {
        info!("no install sizes available, counting packages instead");
        apply_placeholder_sizes(&mut graph);
    }
    let (max_size, max_size_relaxed) = compute_sizes(&mut graph);

    info!(cycles, max_level, max_size, max_size_relaxed, "analysis complete");
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphError;
    use crate::parser::{PackageRecord, RecordSource};

    fn sample() -> RecordSource {
        RecordSource::new(vec![
            PackageRecord::new("glibc", "2.39-1").with_size(40).as_dependency(),
            PackageRecord::new("readline", "8.2-1")
                .with_size(2)
                .with_depends(["glibc", "ncurses"])
                .as_dependency(),
            PackageRecord::new("ncurses", "6.4-1")
                .with_size(3)
                .with_depends(["glibc"])
                .as_dependency(),
            PackageRecord::new("bash", "5.2-1")
                .with_size(8)
                .with_depends(["readline", "glibc"])
                .with_provides(["sh"])
                .with_groups(["base"]),
            PackageRecord::new("gawk", "5.3-1").with_size(4).with_depends(["sh"]),
            PackageRecord::new("dash", "0.5-1").with_size(1).with_provides(["dash-sh"]),
            PackageRecord::new("lonely", "1.0-1").with_size(5),
        ])
    }

    #[test]
    fn test_analyze_levels_and_sizes() {
        let graph = analyze(&sample(), &AnalysisOptions::default()).unwrap();

        assert_eq!(graph.get("glibc").unwrap().level, 1);
        assert_eq!(graph.get("ncurses").unwrap().level, 2);
        assert_eq!(graph.get("readline").unwrap().level, 3);
        assert_eq!(graph.get("bash").unwrap().level, 4);
        assert_eq!(graph.get("sh").unwrap().level, 5);
        assert_eq!(graph.get("gawk").unwrap().level, 6);
        assert_eq!(graph.get("lonely").unwrap().level, 0);
        assert_eq!(graph.max_level(), 6);

        // nothing depends on dash-sh, so it is pruned
        assert!(!graph.contains("dash-sh"));

        let glibc = graph.get("glibc").unwrap();
        assert_eq!(glibc.cumulative_size, Some(40 + 3 + 2 + 8 + 4));
        let bash = graph.get("bash").unwrap();
        assert_eq!(bash.cumulative_size, Some(8 + 4));
        // readline, ncurses and then glibc are orphaned once bash goes
        assert_eq!(bash.cumulative_size_relaxed, Some(8 + 4 + 2 + 3 + 40));
        assert_eq!(graph.get("gawk").unwrap().cumulative_size_relaxed, Some(4));
    }

    #[test]
    fn test_analyze_keeps_vdeps_when_asked() {
        let options = AnalysisOptions {
            show_all_virtual_deps: true,
            ..Default::default()
        };
        let graph = analyze(&sample(), &options).unwrap();
        assert!(graph.get("dash-sh").unwrap().is_virtual());
    }

    #[test]
    fn test_analyze_placeholder_sizes() {
        let source = RecordSource::new(vec![
            PackageRecord::new("a", "1"),
            PackageRecord::new("b", "1").with_depends(["a"]),
        ]);
        let graph = analyze(&source, &AnalysisOptions::default()).unwrap();
        assert_eq!(graph.get("a").unwrap().install_size, 1);
        assert_eq!(graph.get("a").unwrap().cumulative_size, Some(2));
    }

    #[test]
    fn test_analyze_reports_cycles() {
        let source = RecordSource::new(vec![
            PackageRecord::new("a", "1").with_size(1).with_depends(["b"]),
            PackageRecord::new("b", "1").with_size(1).with_depends(["a"]),
            PackageRecord::new("c", "1").with_size(1).with_depends(["a"]),
        ]);
        let graph = analyze(&source, &AnalysisOptions::default()).unwrap();
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].nodes, vec!["a", "b"]);
        assert!(graph.get("c").unwrap().level > graph.get("a").unwrap().level);
    }

    #[test]
    fn test_analyze_duplicate_record() {
        let source = RecordSource::new(vec![
            PackageRecord::new("a", "1"),
            PackageRecord::new("a", "2"),
        ]);
        let err = analyze(&source, &AnalysisOptions::default()).unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode("a".to_string()));
    }

    #[test]
    fn test_magic_leveling_never_lowers_order() {
        let options = AnalysisOptions {
            use_magic_leveling: true,
            align_top: true,
            ..Default::default()
        };
        let graph = analyze(&sample(), &options).unwrap();
        for node in graph.nodes() {
            for dep in graph.deps(&node.name).unwrap() {
                assert!(graph.get(dep).unwrap().level < node.level);
            }
        }
    }
}
