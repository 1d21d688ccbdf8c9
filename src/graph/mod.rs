//! Graph module for package relationship modeling.
//!
//! This module provides the [`PackageGraph`] struct and the analyses run
//! over it: dependency resolution, cycle detection, leveling and
//! cumulative size aggregation. [`analyze`] runs all of them in order.
//!
//! # Example
//!
//! ```rust
//! use pkgscope::graph::{analyze, AnalysisOptions};
//! use pkgscope::parser::{PackageRecord, RecordSource};
//!
//! let source = RecordSource::new(vec![
//!     PackageRecord::new("glibc", "2.39-1").with_size(40),
//!     PackageRecord::new("bash", "5.2-1").with_size(8).with_depends(["glibc"]),
//! ]);
//! let graph = analyze(&source, &AnalysisOptions::default()).unwrap();
//!
//! assert_eq!(graph.get("glibc").unwrap().level, 1);
//! assert_eq!(graph.get("bash").unwrap().level, 2);
//! assert_eq!(graph.get("glibc").unwrap().cumulative_size, Some(48));
//! ```

pub mod cycles;
pub mod levels;
mod package_graph;
mod pipeline;
pub mod resolve;
pub mod sizes;

pub use cycles::find_cycles;
pub use levels::{assign_levels, magic_boost, LevelingOptions};
pub use package_graph::{
    CycleInfo, GraphError, GraphResult, NodeKind, PackageGraph, PackageInfo, PackageNode,
};
pub use pipeline::{analyze, AnalysisOptions};
pub use resolve::{build_graph, prune_virtual_deps, resolve_dependency, Resolution};
pub use sizes::compute_sizes;
