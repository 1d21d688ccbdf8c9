//! pkgscope - Package repository dependency graph analyzer
//!
//! This crate builds a dependency graph from package manager metadata,
//! finds dependency cycles, assigns layout levels, and computes how much
//! space removing each package would free.

pub mod export;
pub mod graph;
pub mod parser;
