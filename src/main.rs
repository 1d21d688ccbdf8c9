use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pkgscope::export::{self, ExportFormat, GraphView, ViewOptions};
use pkgscope::graph::{self, AnalysisOptions};
use pkgscope::parser::{self, pacman_local, PackageRecord, RecordSource};

#[derive(Parser)]
#[command(name = "pkgscope")]
#[command(author = "Zachary Woods <143150513+zach-fau@users.noreply.github.com>")]
#[command(version)]
#[command(about = "Package repository dependency graph analyzer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a package database and export the leveled graph
    Analyze(AnalyzeArgs),
    /// Show version information
    Version,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// JSON snapshot of package records
    #[arg(long, conflicts_with = "pacman_db")]
    snapshot: Option<PathBuf>,

    /// pacman local database directory
    #[arg(long, value_name = "DIR")]
    pacman_db: Option<PathBuf>,

    /// Output format: json, csv or markdown
    #[arg(short, long, default_value_t = ExportFormat::Json)]
    format: ExportFormat,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Leave out nodes at or beyond this level
    #[arg(long, default_value_t = usize::MAX, hide_default_value = true)]
    max_level: usize,

    /// Hide dependency edges of nodes with at least this many dependencies
    #[arg(long, default_value_t = usize::MAX, hide_default_value = true)]
    max_deps: usize,

    /// Hide dependency edges to nodes with at least this many dependants
    #[arg(long, default_value_t = usize::MAX, hide_default_value = true)]
    max_reqs: usize,

    /// Spread highly connected packages over more levels
    #[arg(long)]
    use_magic: bool,

    /// Re-run the top-down leveling pass after the bottom-up pass
    #[arg(long)]
    align_top: bool,

    /// Keep virtual dependencies nothing depends on
    #[arg(long)]
    show_all_vdeps: bool,

    /// Read the pacman database through libalpm
    #[cfg(feature = "alpm")]
    #[arg(long, conflicts_with = "snapshot")]
    alpm: bool,
}

impl AnalyzeArgs {
    fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            use_magic_leveling: self.use_magic,
            align_top: self.align_top,
            show_all_virtual_deps: self.show_all_vdeps,
        }
    }

    fn view_options(&self) -> ViewOptions {
        ViewOptions {
            max_level: self.max_level,
            max_deps: self.max_deps,
            max_reqs: self.max_reqs,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PKGSCOPE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("pkgscope=info,warn"));

    let format = env::var("PKGSCOPE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

#[cfg_attr(not(feature = "alpm"), allow(unused_variables))]
fn read_pacman_db(args: &AnalyzeArgs, dir: &Path) -> parser::ParseResult<Vec<PackageRecord>> {
    #[cfg(feature = "alpm")]
    if args.alpm {
        return parser::alpm_db::read_local_db(dir);
    }
    pacman_local::read_local_db(dir)
}

fn load_records(args: &AnalyzeArgs) -> anyhow::Result<Vec<PackageRecord>> {
    let records = match &args.snapshot {
        Some(path) => parser::parse_file(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?,
        None => {
            let dir = args
                .pacman_db
                .clone()
                .unwrap_or_else(|| PathBuf::from(pacman_local::DEFAULT_LOCAL_DB));
            read_pacman_db(args, &dir)
                .with_context(|| format!("Failed to read pacman database {}", dir.display()))?
        }
    };
    parser::validate(&records).context("Invalid package records")?;
    Ok(records)
}

fn write_output(format: ExportFormat, view: &GraphView, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            let mut file = fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            export::export(format, view, &mut file)?;
            info!(path = %path.display(), %format, "wrote export");
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            export::export(format, view, &mut handle)?;
            handle.flush()?;
        }
    }
    Ok(())
}

fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<()> {
    let records = load_records(args)?;
    info!(records = records.len(), "loaded package records");

    let source = RecordSource::new(records);
    let graph = graph::analyze(&source, &args.analysis_options())
        .context("Failed to build package graph")?;

    let view = GraphView::from_graph(&graph, &args.view_options());
    write_output(args.format, &view, args.output.as_deref())
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Analyze(args)) => run_analyze(args),
        Some(Commands::Version) => {
            println!("pkgscope v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => {
            println!("pkgscope - Package Dependency Graph Analyzer");
            println!("Run 'pkgscope analyze' to analyze the local pacman database");
            println!("Run 'pkgscope --help' for more information");
            Ok(())
        }
    }
}
