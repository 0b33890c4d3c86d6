use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use perflow::analysis::HotspotAnalyzer;
use perflow::tree::{ArtifactInput, BuildMode, TreeBuilder};

/// Rank the hottest frames across per-rank sample artifacts.
#[derive(Parser)]
#[command(name = "perflow-hotspot", version, about)]
struct Args {
    /// Per-rank artifacts as `samples[:libmap]:rank` triples.
    #[arg(required = true, value_name = "SAMPLES[:LIBMAP]:RANK")]
    inputs: Vec<ArtifactInput>,

    /// Number of frames to report.
    #[arg(short = 'n', long, default_value_t = 20)]
    top: usize,

    /// Rank by inclusive counts instead of self counts.
    #[arg(long)]
    total: bool,

    /// Distinguish frames by their full caller path.
    #[arg(long)]
    context_aware: bool,
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();
    let args = Args::parse();

    let builder = TreeBuilder {
        build_mode: if args.context_aware {
            BuildMode::ContextAware
        } else {
            BuildMode::ContextFree
        },
        ..TreeBuilder::new()
    };
    let tree = match builder.build_from_files(&args.inputs) {
        Ok(tree) => tree,
        Err(err) => {
            eprintln!("perflow-hotspot: {err}");
            return ExitCode::FAILURE;
        }
    };

    let hotspots = if args.total {
        HotspotAnalyzer::find_total_hotspots(&tree, args.top)
    } else {
        HotspotAnalyzer::find_self_hotspots(&tree, args.top)
    };

    println!(
        "{} samples across {} rank(s), {} frames",
        tree.total_samples(),
        tree.process_count(),
        tree.len() - 1
    );
    println!(
        "{:>4}  {:>12}  {:>7}  {:>12}  location",
        "#", "self", "self%", "total"
    );
    for (index, hotspot) in hotspots.iter().enumerate() {
        println!(
            "{:>4}  {:>12}  {:>6.2}%  {:>12}  {}",
            index + 1,
            hotspot.self_count,
            hotspot.self_percentage,
            hotspot.total_count,
            hotspot.location
        );
    }
    ExitCode::SUCCESS
}
