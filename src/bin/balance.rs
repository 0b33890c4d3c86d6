use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use perflow::analysis::BalanceAnalyzer;
use perflow::tree::{ArtifactInput, TreeBuilder};

/// Report the distribution of samples across ranks.
#[derive(Parser)]
#[command(name = "perflow-balance", version, about)]
struct Args {
    /// Per-rank artifacts as `samples[:libmap]:rank` triples.
    #[arg(required = true, value_name = "SAMPLES[:LIBMAP]:RANK")]
    inputs: Vec<ArtifactInput>,
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();
    let args = Args::parse();

    let tree = match TreeBuilder::new().build_from_files(&args.inputs) {
        Ok(tree) => tree,
        Err(err) => {
            eprintln!("perflow-balance: {err}");
            return ExitCode::FAILURE;
        }
    };
    let report = BalanceAnalyzer::analyze(&tree);

    println!("{:>6}  {:>12}  share", "rank", "samples");
    for (rank, count) in &report.per_process {
        let share = if tree.total_samples() > 0 {
            *count as f64 / tree.total_samples() as f64 * 100.0
        } else {
            0.0
        };
        println!("{rank:>6}  {count:>12}  {share:>5.1}%");
    }
    println!();
    println!("mean      {:.2}", report.mean);
    println!("stddev    {:.2}", report.stddev);
    println!("min       {} (rank {})", report.min, report.least_loaded_process);
    println!("max       {} (rank {})", report.max, report.most_loaded_process);
    println!("imbalance {:.3}", report.imbalance_factor);
    ExitCode::SUCCESS
}
