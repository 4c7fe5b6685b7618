use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use kira_ceiling::error::Result;
use kira_ceiling::input::{load_assembly, load_config};
use kira_ceiling::logging;
use kira_ceiling::metrics::PoolCorrelation;
use kira_ceiling::model::CeilingConfig;
use kira_ceiling::pipeline::ExtrapolationCeiling;
use kira_ceiling::report::{build_summary, write_reports};
use kira_ceiling::store::ResultStore;

#[derive(Debug, Parser)]
#[command(name = "kira-ceiling", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Estimate the extrapolated noise ceiling of an assembly.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    identifier: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    store: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    bootstraps: Option<usize>,
    #[arg(long, default_value_t = 2)]
    splits: usize,
    #[arg(long, default_value = "presentation")]
    presentation_dim: String,
    #[arg(long, short)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => run_ceiling(args),
    }
}

fn resolve_config(args: &RunArgs) -> Result<CeilingConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => CeilingConfig::default_v1(),
    };
    if let Some(b) = args.bootstraps {
        config.num_bootstraps = b;
    }
    config.validate()?;
    Ok(config)
}

fn run_ceiling(args: RunArgs) -> Result<()> {
    logging::init(args.verbose);
    let config = resolve_config(&args)?;
    let assembly = load_assembly(&args.input, &config)?;
    let metric = PoolCorrelation::new(&args.presentation_dim, &config.unit_dim, args.splits);

    let mut ceiling = ExtrapolationCeiling::new(config.clone())?;
    if let Some(root) = &args.store {
        ceiling = ceiling.with_store(ResultStore::new(root));
    }
    let score = ceiling.ceiling(&args.identifier, &assembly, &metric)?;

    let summary = build_summary(
        &args.identifier,
        &score,
        &config.unit_dim,
        config.num_bootstraps,
    )?;
    write_reports(&summary, &args.out)?;
    info!("wrote reports to {}", args.out.display());
    Ok(())
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
