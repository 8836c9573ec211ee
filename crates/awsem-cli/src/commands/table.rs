use crate::cli::BuildTableArgs;
use crate::config::{EnergyLogOverride, PartialRunConfig};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use awsem::{engine::progress::ProgressReporter, workflows};
use tracing::info;

pub async fn run(args: BuildTableArgs) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let config = PartialRunConfig::load(args.parameters.config.as_deref())?
        .merge_with_cli(&args.parameters, EnergyLogOverride::Disabled)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Building fragment-memory table...");
    let summary = tokio::task::block_in_place(|| workflows::table::run(&config, &reporter))?;

    info!(
        "Table written with {} cell(s) of {} point(s).",
        summary.cells, summary.points
    );
    println!(
        "✓ Fragment-memory table ({} cells × {} points) written to: {}",
        summary.cells,
        summary.points,
        summary.dir.display()
    );
    Ok(())
}
