use crate::core::forcefield::coefficients::FragmentBackend;
use crate::core::forcefield::params::ForceField;
use crate::engine::config::{ConfigError, EngineConfig};
use crate::engine::error::EngineError;
use crate::engine::evaluator::load_sequence;
use crate::engine::progress::ProgressReporter;
use crate::engine::terms::fragment;
use std::path::PathBuf;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub dir: PathBuf,
    /// Present (residue, offset, kind) cells.
    pub cells: usize,
    /// Grid points per cell.
    pub points: usize,
}

/// Builds the fragment-memory table described by the `[Fragment_Memory_Table]` section and
/// writes it into the table directory, whatever the section's table flag says.
#[instrument(skip_all, name = "table_workflow")]
pub fn run(config: &EngineConfig, reporter: &ProgressReporter) -> Result<TableSummary, EngineError> {
    let (sequence, forcefield) = reporter.phase("Loading parameters", || {
        let sequence = load_sequence(&config.sequence_path)?;
        let forcefield =
            ForceField::load(&config.coefficient_path, &config.param_dir, &sequence)?;
        Ok::<_, EngineError>((sequence, forcefield))
    })?;

    let missing = || EngineError::Config(ConfigError::MissingSection("[Fragment_Memory_Table]"));
    let params = forcefield
        .coefficients
        .fragment_memory
        .as_ref()
        .ok_or_else(missing)?;
    let FragmentBackend::Table(grid) = params.backend else {
        return Err(missing());
    };
    let gamma = forcefield.fragment_gamma.as_ref().ok_or_else(|| {
        EngineError::Internal("fragment memory is active without its gamma table".into())
    })?;

    let table = fragment::build_table(params, grid, gamma, &sequence, reporter)?;
    reporter.phase("Saving fragment-memory table", || table.save(&config.table_dir))?;

    let summary = TableSummary {
        dir: config.table_dir.clone(),
        cells: table.cell_count(),
        points: grid.size(),
    };
    info!(dir = %summary.dir.display(), cells = summary.cells, points = summary.points, "Table build complete");
    Ok(summary)
}
