use crate::cli::EvaluateArgs;
use crate::config::{EnergyLogOverride, PartialRunConfig};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use awsem::{
    core::io::{pdb::PdbFile, traits::StructureFile},
    core::models::system::{ParticleSystem, SimulationBox},
    engine::progress::ProgressReporter,
    workflows::{self, evaluate::EvaluationResult},
};
use tracing::{info, warn};

pub async fn run(args: EvaluateArgs) -> Result<()> {
    let energy_log = match (&args.energy_log, args.no_energy_log) {
        (_, true) => EnergyLogOverride::Disabled,
        (Some(path), false) => EnergyLogOverride::Path(path.as_path()),
        (None, false) => EnergyLogOverride::FromFile,
    };

    info!("Merging configuration from file and CLI arguments...");
    let config = PartialRunConfig::load(args.parameters.config.as_deref())?
        .merge_with_cli(&args.parameters, energy_log)?;

    info!("Loading input structure from {:?}", &args.input);
    let frames = PdbFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
        path: args.input.clone(),
        source: e.into(),
    })?;
    let systems: Vec<ParticleSystem> = frames
        .iter()
        .map(|frame| frame.to_particle_system(SimulationBox::open()))
        .collect();

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Evaluating {} frame(s)...", systems.len());
    info!("Invoking the core evaluation workflow...");

    let result =
        tokio::task::block_in_place(|| workflows::evaluate::run(&systems, &config, &reporter))?;

    if result.frames.is_empty() {
        warn!("Workflow completed but the input held no frames.");
        println!("Warning: no frames were evaluated.");
        return Ok(());
    }

    print!("{}", format_energy_table(&result));
    if let Some(path) = &config.energy_log {
        println!("✓ Energy log written to: {}", path.display());
    }
    Ok(())
}

fn format_energy_table(result: &EvaluationResult) -> String {
    let mut out = format!("{:>6}", "Step");
    for term in &result.terms {
        out.push_str(&format!(" {:>14}", term.label()));
    }
    out.push_str(&format!(" {:>14}\n", "VTotal"));

    for frame in &result.frames {
        out.push_str(&format!("{:>6}", frame.energies.step));
        for term in &result.terms {
            out.push_str(&format!(" {:>14.6}", frame.energies.energies.get(*term)));
        }
        out.push_str(&format!(" {:>14.6}\n", frame.energies.total()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use awsem::core::forcefield::term::{EnergyVector, TermKind};
    use awsem::core::models::forces::ForceBuffer;
    use awsem::engine::evaluator::StepEnergies;
    use awsem::workflows::evaluate::FrameEvaluation;

    #[test]
    fn energy_table_has_one_column_per_active_term_and_a_total() {
        let mut energies = EnergyVector::new();
        energies.accumulate(TermKind::Chain, 1.5);
        energies.accumulate(TermKind::Water, -2.0);
        let result = EvaluationResult {
            terms: vec![TermKind::Chain, TermKind::Water],
            frames: vec![FrameEvaluation {
                energies: StepEnergies { step: 0, energies },
                forces: ForceBuffer::new(),
            }],
        };

        let table = format_energy_table(&result);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 2);
        let header: Vec<&str> = lines[0].split_whitespace().collect();
        assert_eq!(header, vec!["Step", "Chain", "Water", "VTotal"]);
        let row: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(row, vec!["0", "1.500000", "-2.000000", "-0.500000"]);
    }
}
