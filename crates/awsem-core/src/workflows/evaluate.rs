use crate::core::forcefield::term::TermKind;
use crate::core::models::forces::ForceBuffer;
use crate::core::models::system::ParticleSystem;
use crate::engine::comm::SerialComm;
use crate::engine::config::EngineConfig;
use crate::engine::error::EngineError;
use crate::engine::evaluator::{Evaluator, StepEnergies};
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct FrameEvaluation {
    pub energies: StepEnergies,
    pub forces: ForceBuffer,
}

#[derive(Debug, Clone)]
pub struct EvaluationResult {
    /// Active terms in energy-log order.
    pub terms: Vec<TermKind>,
    pub frames: Vec<FrameEvaluation>,
}

/// Evaluates every frame in order on a single rank. Frame `k` is logged as step `k`.
///
/// The topology is rebuilt for each frame, so frames may differ in which residues are
/// present.
#[instrument(skip_all, name = "evaluate_workflow")]
pub fn run(
    frames: &[ParticleSystem],
    config: &EngineConfig,
    reporter: &ProgressReporter,
) -> Result<EvaluationResult, EngineError> {
    let mut evaluator = Evaluator::from_config(config, Box::new(SerialComm), reporter)?;
    let terms = evaluator.active_terms();
    info!(frames = frames.len(), terms = terms.len(), "Evaluating frames");

    let frames = reporter.phase("Evaluating frames", || {
        reporter.report(Progress::TaskStart {
            total_steps: frames.len() as u64,
        });
        let result = frames
            .iter()
            .enumerate()
            .map(|(step, system)| {
                evaluator.update_topology(system)?;
                let mut forces = ForceBuffer::new();
                let energies = evaluator.compute(system, step as u64, &mut forces)?;
                reporter.report(Progress::TaskIncrement);
                Ok(FrameEvaluation { energies, forces })
            })
            .collect::<Result<Vec<_>, EngineError>>();
        reporter.report(Progress::TaskFinish);
        result
    })?;

    Ok(EvaluationResult { terms, frames })
}
