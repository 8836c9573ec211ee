use super::accumulator::{Accumulator, fold_items};
use super::comm::Communicator;
use super::config::EngineConfig;
use super::context::StepContext;
use super::density::{DensityField, DensityWindows, LocalDensity, LocalXi};
use super::energy_log::EnergyLog;
use super::error::EngineError;
use super::neighbors::PairList;
use super::progress::ProgressReporter;
use super::terms::{self, FragmentSource, PotentialTerm, Target, fragment};
use crate::core::backbone::virtual_atoms::BackboneFrame;
use crate::core::forcefield::params::ForceField;
use crate::core::forcefield::term::{EnergyVector, TermKind};
use crate::core::models::forces::ForceBuffer;
use crate::core::models::sequence::Sequence;
use crate::core::models::system::ParticleSystem;
use crate::core::topology::builder::build_topology;
use crate::core::topology::residue::ResidueTopology;
use std::path::Path;
use tracing::{debug, info, instrument};

/// The globally reduced energies of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepEnergies {
    pub step: u64,
    pub energies: EnergyVector,
}

impl StepEnergies {
    pub fn total(&self) -> f64 {
        self.energies.total()
    }
}

/// The stateful per-rank evaluator.
///
/// A step runs in four passes separated by two collective reductions: virtual sites and
/// the neighbor list, local densities (reduced), density-derived coefficients (reduced),
/// and finally energies and forces. Every rank of a communicator group must call
/// [`Evaluator::compute`] for the same step.
pub struct Evaluator {
    sequence: Sequence,
    forcefield: ForceField,
    terms: Vec<Box<dyn PotentialTerm>>,
    windows: DensityWindows,
    pair_cutoff: f64,
    comm: Box<dyn Communicator>,
    topology: Option<ResidueTopology>,
    energy_log: Option<EnergyLog>,
    cache: Option<StepEnergies>,
}

impl Evaluator {
    pub fn new(
        sequence: Sequence,
        forcefield: ForceField,
        fragments: Option<FragmentSource>,
        comm: Box<dyn Communicator>,
    ) -> Result<Self, EngineError> {
        let terms = terms::build_registry(&forcefield, fragments)?;
        let windows = DensityWindows::from_coefficients(&forcefield.coefficients);
        let pair_cutoff = forcefield.pair_cutoff();
        info!(
            residues = sequence.len(),
            chains = sequence.chain_count(),
            terms = terms.len(),
            pair_cutoff,
            rank = comm.rank(),
            ranks = comm.size(),
            "Evaluator ready"
        );
        Ok(Self {
            sequence,
            forcefield,
            terms,
            windows,
            pair_cutoff,
            comm,
            topology: None,
            energy_log: None,
            cache: None,
        })
    }

    /// Loads the sequence, the coefficient file with its tables and, when fragment memory
    /// is active, the memory library or its precomputed table. The energy log is opened on
    /// the root rank only.
    #[instrument(skip_all, name = "evaluator_setup")]
    pub fn from_config(
        config: &EngineConfig,
        comm: Box<dyn Communicator>,
        reporter: &ProgressReporter,
    ) -> Result<Self, EngineError> {
        let (sequence, forcefield) = reporter.phase("Loading parameters", || {
            let sequence = load_sequence(&config.sequence_path)?;
            let forcefield =
                ForceField::load(&config.coefficient_path, &config.param_dir, &sequence)?;
            Ok::<_, EngineError>((sequence, forcefield))
        })?;

        let fragments = match &forcefield.coefficients.fragment_memory {
            Some(params) => {
                let gamma = forcefield.fragment_gamma.as_ref().ok_or_else(|| {
                    EngineError::Internal("fragment memory is active without its gamma table".into())
                })?;
                Some(fragment::prepare(
                    params,
                    gamma,
                    &sequence,
                    &config.table_dir,
                    forcefield.coefficients.vector_fragment_memory.is_some(),
                    reporter,
                )?)
            }
            None => None,
        };

        let mut evaluator = Self::new(sequence, forcefield, fragments, comm)?;
        if let Some(path) = &config.energy_log {
            if evaluator.comm.is_root() {
                evaluator.energy_log = Some(EnergyLog::create(path, evaluator.active_terms())?);
            }
        }
        Ok(evaluator)
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn forcefield(&self) -> &ForceField {
        &self.forcefield
    }

    pub fn topology(&self) -> Option<&ResidueTopology> {
        self.topology.as_ref()
    }

    /// The active terms in registry order, which is also the energy-log column order.
    pub fn active_terms(&self) -> Vec<TermKind> {
        self.terms.iter().map(|term| term.kind()).collect()
    }

    /// Rebuilds the residue topology. Call after every re-neighboring of the host.
    pub fn update_topology(&mut self, system: &ParticleSystem) -> Result<(), EngineError> {
        let topology = build_topology(system, &self.sequence)?;
        debug!(
            present = topology.present_iter().count(),
            local = topology.local_indices().len(),
            "Residue topology rebuilt"
        );
        self.topology = Some(topology);
        self.cache = None;
        Ok(())
    }

    /// Evaluates one step: adds every particle force into `forces` and returns the reduced
    /// energies. Forces on ghost particles are partial and must be reverse-communicated by
    /// the host. This is the only path that appends a row to the energy log.
    #[instrument(skip_all, fields(step = step))]
    pub fn compute(
        &mut self,
        system: &ParticleSystem,
        step: u64,
        forces: &mut ForceBuffer,
    ) -> Result<StepEnergies, EngineError> {
        let result = self.evaluate_step(system, step, forces)?;
        if self.comm.is_root() {
            if let Some(log) = self.energy_log.as_mut() {
                log.write(&result)?;
            }
        }
        Ok(result)
    }

    /// Cached energies of `step`, recomputed (with the forces discarded) when the cache
    /// holds another step. The energy log is left untouched.
    pub fn energies(
        &mut self,
        system: &ParticleSystem,
        step: u64,
    ) -> Result<StepEnergies, EngineError> {
        if let Some(cached) = self.cache.as_ref().filter(|c| c.step == step) {
            return Ok(cached.clone());
        }
        let mut scratch = ForceBuffer::new();
        self.evaluate_step(system, step, &mut scratch)
    }

    fn evaluate_step(
        &mut self,
        system: &ParticleSystem,
        step: u64,
        forces: &mut ForceBuffer,
    ) -> Result<StepEnergies, EngineError> {
        let topology = self.topology.as_ref().ok_or(EngineError::TopologyNotBuilt)?;
        let virtual_sites = &self.forcefield.coefficients.virtual_sites;

        let frame = BackboneFrame::build(system, topology, &self.sequence, virtual_sites);
        let pairs = PairList::build(&frame, topology, self.pair_cutoff);
        let base = StepContext::new(&frame, topology, &self.sequence);

        let rho = LocalDensity::accumulate(&base, &self.windows, &pairs)?
            .reduce(self.comm.as_ref())?;
        let density = DensityField::new(rho, &self.forcefield, &self.sequence);
        let with_density = base.with_density(&density);

        let targets = collect_targets(&base, &pairs);
        let xi = derived_pass(&self.terms, &with_density, &targets)?.reduce(self.comm.as_ref())?;
        let ctx = with_density.with_xi(&xi);

        let acc = force_pass(&self.terms, &ctx, &targets)?;
        let mut energies = acc.energies;
        self.comm.all_reduce_sum(energies.as_mut_slice())?;
        acc.forces.distribute(topology, virtual_sites, forces);

        let result = StepEnergies { step, energies };
        debug!(pairs = pairs.len(), total = result.total(), "Step evaluated");
        self.cache = Some(result.clone());
        Ok(result)
    }
}

pub(crate) fn load_sequence(path: &Path) -> Result<Sequence, EngineError> {
    let sequence = Sequence::read_from_path(path).map_err(|source| EngineError::Sequence {
        path: path.display().to_string(),
        source,
    })?;
    info!(path = %path.display(), residues = sequence.len(), chains = sequence.chain_count(), "Loaded sequence");
    Ok(sequence)
}

fn visits(term: &dyn PotentialTerm, target: Target) -> bool {
    match target {
        Target::Residue(_) => term.scope().visits_residues(),
        Target::Pair(..) => term.scope().visits_pairs(),
    }
}

fn collect_targets(ctx: &StepContext, pairs: &PairList) -> Vec<Target> {
    ctx.topology
        .local_indices()
        .iter()
        .map(|&i| Target::Residue(i))
        .chain(pairs.as_slice().iter().map(|&(i, j)| Target::Pair(i, j)))
        .collect()
}

fn derived_pass(
    terms: &[Box<dyn PotentialTerm>],
    ctx: &StepContext,
    targets: &[Target],
) -> Result<LocalXi, EngineError> {
    fold_items(
        targets,
        || LocalXi::zeros(ctx.sequence.len()),
        |xi, &target| {
            for term in terms.iter().filter(|t| visits(t.as_ref(), target)) {
                term.derived_coefficients(ctx, target, xi)?;
            }
            Ok(())
        },
    )
}

fn force_pass(
    terms: &[Box<dyn PotentialTerm>],
    ctx: &StepContext,
    targets: &[Target],
) -> Result<Accumulator, EngineError> {
    fold_items(
        targets,
        || Accumulator::new(ctx.sequence.len()),
        |acc, &target| {
            for term in terms.iter().filter(|t| visits(t.as_ref(), target)) {
                if term.is_admissible(ctx, target)? {
                    term.energy_and_force(ctx, target, acc)?;
                }
            }
            Ok(())
        },
    )
}
