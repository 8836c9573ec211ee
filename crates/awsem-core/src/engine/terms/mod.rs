//! The potential-term registry.
//!
//! Each active coefficient section contributes one [`PotentialTerm`]. The evaluator visits
//! every Local residue and every owned residue pair, asks each term whether the target is
//! admissible, and lets it add energy and site forces into a worker [`Accumulator`].
//! Density-mediated terms additionally contribute to the derived-coefficient pass through
//! [`PotentialTerm::derived_coefficients`].
//!
//! Terms that read fragment templates directly (the distance bias in its direct backend and
//! the vector bias) share one [`fragment::MemoryWindows`].

mod amh_go;
mod burial;
mod chain;
mod chi;
mod contact_restraints;
mod dssp;
mod excluded;
pub mod fragment;
mod helix;
mod p_ap;
mod rama;
mod shake;
mod solvent_barrier;
mod vector_fragment;
mod water;

use super::accumulator::Accumulator;
use super::context::StepContext;
use super::density::LocalXi;
use super::error::EngineError;
use crate::core::backbone::sites::Site;
use crate::core::forcefield::params::ForceField;
use crate::core::forcefield::term::TermKind;
use nalgebra::Vector3;

pub use fragment::FragmentSource;

/// What a single evaluation is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A Local residue.
    Residue(usize),
    /// An owned pair `(i, j)` with `i < j`.
    Pair(usize, usize),
}

/// Which targets a term is visited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    PerResidue,
    PerPair,
    PerResidueAndPair,
}

impl Scope {
    pub fn visits_residues(self) -> bool {
        matches!(self, Scope::PerResidue | Scope::PerResidueAndPair)
    }

    pub fn visits_pairs(self) -> bool {
        matches!(self, Scope::PerPair | Scope::PerResidueAndPair)
    }
}

pub trait PotentialTerm: Send + Sync {
    fn kind(&self) -> TermKind;

    fn scope(&self) -> Scope;

    /// Cheap structural filter applied before [`PotentialTerm::energy_and_force`].
    fn is_admissible(&self, ctx: &StepContext, target: Target) -> Result<bool, EngineError>;

    fn energy_and_force(
        &self,
        ctx: &StepContext,
        target: Target,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError>;

    /// Adds this term's `dE/dρ` contributions. Runs after the density reduction and before
    /// the main pass.
    fn derived_coefficients(
        &self,
        _ctx: &StepContext,
        _target: Target,
        _xi: &mut LocalXi,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Builds one term per active coefficient section, in energy-log order.
pub fn build_registry(
    forcefield: &ForceField,
    fragments: Option<FragmentSource>,
) -> Result<Vec<Box<dyn PotentialTerm>>, EngineError> {
    let c = &forcefield.coefficients;
    let mut terms: Vec<Box<dyn PotentialTerm>> = Vec::new();

    if let Some(params) = c.chain {
        terms.push(Box::new(chain::ChainTerm::new(params)));
    }
    if let Some(params) = c.shake {
        terms.push(Box::new(shake::ShakeTerm::new(params)));
    }
    if let Some(params) = c.chi {
        terms.push(Box::new(chi::ChiTerm::new(params)));
    }
    if let Some(params) = &c.rama {
        terms.push(Box::new(rama::RamaTerm::new(
            params.clone(),
            c.rama_proline.clone(),
            c.ss_weight,
            forcefield.ss_weights.clone(),
        )));
    }
    if let Some(params) = c.excluded {
        terms.push(Box::new(excluded::ExcludedTerm::new(params)));
    }
    if let Some(params) = c.dssp {
        let statistics = forcefield
            .hbond
            .clone()
            .ok_or_else(|| missing_table(TermKind::Dssp, "hydrogen-bond statistics"))?;
        terms.push(Box::new(dssp::DsspTerm::new(
            params,
            statistics,
            beta_prediction(forcefield),
        )));
    }
    if let Some(params) = c.p_ap {
        terms.push(Box::new(p_ap::PApTerm::new(params, beta_prediction(forcefield))));
    }
    if let Some(params) = &c.water {
        let gamma = forcefield
            .water_gamma
            .clone()
            .ok_or_else(|| missing_table(TermKind::Water, "water gamma"))?;
        terms.push(Box::new(water::WaterTerm::new(params.clone(), gamma)));
    }
    if let Some(params) = c.burial {
        let water = c.water.as_ref().ok_or_else(|| {
            EngineError::Internal("[Burial] requires an active [Water] section".into())
        })?;
        let gamma = forcefield
            .burial_gamma
            .clone()
            .ok_or_else(|| missing_table(TermKind::Burial, "burial gamma"))?;
        terms.push(Box::new(burial::BurialTerm::new(params, gamma, water.window(0))));
    }
    if let Some(params) = &c.helix {
        terms.push(Box::new(helix::HelixTerm::new(params.clone())));
    }
    if let Some(params) = c.amh_go {
        let model = forcefield
            .go_model
            .clone()
            .ok_or_else(|| missing_table(TermKind::AmhGo, "native structure"))?;
        terms.push(Box::new(amh_go::AmhGoTerm::new(params, model)));
    }
    let windows = match (&c.vector_fragment_memory, &fragments) {
        (Some(_), Some(source)) => source.windows().cloned(),
        _ => None,
    };
    if let Some(source) = fragments {
        let params = c.fragment_memory.as_ref().ok_or_else(|| {
            EngineError::Internal("fragment source given without a fragment-memory section".into())
        })?;
        let gamma = forcefield
            .fragment_gamma
            .clone()
            .ok_or_else(|| missing_table(TermKind::FragmentMemory, "fragment gamma"))?;
        terms.push(Box::new(fragment::FragmentMemoryTerm::new(
            params, gamma, source,
        )));
    }
    if let Some(params) = c.vector_fragment_memory {
        let windows = windows.ok_or_else(|| {
            EngineError::Internal(format!(
                "{} is active but no fragment memories are loaded",
                TermKind::VectorFragmentMemory
            ))
        })?;
        let gamma = forcefield
            .fragment_gamma
            .clone()
            .ok_or_else(|| missing_table(TermKind::VectorFragmentMemory, "fragment gamma"))?;
        terms.push(Box::new(vector_fragment::VectorFragmentTerm::new(
            params, gamma, windows,
        )));
    }
    if let Some(params) = &c.contact_restraints {
        let restraints = forcefield
            .contact_restraints
            .clone()
            .ok_or_else(|| missing_table(TermKind::ContactRestraints, "restraint"))?;
        terms.push(Box::new(contact_restraints::ContactRestraintsTerm::new(
            params, restraints,
        )));
    }
    if let Some(params) = c.solvent_barrier {
        terms.push(Box::new(solvent_barrier::SolventBarrierTerm::new(params)));
    }

    Ok(terms)
}

fn missing_table(term: TermKind, what: &str) -> EngineError {
    EngineError::Internal(format!("{term} is active but its {what} table is not loaded"))
}

/// Residues predicted to be strands: both carry a propensity of exactly 1 for the last
/// `[Rama]` basin. Shared by the DSSP and P/AP terms.
#[derive(Debug, Clone, Default)]
pub(crate) struct BetaPrediction {
    strand: Option<Vec<bool>>,
}

impl BetaPrediction {
    pub(crate) fn both(&self, i: usize, j: usize) -> bool {
        self.strand
            .as_ref()
            .is_some_and(|s| s.get(i).copied().unwrap_or(false) && s.get(j).copied().unwrap_or(false))
    }
}

fn beta_prediction(forcefield: &ForceField) -> BetaPrediction {
    let strand = match (&forcefield.coefficients.rama, &forcefield.ss_weights) {
        (Some(rama), Some(weights)) if !rama.basins.is_empty() => {
            let last = rama.basins.len() - 1;
            Some((0..weights.len()).map(|i| weights.get(i, last) == 1.0).collect())
        }
        _ => None,
    };
    BetaPrediction { strand }
}

/// Adds the force of a central pair potential: `scale * (x_a − x_b)` on `a` and its opposite
/// on `b`.
#[inline]
pub(crate) fn central_force(
    acc: &mut Accumulator,
    a: (usize, Site),
    b: (usize, Site),
    dx: Vector3<f64>,
    scale: f64,
) {
    acc.add_pair_force(a, b, dx * scale);
}

/// A Gaussian hydrogen-bond contact between O of one residue and the N and H sites of
/// another, as used by the DSSP and helix terms.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HBondGeometry {
    pub x_no: Vector3<f64>,
    pub x_ho: Vector3<f64>,
    pub theta: f64,
    /// `dθ/dr / (θ r)` for the N–O and H–O distances.
    pub prd_no: f64,
    pub prd_ho: f64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct HBondShape {
    pub sigma_no: f64,
    pub sigma_ho: f64,
    pub no_zero: f64,
    pub ho_zero: f64,
}

impl HBondGeometry {
    pub(crate) fn measure(
        ctx: &StepContext,
        acceptor: usize,
        donor: usize,
        shape: &HBondShape,
        term: TermKind,
    ) -> Result<Self, EngineError> {
        let o = ctx.site(acceptor, Site::Oxygen, term)?;
        let n = ctx.site(donor, Site::Nitrogen, term)?;
        let h = ctx.site(donor, Site::Hydrogen, term)?;
        let x_no = o - n;
        let x_ho = o - h;
        let r_no = x_no.norm();
        let r_ho = x_ho.norm();
        let d_no = (r_no - shape.no_zero) / (shape.sigma_no * shape.sigma_no);
        let d_ho = (r_ho - shape.ho_zero) / (shape.sigma_ho * shape.sigma_ho);
        let theta =
            (-0.5 * ((r_no - shape.no_zero) * d_no + (r_ho - shape.ho_zero) * d_ho)).exp();
        Ok(Self {
            x_no,
            x_ho,
            theta,
            prd_no: -d_no / r_no,
            prd_ho: -d_ho / r_ho,
        })
    }

    /// Adds the force of an energy `E(θ)` with `θ dE/dθ = weight` onto the O, N and H sites.
    pub(crate) fn apply(&self, acc: &mut Accumulator, acceptor: usize, donor: usize, weight: f64) {
        let f_no = self.x_no * (weight * self.prd_no);
        let f_ho = self.x_ho * (weight * self.prd_ho);
        acc.add_force(acceptor, Site::Oxygen, -(f_no + f_ho));
        acc.add_force(donor, Site::Nitrogen, f_no);
        acc.add_force(donor, Site::Hydrogen, f_ho);
    }
}

#[cfg(test)]
pub(crate) mod testing;
