use super::{PotentialTerm, Scope, Target, central_force};
use crate::core::backbone::sites::Site;
use crate::core::forcefield::coefficients::ChainParams;
use crate::core::forcefield::potentials::harmonic;
use crate::core::forcefield::term::TermKind;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;

/// Harmonic restraints on the N–Cβ, C′–Cβ and N–C′ distances of each residue.
pub struct ChainTerm {
    params: ChainParams,
}

impl ChainTerm {
    pub fn new(params: ChainParams) -> Self {
        Self { params }
    }

    fn bonds(&self, ctx: &StepContext, i: usize) -> [(bool, Site, Site, f64, f64); 3] {
        let p = &self.params;
        let first = ctx.sequence.is_first(i);
        let last = ctx.sequence.is_last(i);
        let glycine = ctx.residue_type(i).is_glycine();
        [
            (!first && !glycine, Site::Nitrogen, Site::Beta, p.k[0], p.r_ncb0),
            (!last && !glycine, Site::CPrime, Site::Beta, p.k[1], p.r_cpcb0),
            (!first && !last, Site::Nitrogen, Site::CPrime, p.k[2], p.r_ncp0),
        ]
    }
}

impl PotentialTerm for ChainTerm {
    fn kind(&self) -> TermKind {
        TermKind::Chain
    }

    fn scope(&self) -> Scope {
        Scope::PerResidue
    }

    fn is_admissible(&self, ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        Ok(matches!(target, Target::Residue(i) if ctx.topology.is_local(i)))
    }

    fn energy_and_force(
        &self,
        ctx: &StepContext,
        target: Target,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        let Target::Residue(i) = target else {
            return Ok(());
        };
        for (active, a, b, k, r0) in self.bonds(ctx, i) {
            if !active {
                continue;
            }
            let (Some(xa), Some(xb)) = (ctx.frame.get(i, a), ctx.frame.get(i, b)) else {
                continue;
            };
            let dx = xa - xb;
            let r = dx.norm();
            let (energy, de_dr) = harmonic(r, r0, k);
            acc.add_energy(TermKind::Chain, energy);
            central_force(acc, (i, a), (i, b), dx, -de_dr / r);
        }
        Ok(())
    }
}
