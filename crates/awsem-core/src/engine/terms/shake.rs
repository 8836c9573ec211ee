use super::{PotentialTerm, Scope, Target, central_force};
use crate::core::backbone::sites::Site;
use crate::core::forcefield::coefficients::ShakeParams;
use crate::core::forcefield::potentials::harmonic;
use crate::core::forcefield::term::TermKind;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;

/// Stiff harmonic bonds holding the Cα–O geometry of each residue and its link to the next
/// Cα of the same chain.
pub struct ShakeTerm {
    params: ShakeParams,
}

impl ShakeTerm {
    pub fn new(params: ShakeParams) -> Self {
        Self { params }
    }

    fn bonds(&self, ctx: &StepContext, i: usize) -> Vec<((usize, Site), (usize, Site), f64)> {
        let p = &self.params;
        let mut bonds = vec![((i, Site::Alpha), (i, Site::Oxygen), p.r_alpha_oxygen)];
        if !ctx.sequence.is_last(i) {
            bonds.push(((i, Site::Alpha), (i + 1, Site::Alpha), p.r_alpha_alpha));
            bonds.push(((i, Site::Oxygen), (i + 1, Site::Alpha), p.r_oxygen_alpha));
        }
        bonds
    }
}

impl PotentialTerm for ShakeTerm {
    fn kind(&self) -> TermKind {
        TermKind::Shake
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
        for (a, b, r0) in self.bonds(ctx, i) {
            let dx = ctx.site(a.0, a.1, TermKind::Shake)? - ctx.site(b.0, b.1, TermKind::Shake)?;
            let r = dx.norm();
            let (energy, de_dr) = harmonic(r, r0, self.params.k);
            acc.add_energy(TermKind::Shake, energy);
            central_force(acc, a, b, dx, -de_dr / r);
        }
        Ok(())
    }
}
