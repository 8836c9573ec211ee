use super::{PotentialTerm, Scope, Target, central_force};
use crate::core::forcefield::coefficients::ContactRestraintParams;
use crate::core::forcefield::restraints::ContactRestraints;
use crate::core::forcefield::term::TermKind;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;

/// Gaussian wells `−w exp(−(r − r0)² / 2σ²)` on the side-chain distance of listed pairs.
pub struct ContactRestraintsTerm {
    sigma_sq: f64,
    dr_cutoff: f64,
    restraints: ContactRestraints,
}

impl ContactRestraintsTerm {
    pub fn new(params: &ContactRestraintParams, restraints: ContactRestraints) -> Self {
        Self {
            sigma_sq: params.sigma * params.sigma,
            dr_cutoff: params.dr_cutoff(),
            restraints,
        }
    }
}

impl PotentialTerm for ContactRestraintsTerm {
    fn kind(&self) -> TermKind {
        TermKind::ContactRestraints
    }

    fn scope(&self) -> Scope {
        Scope::PerPair
    }

    fn is_admissible(&self, ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        let Target::Pair(i, j) = target else {
            return Ok(false);
        };
        Ok((!ctx.sequence.same_chain(i, j) || j - i > 1) && self.restraints.get(i, j).is_some())
    }

    fn energy_and_force(
        &self,
        ctx: &StepContext,
        target: Target,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        let Target::Pair(i, j) = target else {
            return Ok(());
        };
        let Some(restraint) = self.restraints.get(i, j) else {
            return Ok(());
        };
        let dx = ctx.representative(i, TermKind::ContactRestraints)?
            - ctx.representative(j, TermKind::ContactRestraints)?;
        let r = dx.norm();
        let dr = r - restraint.r0;
        if dr.abs() >= self.dr_cutoff {
            return Ok(());
        }
        let v = -restraint.weight * (-0.5 * dr * dr / self.sigma_sq).exp();
        acc.add_energy(TermKind::ContactRestraints, v);
        central_force(
            acc,
            (i, ctx.representative_site(i)),
            (j, ctx.representative_site(j)),
            dx,
            v * dr / (self.sigma_sq * r),
        );
        Ok(())
    }
}
