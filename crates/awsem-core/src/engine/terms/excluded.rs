use super::{PotentialTerm, Scope, Target, central_force};
use crate::core::backbone::sites::Site;
use crate::core::forcefield::coefficients::ExcludedParams;
use crate::core::forcefield::term::TermKind;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;

/// One-sided repulsion between carbon sites, and between carbonyl oxygens, of two different
/// residues. The shape inside the contact radius follows the section that enabled the term.
pub struct ExcludedTerm {
    params: ExcludedParams,
}

impl ExcludedTerm {
    pub fn new(params: ExcludedParams) -> Self {
        Self { params }
    }

    fn contacts(&self, ctx: &StepContext, i: usize, j: usize) -> Vec<(Site, Site, f64, f64)> {
        let p = &self.params;
        let beta_i = !ctx.residue_type(i).is_glycine();
        let beta_j = !ctx.residue_type(j).is_glycine();
        let carbon = |a, b| (a, b, p.k_carbon, p.r_carbon);

        let mut contacts = vec![carbon(Site::Alpha, Site::Alpha)];
        if beta_j {
            contacts.push(carbon(Site::Alpha, Site::Beta));
        }
        if beta_i {
            contacts.push(carbon(Site::Beta, Site::Alpha));
        }
        if beta_i && beta_j {
            contacts.push(carbon(Site::Beta, Site::Beta));
        }
        contacts.push((Site::Oxygen, Site::Oxygen, p.k_oxygen, p.r_oxygen));
        contacts
    }
}

impl PotentialTerm for ExcludedTerm {
    fn kind(&self) -> TermKind {
        TermKind::Excluded
    }

    fn scope(&self) -> Scope {
        Scope::PerPair
    }

    fn is_admissible(&self, _ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        Ok(matches!(target, Target::Pair(i, j) if i != j))
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
        for (a, b, k, r0) in self.contacts(ctx, i, j) {
            let dx = ctx.site(i, a, TermKind::Excluded)? - ctx.site(j, b, TermKind::Excluded)?;
            let rsq = dx.norm_squared();
            if rsq >= r0 * r0 {
                continue;
            }
            let r = rsq.sqrt();
            let (energy, de_dr) = self.params.profile.evaluate(r, r0, k);
            acc.add_energy(TermKind::Excluded, energy);
            central_force(acc, (i, a), (j, b), dx, -de_dr / r);
        }
        Ok(())
    }
}
