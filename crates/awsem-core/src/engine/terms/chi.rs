use super::{PotentialTerm, Scope, Target};
use crate::core::backbone::sites::Site;
use crate::core::forcefield::coefficients::ChiParams;
use crate::core::forcefield::term::TermKind;
use crate::core::utils::geometry::chirality_with_gradient;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;

/// Keeps every Cβ on the L side of its backbone: `k (χ − χ0)²` on the chirality triple
/// product.
pub struct ChiTerm {
    params: ChiParams,
}

impl ChiTerm {
    pub fn new(params: ChiParams) -> Self {
        Self { params }
    }
}

impl PotentialTerm for ChiTerm {
    fn kind(&self) -> TermKind {
        TermKind::Chi
    }

    fn scope(&self) -> Scope {
        Scope::PerResidue
    }

    fn is_admissible(&self, ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        let Target::Residue(i) = target else {
            return Ok(false);
        };
        Ok(!ctx.sequence.is_first(i)
            && !ctx.sequence.is_last(i)
            && !ctx.residue_type(i).is_glycine())
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
        let sites = [Site::CPrime, Site::Alpha, Site::Nitrogen, Site::Beta];
        let [cp, ca, n, cb] = [
            ctx.site(i, sites[0], TermKind::Chi)?,
            ctx.site(i, sites[1], TermKind::Chi)?,
            ctx.site(i, sites[2], TermKind::Chi)?,
            ctx.site(i, sites[3], TermKind::Chi)?,
        ];
        let (chi, gradient) = chirality_with_gradient(&cp, &ca, &n, &cb);
        let delta = chi - self.params.chi0;
        acc.add_energy(TermKind::Chi, self.params.k * delta * delta);

        let scale = -2.0 * self.params.k * delta;
        for (site, g) in sites.into_iter().zip(gradient) {
            acc.add_force(i, site, g * scale);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::coefficients::CoefficientSet;
    use crate::core::models::sequence::Sequence;
    use crate::engine::terms::testing;

    const TOLERANCE: f64 = 1e-9;

    fn coefficients() -> CoefficientSet {
        CoefficientSet {
            chi: Some(testing::chi_params()),
            ..CoefficientSet::default()
        }
    }

    #[test]
    fn forces_match_energy_gradient() {
        let sequence = Sequence::parse("MKTAYGLVKE").unwrap();
        let system = testing::helix_bundle(&sequence, 21);
        let forcefield = testing::forcefield(coefficients(), &sequence);
        testing::assert_forces_match_gradient(&system, &sequence, &forcefield, None);
    }

    #[test]
    fn terminal_and_glycine_residues_carry_no_chirality_energy() {
        let sequence = Sequence::parse("AGA").unwrap();
        let system = testing::helix_bundle(&sequence, 4);
        let forcefield = testing::forcefield(coefficients(), &sequence);

        let (energies, forces) = testing::evaluate(&system, &sequence, &forcefield, None);

        assert!(energies.get(TermKind::Chi).abs() < TOLERANCE);
        assert!(forces.iter().all(|(_, f)| f.norm() < TOLERANCE));
    }

    #[test]
    fn energy_follows_the_chirality_of_the_middle_residue() {
        let sequence = Sequence::parse("AAA").unwrap();
        let system = testing::helix_bundle(&sequence, 8);
        let (_, frame) = testing::backbone(&system, &sequence);
        let p = testing::chi_params();
        let sites = [Site::CPrime, Site::Alpha, Site::Nitrogen, Site::Beta]
            .map(|s| frame.get(1, s).unwrap());
        let (chi, _) = chirality_with_gradient(&sites[0], &sites[1], &sites[2], &sites[3]);

        let forcefield = testing::forcefield(coefficients(), &sequence);
        let (energies, _) = testing::evaluate(&system, &sequence, &forcefield, None);

        let expected = p.k * (chi - p.chi0).powi(2);
        assert!((energies.get(TermKind::Chi) - expected).abs() < TOLERANCE);
    }
}
