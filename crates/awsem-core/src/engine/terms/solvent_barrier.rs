use super::{PotentialTerm, Scope, Target, central_force};
use crate::core::forcefield::coefficients::SolventBarrierParams;
use crate::core::forcefield::term::TermKind;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;

/// Two repulsive tanh plateaus on the side-chain distance of distant residue pairs, the
/// desolvation barriers between direct and water-mediated contact.
pub struct SolventBarrierTerm {
    params: SolventBarrierParams,
    /// Distance past `rmax` beyond which a plateau is dropped.
    tail: f64,
}

impl SolventBarrierTerm {
    pub fn new(params: SolventBarrierParams) -> Self {
        Self {
            tail: 10.0 / params.kappa,
            params,
        }
    }

    /// The two `(k, rmin, rmax)` plateaus of a pair, shifted by the residue radii when the
    /// correction is on.
    fn wells(&self, ctx: &StepContext, i: usize, j: usize) -> [(f64, f64, f64); 2] {
        let p = &self.params;
        let shift = if p.radius_correction {
            p.rshift[ctx.residue_type(i).index()] + p.rshift[ctx.residue_type(j).index()]
        } else {
            0.0
        };
        [
            (p.k1, p.rmin1 + shift, p.rmax1 + shift),
            (p.k2, p.rmin2 + shift, p.rmax2 + shift),
        ]
    }
}

impl PotentialTerm for SolventBarrierTerm {
    fn kind(&self) -> TermKind {
        TermKind::SolventBarrier
    }

    fn scope(&self) -> Scope {
        Scope::PerPair
    }

    fn is_admissible(&self, ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        let Target::Pair(i, j) = target else {
            return Ok(false);
        };
        Ok(!ctx.sequence.same_chain(i, j) || j - i >= self.params.min_sep)
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
        let dx = ctx.representative(i, TermKind::SolventBarrier)?
            - ctx.representative(j, TermKind::SolventBarrier)?;
        let r = dx.norm();
        let wells = self.wells(ctx, i, j);
        if wells.iter().all(|&(_, _, rmax)| r > rmax + self.tail) {
            return Ok(());
        }

        let kappa = self.params.kappa;
        let mut scale = 0.0;
        for (k, rmin, rmax) in wells {
            let t_min = (kappa * (r - rmin)).tanh();
            let t_max = (kappa * (rmax - r)).tanh();
            let theta = 0.5 * (t_min + t_max);
            acc.add_energy(TermKind::SolventBarrier, k * theta);
            scale -= k * kappa * theta * (t_max - t_min) / r;
        }
        central_force(
            acc,
            (i, ctx.representative_site(i)),
            (j, ctx.representative_site(j)),
            dx,
            scale,
        );
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

    fn coefficients(params: SolventBarrierParams) -> CoefficientSet {
        CoefficientSet {
            solvent_barrier: Some(params),
            ..CoefficientSet::default()
        }
    }

    fn plateau(r: f64, rmin: f64, rmax: f64, kappa: f64) -> f64 {
        0.5 * ((kappa * (r - rmin)).tanh() + (kappa * (rmax - r)).tanh())
    }

    #[test]
    fn forces_match_energy_gradient_and_sum_to_zero() {
        let sequence = Sequence::parse("MKTAYGLV AKEGWQ").unwrap();
        let system = testing::helix_bundle(&sequence, 51);
        let forcefield = testing::forcefield(
            coefficients(testing::solvent_barrier_params()),
            &sequence,
        );
        testing::assert_forces_match_gradient(&system, &sequence, &forcefield, None);

        let (energies, forces) = testing::evaluate(&system, &sequence, &forcefield, None);
        assert!(energies.get(TermKind::SolventBarrier) > 0.0);
        assert!(forces.net().norm() < TOLERANCE);
    }

    #[test]
    fn radius_correction_matches_energy_gradient() {
        let sequence = Sequence::parse("MKTAYGLV AKEGWQ").unwrap();
        let system = testing::helix_bundle(&sequence, 52);
        let params = SolventBarrierParams {
            radius_correction: true,
            ..testing::solvent_barrier_params()
        };
        let forcefield = testing::forcefield(coefficients(params), &sequence);
        testing::assert_forces_match_gradient(&system, &sequence, &forcefield, None);
    }

    #[test]
    fn energy_sums_both_plateaus_of_every_admissible_pair() {
        let sequence = Sequence::parse("AGKLV E").unwrap();
        let system = testing::helix_bundle(&sequence, 53);
        let p = testing::solvent_barrier_params();
        let forcefield = testing::forcefield(coefficients(p), &sequence);
        let (_, frame) = testing::backbone(&system, &sequence);
        let residues = sequence.residues();
        let site = |i: usize| {
            let s = if residues[i].is_glycine() {
                crate::core::backbone::sites::Site::Alpha
            } else {
                crate::core::backbone::sites::Site::Beta
            };
            frame.get(i, s).unwrap()
        };

        let (energies, _) = testing::evaluate(&system, &sequence, &forcefield, None);

        // min_sep = 3 within chain A; residue 5 is a chain of its own.
        let pairs = [(0, 3), (0, 4), (1, 4), (0, 5), (1, 5), (2, 5), (3, 5), (4, 5)];
        let expected: f64 = pairs
            .iter()
            .map(|&(i, j)| {
                let r = (site(i) - site(j)).norm();
                p.k1 * plateau(r, p.rmin1, p.rmax1, p.kappa)
                    + p.k2 * plateau(r, p.rmin2, p.rmax2, p.kappa)
            })
            .sum();
        assert!((energies.get(TermKind::SolventBarrier) - expected).abs() < 1e-6);
    }

    #[test]
    fn close_sequence_neighbors_in_one_chain_are_skipped() {
        let sequence = Sequence::parse("AAA").unwrap();
        let system = testing::helix_bundle(&sequence, 54);
        let forcefield = testing::forcefield(
            coefficients(testing::solvent_barrier_params()),
            &sequence,
        );

        let (energies, forces) = testing::evaluate(&system, &sequence, &forcefield, None);

        assert_eq!(energies.get(TermKind::SolventBarrier), 0.0);
        assert!(forces.iter().all(|(_, f)| f.norm() < TOLERANCE));
    }
}
