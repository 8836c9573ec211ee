use super::{BetaPrediction, PotentialTerm, Scope, Target, central_force};
use crate::core::backbone::sites::Site;
use crate::core::forcefield::coefficients::PApParams;
use crate::core::forcefield::potentials::extension_factor;
use crate::core::forcefield::term::TermKind;
use crate::core::models::sequence::Sequence;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;
use nalgebra::Vector3;

/// Rewards Cα pairs `(i, j)` whose ladder partners `(i + d, j ∓ d)` are also in contact,
/// the signature of antiparallel and parallel β ladders.
pub struct PApTerm {
    params: PApParams,
    beta: BetaPrediction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Ladders {
    antiparallel_medium: bool,
    antiparallel_long: bool,
    parallel: bool,
}

impl Ladders {
    fn of(sequence: &Sequence, p: &PApParams, i: usize, j: usize) -> Self {
        let d = p.i_diff;
        if sequence.same_chain(i, j) {
            let Some(end) = sequence.chain_end(i) else {
                return Self::default();
            };
            let medium = p.i_med_min + 2 * d;
            let long = p.i_med_max + 2 * d + 1;
            let parallel = p.i_med_max + 1;
            Self {
                antiparallel_medium: i + medium < end
                    && j >= i + medium
                    && j <= (i + p.i_med_max + 2 * d).min(end - 1),
                antiparallel_long: i + long < end && j >= i + long && j < end,
                parallel: i + parallel + d < end && j >= i + parallel && j + d < end,
            }
        } else {
            let i_partner = sequence.same_chain(i, i + d);
            Self {
                antiparallel_medium: false,
                antiparallel_long: i_partner
                    && j.checked_sub(d).is_some_and(|jd| sequence.same_chain(j, jd)),
                parallel: i_partner && sequence.same_chain(j, j + d),
            }
        }
    }
}

impl PApTerm {
    pub(super) fn new(params: PApParams, beta: BetaPrediction) -> Self {
        Self { params, beta }
    }

    fn alpha_pair(
        ctx: &StepContext,
        a: usize,
        b: usize,
    ) -> Result<Vector3<f64>, EngineError> {
        Ok(ctx.site(a, Site::Alpha, TermKind::PAp)? - ctx.site(b, Site::Alpha, TermKind::PAp)?)
    }

    fn in_range(&self, ctx: &StepContext, i: usize, j: usize) -> Result<bool, EngineError> {
        if i + self.params.i_med_min >= ctx.sequence.len() {
            return Ok(false);
        }
        Ok(Self::alpha_pair(ctx, i, j)?.norm_squared() < self.params.cutoff_sq())
    }

    /// Adds `−k_global K ν(i, j) ν(i', j')` and its Cα forces.
    fn ladder(
        &self,
        ctx: &StepContext,
        strength: f64,
        (i, j): (usize, usize),
        (ip, jp): (usize, usize),
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        let p = &self.params;
        let dx = [Self::alpha_pair(ctx, i, j)?, Self::alpha_pair(ctx, ip, jp)?];
        let r = [dx[0].norm(), dx[1].norm()];
        let nu = [
            extension_factor(r[0], p.cut, p.pref),
            extension_factor(r[1], p.cut, p.pref),
        ];
        acc.add_energy(TermKind::PAp, -strength * nu[0].0 * nu[1].0);

        let f0 = strength * nu[0].1 * nu[1].0 / r[0];
        let f1 = strength * nu[0].0 * nu[1].1 / r[1];
        central_force(acc, (i, Site::Alpha), (j, Site::Alpha), dx[0], f0);
        central_force(acc, (ip, Site::Alpha), (jp, Site::Alpha), dx[1], f1);
        Ok(())
    }

    fn oriented(
        &self,
        ctx: &StepContext,
        i: usize,
        j: usize,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        let p = &self.params;
        let d = p.i_diff;
        let ladders = Ladders::of(ctx.sequence, p, i, j);
        let predicted = if self.beta.both(i, j) { p.k_betapred } else { 1.0 };

        if ladders.antiparallel_medium || ladders.antiparallel_long {
            let mut k = 0.0;
            if ladders.antiparallel_medium {
                k += p.k[0];
            }
            if ladders.antiparallel_long {
                k += p.k[1] * predicted;
            }
            self.ladder(ctx, p.k_global * k, (i, j), (i + d, j - d), acc)?;
        }
        if ladders.parallel {
            let k = p.k[2] * predicted;
            self.ladder(ctx, p.k_global * k, (i, j), (i + d, j + d), acc)?;
        }
        Ok(())
    }
}

impl PotentialTerm for PApTerm {
    fn kind(&self) -> TermKind {
        TermKind::PAp
    }

    fn scope(&self) -> Scope {
        Scope::PerPair
    }

    fn is_admissible(&self, ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        let Target::Pair(i, j) = target else {
            return Ok(false);
        };
        Ok(self.in_range(ctx, i, j)? || self.in_range(ctx, j, i)?)
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
        for (a, b) in [(i, j), (j, i)] {
            if self.in_range(ctx, a, b)? {
                self.oriented(ctx, a, b, acc)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::coefficients::CoefficientSet;
    use crate::engine::terms::testing;

    const TOLERANCE: f64 = 1e-9;

    fn coefficients() -> CoefficientSet {
        CoefficientSet {
            p_ap: Some(testing::p_ap_params()),
            ..CoefficientSet::default()
        }
    }

    fn ladders(sequence: &Sequence, i: usize, j: usize) -> Ladders {
        Ladders::of(sequence, &testing::p_ap_params(), i, j)
    }

    #[test]
    fn forces_match_energy_gradient_and_sum_to_zero() {
        let sequence = Sequence::parse("VKVTVEVKVTVEVKVT AKVEVTVKVEVTVKVA").unwrap();
        let system = testing::helix_bundle(&sequence, 61);
        let forcefield = testing::forcefield(coefficients(), &sequence);

        let (energies, forces) = testing::evaluate(&system, &sequence, &forcefield, None);
        assert!(energies.get(TermKind::PAp) < 0.0);
        assert!(forces.net().norm() < TOLERANCE);

        testing::assert_forces_match_gradient(&system, &sequence, &forcefield, None);
    }

    #[test]
    fn same_chain_ladders_follow_the_separation_windows() {
        let sequence = Sequence::parse("AAAAAAAAAAAAAAAA").unwrap();

        assert_eq!(ladders(&sequence, 0, 5), Ladders::default());
        assert_eq!(
            ladders(&sequence, 0, 8),
            Ladders {
                antiparallel_medium: true,
                antiparallel_long: false,
                parallel: true,
            }
        );
        assert_eq!(
            ladders(&sequence, 0, 12),
            Ladders {
                antiparallel_medium: false,
                antiparallel_long: true,
                parallel: true,
            }
        );
        assert_eq!(
            ladders(&sequence, 0, 14),
            Ladders {
                antiparallel_medium: false,
                antiparallel_long: true,
                parallel: false,
            }
        );
    }

    #[test]
    fn cross_chain_ladders_need_partners_on_their_own_chains() {
        let sequence = Sequence::parse("AAAA AAAA").unwrap();

        let l = ladders(&sequence, 1, 5);
        assert!(!l.antiparallel_long, "partner 3 belongs to the first chain");
        assert!(l.parallel);

        let l = ladders(&sequence, 1, 6);
        assert!(l.antiparallel_long);
        assert!(!l.parallel, "partner 8 does not exist");

        let l = ladders(&sequence, 2, 6);
        assert!(!l.antiparallel_long && !l.parallel, "partner 4 leaves the first chain");
    }

    #[test]
    fn strand_prediction_scales_long_and_parallel_ladders() {
        let sequence = Sequence::parse("VKVTVEVKVTVEVKVT AKVEVTVKVEVTVKVA").unwrap();
        let system = testing::helix_bundle(&sequence, 62);
        let (topology, frame) = testing::backbone(&system, &sequence);
        let ctx = StepContext::new(&frame, &topology, &sequence);

        let mut params = testing::p_ap_params();
        params.k[0] = 0.0;
        let energy = |beta: BetaPrediction| {
            let term = PApTerm::new(params, beta);
            let mut acc = Accumulator::new(sequence.len());
            for i in 0..sequence.len() {
                for j in i + 1..sequence.len() {
                    term.energy_and_force(&ctx, Target::Pair(i, j), &mut acc).unwrap();
                }
            }
            acc.energies.get(TermKind::PAp)
        };

        let plain = energy(BetaPrediction::default());
        let predicted = energy(BetaPrediction {
            strand: Some(vec![true; sequence.len()]),
        });

        assert!(plain < 0.0);
        assert!((predicted - params.k_betapred * plain).abs() < TOLERANCE);
    }
}
