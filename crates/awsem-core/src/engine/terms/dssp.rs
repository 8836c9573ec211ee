//! Backbone hydrogen bonding in the style of DSSP.
//!
//! A bond from the carbonyl O of acceptor `i` to the amide N–H of donor `j` is weighted by
//! up to three companion bonds that make it part of a helix or a sheet ladder: the
//! repulsive partner `(i, j + 1)`, the antiparallel partner `(j, i)` and the parallel
//! partner `(j, i + 2)`. The weights λ depend on the sequence separation class and on
//! β-sheet pairing statistics. Outside helical separations the bond is further switched
//! off where either chain is locally compact (the chain-extension factor ν).

use super::{BetaPrediction, HBondGeometry, HBondShape, PotentialTerm, Scope, Target, central_force};
use crate::core::backbone::sites::Site;
use crate::core::forcefield::coefficients::{DSSP_NU_DELTA, DsspParams};
use crate::core::forcefield::statistics::HBondStatistics;
use crate::core::forcefield::term::TermKind;
use crate::core::models::sequence::Sequence;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;
use nalgebra::Vector3;

const SHORT_RANGE: usize = 4;
const MEDIUM_RANGE: usize = 18;
const LONG_RANGE: usize = 45;
/// The separation class without chain-extension factors.
const HELICAL_CLASS: usize = 1;

pub struct DsspTerm {
    params: DsspParams,
    shape: HBondShape,
    statistics: HBondStatistics,
    beta: BetaPrediction,
}

/// Which companion bonds exist for an acceptor/donor pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Companions {
    repulsive: bool,
    antiparallel: bool,
    parallel: bool,
}

impl Companions {
    fn of(sequence: &Sequence, i: usize, j: usize) -> Self {
        let pro = |k: usize| sequence.residues()[k].is_proline();
        let j_last = sequence.is_last(j);
        let i_end = sequence.chain_end(i).unwrap_or(0);
        Self {
            repulsive: !j_last && !pro(j + 1),
            antiparallel: !sequence.is_first(i) && !j_last && !pro(i),
            parallel: i + 2 < i_end && !j_last && !pro(i + 2),
        }
    }
}

/// The chain-extension factor around one residue and the pair vector it was measured on.
#[derive(Debug, Clone, Copy)]
struct Extension {
    nu: f64,
    prd: f64,
    /// `(k + 2, k − 2, x_{k+2} − x_{k−2})` when the window exists.
    window: Option<(usize, usize, Vector3<f64>)>,
}

impl DsspTerm {
    pub(super) fn new(
        params: DsspParams,
        statistics: HBondStatistics,
        beta: BetaPrediction,
    ) -> Self {
        let shape = HBondShape {
            sigma_no: params.sigma_no,
            sigma_ho: params.sigma_ho,
            no_zero: params.no_zero,
            ho_zero: params.ho_zero,
        };
        Self {
            params,
            shape,
            statistics,
            beta,
        }
    }

    fn accepts(&self, ctx: &StepContext, i: usize, j: usize) -> Result<bool, EngineError> {
        let seq = ctx.sequence;
        if seq.is_last(i)
            || seq.is_first(j)
            || !ctx.is_present(j - 1)
            || ctx.residue_type(j).is_proline()
            || (seq.same_chain(i, j) && i.abs_diff(j) <= 2)
        {
            return Ok(false);
        }
        let r_no = (ctx.site(i, Site::Oxygen, TermKind::Dssp)?
            - ctx.site(j, Site::Nitrogen, TermKind::Dssp)?)
        .norm();
        Ok(r_no <= self.params.cut)
    }

    /// The separation class and the four λ weights of the bond `i → j`.
    fn lambdas(&self, sequence: &Sequence, i: usize, j: usize, c: Companions) -> (usize, [f64; 4]) {
        let aa = |k: usize| sequence.residues()[k];
        let s = &self.statistics;

        let mut anti_hb = [0.0; 2];
        let mut anti_nhb = [0.0; 2];
        let mut para_hb = [0.0; 2];
        for block in 0..2 {
            if c.antiparallel {
                anti_hb[block] = 0.5 * s.anti_hb(aa(i), aa(j), block);
                anti_nhb[block] = 0.25
                    * (s.anti_nhb(aa(i + 1), aa(j - 1), block)
                        + s.anti_nhb(aa(i - 1), aa(j + 1), block));
            }
            if c.parallel {
                para_hb[block] = s.para_hb(aa(i + 1), aa(j), block);
            }
        }

        let separation = i.abs_diff(j);
        let class = match separation {
            _ if !sequence.same_chain(i, j) => 3,
            d if d < SHORT_RANGE => 0,
            d if d < MEDIUM_RANGE => 1,
            d if d < LONG_RANGE => 2,
            _ => 3,
        };
        let h = &self.params.hbscl[class];
        let anti_single = s.anti_one(aa(i)) + s.anti_one(aa(j));

        let lambda = match class {
            0 => [-h[0], -h[1], 0.0, 0.0],
            1 if self.beta.both(i, j) => [
                -h[0],
                -h[1],
                -h[2] - h[3] * anti_hb[0] - h[4] * anti_nhb[0] - h[5] * anti_single,
                -h[6],
            ],
            1 => [0.0, -h[1], 0.0, 0.0],
            _ => [
                -h[0],
                -h[1],
                -h[2] - h[3] * anti_hb[1] - h[4] * anti_nhb[1] - h[5] * anti_single,
                -h[6]
                    - h[7] * para_hb[1]
                    - h[8] * (s.para_one(aa(i + 1)) + s.para_one(aa(j))),
            ],
        };
        (class, lambda)
    }

    fn extension(
        &self,
        ctx: &StepContext,
        k: usize,
        which: usize,
        class: usize,
    ) -> Result<Extension, EngineError> {
        let span = ctx.sequence.chain_span(k);
        let windowed = class != HELICAL_CLASS
            && span.is_some_and(|s| k >= s.start + 2 && k + 2 < s.end());
        if !windowed {
            return Ok(Extension {
                nu: 1.0,
                prd: 0.0,
                window: None,
            });
        }

        let dx = ctx.site(k + 2, Site::Alpha, TermKind::Dssp)?
            - ctx.site(k - 2, Site::Alpha, TermKind::Dssp)?;
        let rsq = dx.norm_squared();
        let (nu, prd) = if rsq > self.params.nu_cut_sq(which) {
            let r = rsq.sqrt();
            let pref = self.params.pref[which];
            let th = (pref * (r - self.params.d_nu0)).tanh();
            let nu = 0.5 * (1.0 + th);
            (nu, pref * nu * (1.0 - th) / r)
        } else {
            (0.0, 0.0)
        };
        Ok(Extension {
            nu,
            prd,
            window: Some((k + 2, k - 2, dx)),
        })
    }

    fn bond(
        &self,
        ctx: &StepContext,
        i: usize,
        j: usize,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        let companions = Companions::of(ctx.sequence, i, j);
        let (class, lambda) = self.lambdas(ctx.sequence, i, j, companions);

        let ext = [
            self.extension(ctx, i, 0, class)?,
            self.extension(ctx, j, 1, class)?,
        ];
        if ext[0].nu < DSSP_NU_DELTA || ext[1].nu < DSSP_NU_DELTA {
            return Ok(());
        }

        let measure = |acceptor: usize, donor: usize| {
            HBondGeometry::measure(ctx, acceptor, donor, &self.shape, TermKind::Dssp)
        };
        let main = measure(i, j)?;
        let partners = [
            companions.repulsive.then(|| measure(i, j + 1).map(|g| (i, j + 1, g))),
            companions.antiparallel.then(|| measure(j, i).map(|g| (j, i, g))),
            companions.parallel.then(|| measure(j, i + 2).map(|g| (j, i + 2, g))),
        ];

        let mut v = [lambda[0], 0.0, 0.0, 0.0];
        let mut geometry = [None; 3];
        for (slot, partner) in partners.into_iter().enumerate() {
            if let Some(partner) = partner {
                let (acceptor, donor, g) = partner?;
                v[slot + 1] = lambda[slot + 1] * g.theta;
                geometry[slot] = Some((acceptor, donor, g));
            }
        }

        let strength = self.params.k * main.theta;
        let theta_sum = strength * v.iter().sum::<f64>();
        let scale = strength * ext[0].nu * ext[1].nu;
        v.iter_mut().for_each(|x| *x *= scale);
        let total: f64 = v.iter().sum();
        acc.add_energy(TermKind::Dssp, total);

        for (own, other) in [(0, 1), (1, 0)] {
            if let Some((upper, lower, dx)) = ext[own].window {
                let f = -theta_sum * ext[own].prd * ext[other].nu;
                central_force(acc, (upper, Site::Alpha), (lower, Site::Alpha), dx, f);
            }
        }

        main.apply(acc, i, j, total);
        for (slot, partner) in geometry.into_iter().enumerate() {
            if let Some((acceptor, donor, g)) = partner {
                g.apply(acc, acceptor, donor, v[slot + 1]);
            }
        }
        Ok(())
    }
}

impl PotentialTerm for DsspTerm {
    fn kind(&self) -> TermKind {
        TermKind::Dssp
    }

    fn scope(&self) -> Scope {
        Scope::PerPair
    }

    fn is_admissible(&self, ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        let Target::Pair(i, j) = target else {
            return Ok(false);
        };
        Ok(self.accepts(ctx, i, j)? || self.accepts(ctx, j, i)?)
    }

    /// Evaluates both orientations of the pair: `i` accepting from `j` and `j` accepting
    /// from `i`.
    fn energy_and_force(
        &self,
        ctx: &StepContext,
        target: Target,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        let Target::Pair(i, j) = target else {
            return Ok(());
        };
        for (acceptor, donor) in [(i, j), (j, i)] {
            if self.accepts(ctx, acceptor, donor)? {
                self.bond(ctx, acceptor, donor, acc)?;
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

    const TOLERANCE: f64 = 1e-12;

    fn term(beta: BetaPrediction) -> DsspTerm {
        DsspTerm::new(testing::dssp_params(), HBondStatistics::uniform(0.3, 0.2), beta)
    }

    fn coefficients() -> CoefficientSet {
        CoefficientSet {
            dssp: Some(testing::dssp_params()),
            ..CoefficientSet::default()
        }
    }

    #[test]
    fn forces_match_energy_gradient() {
        let sequence = Sequence::parse("MKTAYGLVKEAW QEVLKAGT").unwrap();
        let system = testing::helix_bundle(&sequence, 51);
        let forcefield = testing::forcefield(coefficients(), &sequence);

        let (energies, _) = testing::evaluate(&system, &sequence, &forcefield, None);
        assert!(energies.get(TermKind::Dssp).abs() > 0.0);
        testing::assert_forces_match_gradient(&system, &sequence, &forcefield, None);
    }

    #[test]
    fn forces_match_energy_gradient_with_strand_prediction() {
        let sequence = Sequence::parse("VKVTVEVKVTVEVKVTVEVKVT").unwrap();
        let system = testing::helix_bundle(&sequence, 52);
        let forcefield = testing::forcefield(
            CoefficientSet {
                rama: Some(testing::rama_params()),
                ss_weight: Some([true; 12]),
                ..coefficients()
            },
            &sequence,
        );
        testing::assert_forces_match_gradient(&system, &sequence, &forcefield, None);
    }

    #[test]
    fn prolines_never_donate() {
        let sequence = Sequence::parse("PPPPPPPP").unwrap();
        let system = testing::helix_bundle(&sequence, 53);
        let forcefield = testing::forcefield(coefficients(), &sequence);

        let (energies, forces) = testing::evaluate(&system, &sequence, &forcefield, None);

        assert_eq!(energies.get(TermKind::Dssp), 0.0);
        assert!(forces.iter().all(|(_, f)| f.norm() < TOLERANCE));
    }

    #[test]
    fn short_range_pairs_use_only_the_direct_and_repulsive_weights() {
        let sequence = Sequence::parse("AAAAAAAA").unwrap();
        let h = testing::dssp_params().hbscl;
        let c = Companions::of(&sequence, 1, 4);

        let (class, lambda) = term(BetaPrediction::default()).lambdas(&sequence, 1, 4, c);

        assert_eq!(class, 0);
        assert_eq!(lambda, [-h[0][0], -h[0][1], 0.0, 0.0]);
    }

    #[test]
    fn medium_range_sheet_weights_require_strand_prediction() {
        let sequence = Sequence::parse("AAAAAAAAAAAA").unwrap();
        let h = testing::dssp_params().hbscl[1];
        let c = Companions::of(&sequence, 2, 8);
        assert!(c.repulsive && c.antiparallel && c.parallel);

        let (class, lambda) = term(BetaPrediction::default()).lambdas(&sequence, 2, 8, c);
        assert_eq!(class, 1);
        assert_eq!(lambda, [0.0, -h[1], 0.0, 0.0]);

        let strands = BetaPrediction {
            strand: Some(vec![true; sequence.len()]),
        };
        let (_, lambda) = term(strands).lambdas(&sequence, 2, 8, c);
        let expected_anti = -h[2] - h[3] * 0.5 * 0.3 - h[4] * 0.25 * 0.6 - h[5] * 0.4;
        assert!((lambda[2] - expected_anti).abs() < TOLERANCE);
        assert_eq!(lambda[3], -h[6]);
    }

    #[test]
    fn pairs_on_different_chains_use_the_long_range_weights() {
        let sequence = Sequence::parse("AAAAA AAAAA").unwrap();
        let h = testing::dssp_params().hbscl[3];
        let c = Companions::of(&sequence, 1, 7);

        let (class, lambda) = term(BetaPrediction::default()).lambdas(&sequence, 1, 7, c);

        assert_eq!(class, 3);
        let expected_parallel = -h[6] - h[7] * 0.3 - h[8] * 0.4;
        assert!((lambda[3] - expected_parallel).abs() < TOLERANCE);
    }

    #[test]
    fn companions_respect_chain_ends_and_prolines() {
        let sequence = Sequence::parse("APAAAAP").unwrap();

        let c = Companions::of(&sequence, 0, 5);
        assert!(!c.repulsive, "donor 5 is followed by a proline");
        assert!(!c.antiparallel, "acceptor 0 starts the chain");
        assert!(c.parallel);

        let c = Companions::of(&sequence, 1, 4);
        assert!(c.repulsive);
        assert!(!c.antiparallel, "acceptor 1 is a proline");

        let c = Companions::of(&sequence, 4, 6);
        assert!(!c.repulsive && !c.antiparallel && !c.parallel);
    }
}
