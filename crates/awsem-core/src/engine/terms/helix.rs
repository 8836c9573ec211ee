use super::{HBondGeometry, HBondShape, PotentialTerm, Scope, Target, central_force};
use crate::core::backbone::sites::Site;
use crate::core::forcefield::coefficients::HelixParams;
use crate::core::forcefield::potentials::WellWindow;
use crate::core::forcefield::term::TermKind;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::density::{LocalXi, is_density_pair};
use crate::engine::error::EngineError;

/// Combined xi coefficients below this magnitude exert no force.
const XI_DELTA: f64 = 1e-6;

/// The `i → i + d` helical hydrogen bond, weighted by the helix propensities of both
/// residues and switched between a protein-buried and a water-exposed gamma by their
/// helix densities.
pub struct HelixTerm {
    params: HelixParams,
    shape: HBondShape,
    window: WellWindow,
}

impl HelixTerm {
    pub(super) fn new(params: HelixParams) -> Self {
        let shape = HBondShape {
            sigma_no: params.sigma_no,
            sigma_ho: params.sigma_ho,
            no_zero: params.no_zero,
            ho_zero: params.ho_zero,
        };
        let window = params.window();
        Self {
            params,
            shape,
            window,
        }
    }

    fn donor(&self, ctx: &StepContext, i: usize) -> Result<Option<usize>, EngineError> {
        let j = i + self.params.i_diff;
        let seq = ctx.sequence;
        if !seq.same_chain(i, j) || seq.is_last(j) || !ctx.is_present(j) || !ctx.is_present(j - 1) {
            return Ok(None);
        }
        let r_no = (ctx.site(i, Site::Oxygen, TermKind::Helix)?
            - ctx.site(j, Site::Nitrogen, TermKind::Helix)?)
        .norm();
        Ok((r_no <= self.params.cutoff).then_some(j))
    }

    /// `p_i + p_j`, with the proline-acceptor override on `i`.
    fn propensity(&self, ctx: &StepContext, i: usize, j: usize) -> f64 {
        let p = &self.params;
        let acceptor = ctx.residue_type(i);
        let p_i = if p.pro_acceptor_flag && acceptor.is_proline() {
            p.h4prob_pro_acceptor
        } else {
            p.h4prob[acceptor.index()]
        };
        p_i + p.h4prob[ctx.residue_type(j).index()]
    }

    /// `−k (p_i + p_j) θ` of the bond `i → j`, with its geometry.
    fn bond(
        &self,
        ctx: &StepContext,
        i: usize,
        j: usize,
    ) -> Result<(f64, HBondGeometry), EngineError> {
        let geometry = HBondGeometry::measure(ctx, i, j, &self.shape, TermKind::Helix)?;
        Ok((-self.params.k * self.propensity(ctx, i, j) * geometry.theta, geometry))
    }
}

impl PotentialTerm for HelixTerm {
    fn kind(&self) -> TermKind {
        TermKind::Helix
    }

    fn scope(&self) -> Scope {
        Scope::PerResidueAndPair
    }

    fn is_admissible(&self, ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        Ok(match target {
            Target::Residue(i) => self.donor(ctx, i)?.is_some(),
            Target::Pair(i, j) => i != j && is_density_pair(ctx.sequence, i, j),
        })
    }

    fn derived_coefficients(
        &self,
        ctx: &StepContext,
        target: Target,
        xi: &mut LocalXi,
    ) -> Result<(), EngineError> {
        let Target::Residue(i) = target else {
            return Ok(());
        };
        let Some(j) = self.donor(ctx, i)? else {
            return Ok(());
        };
        let density = ctx.density_field(TermKind::Helix)?;
        let (p_theta, _) = self.bond(ctx, i, j)?;
        let (sigma_i, dsigma_i) = density.helix_switch(i);
        let (sigma_j, dsigma_j) = density.helix_switch(j);
        let weight = (self.params.gamma_w - self.params.gamma_p) * p_theta;
        xi.add_helix(i, weight * dsigma_i * sigma_j, weight * sigma_i * dsigma_j);
        Ok(())
    }

    fn energy_and_force(
        &self,
        ctx: &StepContext,
        target: Target,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        let p = &self.params;
        match target {
            Target::Residue(i) => {
                let Some(j) = self.donor(ctx, i)? else {
                    return Ok(());
                };
                let density = ctx.density_field(TermKind::Helix)?;
                let (p_theta, geometry) = self.bond(ctx, i, j)?;
                let sigma = density.helix_switch(i).0 * density.helix_switch(j).0;
                let v = (p.gamma_p + (p.gamma_w - p.gamma_p) * sigma) * p_theta;
                acc.add_energy(TermKind::Helix, v);
                geometry.apply(acc, i, j, v);
            }
            Target::Pair(i, j) => {
                let dx = ctx.representative(i, TermKind::Helix)?
                    - ctx.representative(j, TermKind::Helix)?;
                let rsq = dx.norm_squared();
                if !self.window.contains_sq(rsq) {
                    return Ok(());
                }
                let xi = ctx.reduced_xi(TermKind::Helix)?;
                let factor = xi.helix(i, p.i_diff) + xi.helix(j, p.i_diff);
                if factor.abs() <= XI_DELTA {
                    return Ok(());
                }
                let (_, prd) = self.window.theta_and_prd(rsq.sqrt());
                central_force(
                    acc,
                    (i, ctx.representative_site(i)),
                    (j, ctx.representative_site(j)),
                    dx,
                    -factor * prd,
                );
            }
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

    fn coefficients(params: HelixParams) -> CoefficientSet {
        CoefficientSet {
            helix: Some(params),
            ..CoefficientSet::default()
        }
    }

    #[test]
    fn forces_match_energy_gradient() {
        let sequence = Sequence::parse("MKTAYGLVKEAW QEVLKAGTPR").unwrap();
        let system = testing::helix_bundle(&sequence, 91);
        let forcefield = testing::forcefield(coefficients(testing::helix_params()), &sequence);

        let (energies, _) = testing::evaluate(&system, &sequence, &forcefield, None);
        assert!(energies.get(TermKind::Helix) < 0.0);

        testing::assert_forces_match_gradient(&system, &sequence, &forcefield, None);
    }

    #[test]
    fn equal_gammas_make_the_bond_independent_of_density() {
        let sequence = Sequence::parse("MKTAYGLVKEAW").unwrap();
        let system = testing::helix_bundle(&sequence, 92);
        let mut params = testing::helix_params();
        params.gamma_w = params.gamma_p;
        let forcefield = testing::forcefield(coefficients(params.clone()), &sequence);

        let (topology, frame) = testing::backbone(&system, &sequence);
        let ctx = StepContext::new(&frame, &topology, &sequence);
        let term = HelixTerm::new(params.clone());
        let mut expected = 0.0;
        for i in 0..sequence.len() {
            if let Some(j) = term.donor(&ctx, i).unwrap() {
                expected += params.gamma_p * term.bond(&ctx, i, j).unwrap().0;
            }
        }

        let (energies, _) = testing::evaluate(&system, &sequence, &forcefield, None);

        assert!(expected < 0.0);
        assert!((energies.get(TermKind::Helix) - expected).abs() < TOLERANCE);
    }

    #[test]
    fn donor_must_not_end_the_chain() {
        let sequence = Sequence::parse("AAAAAA AAAAAA").unwrap();
        let system = testing::helix_bundle(&sequence, 93);
        let (topology, frame) = testing::backbone(&system, &sequence);
        let ctx = StepContext::new(&frame, &topology, &sequence);
        let term = HelixTerm::new(testing::helix_params());

        assert_eq!(term.donor(&ctx, 0).unwrap(), Some(4));
        assert_eq!(term.donor(&ctx, 1).unwrap(), None, "residue 5 ends the first chain");
        assert_eq!(term.donor(&ctx, 4).unwrap(), None, "residue 8 is on the next chain");
    }

    #[test]
    fn proline_acceptors_use_their_own_propensity() {
        let sequence = Sequence::parse("PAAAAAK").unwrap();
        let system = testing::helix_bundle(&sequence, 94);
        let (topology, frame) = testing::backbone(&system, &sequence);
        let ctx = StepContext::new(&frame, &topology, &sequence);
        let params = testing::helix_params();
        let h = |aa: usize| params.h4prob[sequence.residues()[aa].index()];

        let term = HelixTerm::new(params.clone());
        assert!((term.propensity(&ctx, 0, 4) - (params.h4prob_pro_acceptor + h(4))).abs() < TOLERANCE);
        assert!((term.propensity(&ctx, 2, 6) - (h(2) + h(6))).abs() < TOLERANCE);

        let mut unflagged = params.clone();
        unflagged.pro_acceptor_flag = false;
        let term = HelixTerm::new(unflagged);
        assert!((term.propensity(&ctx, 0, 4) - (h(0) + h(4))).abs() < TOLERANCE);
    }
}
