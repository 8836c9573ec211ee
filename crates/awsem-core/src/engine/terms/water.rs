use super::{PotentialTerm, Scope, Target, central_force};
use crate::core::forcefield::coefficients::WaterParams;
use crate::core::forcefield::gamma::WaterGamma;
use crate::core::forcefield::potentials::WellWindow;
use crate::core::forcefield::term::TermKind;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::density::{LocalXi, is_density_pair};
use crate::engine::error::EngineError;
use nalgebra::Vector3;

/// Gamma pairs closer than this are treated as density independent.
const DIRECT_GAMMA_DELTA: f64 = 1e-5;
/// Xi coefficients below this magnitude exert no force.
const XI_DELTA: f64 = 1e-8;

/// Pairwise contact energy between side-chain representatives, switching between a direct
/// and a water-mediated gamma with the local densities of both residues.
///
/// Besides the direct pair force, every density pair inside the first well feels the
/// force that flows through the densities: `(ξ_i + ξ_j) θ′/r (x_i − x_j)`.
pub struct WaterTerm {
    params: WaterParams,
    gamma: WaterGamma,
    windows: Vec<WellWindow>,
}

/// One contact well between a pair of representatives.
struct Contact {
    well: usize,
    theta: f64,
    prd: f64,
}

impl WaterTerm {
    pub(super) fn new(params: WaterParams, gamma: WaterGamma) -> Self {
        let windows = (0..params.wells.len()).map(|l| params.window(l)).collect();
        Self {
            params,
            gamma,
            windows,
        }
    }

    fn is_contact_pair(&self, ctx: &StepContext, i: usize, j: usize) -> bool {
        !ctx.sequence.same_chain(i, j) || i.abs_diff(j) >= self.params.contact_cutoff
    }

    fn representatives(
        ctx: &StepContext,
        i: usize,
        j: usize,
    ) -> Result<Vector3<f64>, EngineError> {
        Ok(ctx.representative(i, TermKind::Water)? - ctx.representative(j, TermKind::Water)?)
    }

    fn contacts(&self, rsq: f64) -> impl Iterator<Item = Contact> + '_ {
        self.windows
            .iter()
            .enumerate()
            .filter(move |(l, w)| self.params.wells[*l].enabled && w.contains_sq(rsq))
            .map(move |(well, w)| {
                let (theta, prd) = w.theta_and_prd(rsq.sqrt());
                Contact { well, theta, prd }
            })
    }
}

impl PotentialTerm for WaterTerm {
    fn kind(&self) -> TermKind {
        TermKind::Water
    }

    fn scope(&self) -> Scope {
        Scope::PerPair
    }

    fn is_admissible(&self, _ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        Ok(matches!(target, Target::Pair(i, j) if i != j))
    }

    fn derived_coefficients(
        &self,
        ctx: &StepContext,
        target: Target,
        xi: &mut LocalXi,
    ) -> Result<(), EngineError> {
        let Target::Pair(i, j) = target else {
            return Ok(());
        };
        if !self.is_contact_pair(ctx, i, j) {
            return Ok(());
        }
        let density = ctx.density_field(TermKind::Water)?;
        let rsq = Self::representatives(ctx, i, j)?.norm_squared();
        let (a, b) = (ctx.residue_type(i), ctx.residue_type(j));
        let (sigma_i, dsigma_i) = density.water_switch(i);
        let (sigma_j, dsigma_j) = density.water_switch(j);

        for contact in self.contacts(rsq) {
            let (direct, mediated) = self.gamma.get(contact.well, a, b);
            if (mediated - direct).abs() < DIRECT_GAMMA_DELTA {
                continue;
            }
            let weight = (mediated - direct) * contact.theta;
            xi.add_water(i, weight * dsigma_i * sigma_j);
            xi.add_water(j, weight * sigma_i * dsigma_j);
        }
        Ok(())
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
        let contact_pair = self.is_contact_pair(ctx, i, j);
        let density_pair = is_density_pair(ctx.sequence, i, j);
        if !contact_pair && !density_pair {
            return Ok(());
        }

        let density = ctx.density_field(TermKind::Water)?;
        let dx = Self::representatives(ctx, i, j)?;
        let rsq = dx.norm_squared();
        let (rep_i, rep_j) = (ctx.representative_site(i), ctx.representative_site(j));

        if contact_pair {
            let (a, b) = (ctx.residue_type(i), ctx.residue_type(j));
            let sigma = density.water_switch(i).0 * density.water_switch(j).0;
            for contact in self.contacts(rsq) {
                let (direct, mediated) = self.gamma.get(contact.well, a, b);
                let sigma_gamma = if (mediated - direct).abs() < DIRECT_GAMMA_DELTA {
                    0.5 * (direct + mediated)
                } else {
                    direct + (mediated - direct) * sigma
                };
                acc.add_energy(TermKind::Water, -sigma_gamma * contact.theta);
                central_force(acc, (i, rep_i), (j, rep_j), dx, sigma_gamma * contact.prd);
            }
        }

        if density_pair && self.windows[0].contains_sq(rsq) {
            let xi = ctx.reduced_xi(TermKind::Water)?;
            let factor: f64 = [xi.water(i), xi.water(j)]
                .into_iter()
                .filter(|v| v.abs() > XI_DELTA)
                .sum();
            if factor != 0.0 {
                let (_, prd) = self.windows[0].theta_and_prd(rsq.sqrt());
                central_force(acc, (i, rep_i), (j, rep_j), dx, factor * prd);
            }
        }
        Ok(())
    }
}
