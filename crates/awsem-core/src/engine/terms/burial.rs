use super::{PotentialTerm, Scope, Target, central_force};
use crate::core::forcefield::coefficients::BurialParams;
use crate::core::forcefield::gamma::BurialGamma;
use crate::core::forcefield::potentials::{WellWindow, burial_window};
use crate::core::forcefield::term::TermKind;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::density::is_density_pair;
use crate::engine::error::EngineError;

/// `−½ k Σ_l γ_l(a_i) (tanh κ(ρ_i − ρmin_l) + tanh κ(ρmax_l − ρ_i))` on the water density
/// of each residue.
///
/// The energy lives on residues, its force on the density pairs that build ρ: the pair
/// `(i, j)` feels `(s_i + s_j) θ′/r (x_i − x_j)` with the burial slope `s = −dE/dρ`.
pub struct BurialTerm {
    params: BurialParams,
    gamma: BurialGamma,
    window: WellWindow,
}

impl BurialTerm {
    pub(super) fn new(params: BurialParams, gamma: BurialGamma, window: WellWindow) -> Self {
        Self {
            params,
            gamma,
            window,
        }
    }

    fn residue_energy(&self, ctx: &StepContext, i: usize) -> Result<f64, EngineError> {
        let rho = ctx.density_field(TermKind::Burial)?.rho().water(i);
        let aa = ctx.residue_type(i);
        let sum: f64 = self
            .params
            .ro
            .iter()
            .enumerate()
            .map(|(l, &(lo, hi))| self.gamma.get(aa, l) * burial_window(rho, lo, hi, self.params.kappa).0)
            .sum();
        Ok(-0.5 * self.params.k * sum)
    }
}

impl PotentialTerm for BurialTerm {
    fn kind(&self) -> TermKind {
        TermKind::Burial
    }

    fn scope(&self) -> Scope {
        Scope::PerResidueAndPair
    }

    fn is_admissible(&self, ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        Ok(match target {
            Target::Residue(_) => true,
            Target::Pair(i, j) => i != j && is_density_pair(ctx.sequence, i, j),
        })
    }

    fn energy_and_force(
        &self,
        ctx: &StepContext,
        target: Target,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        match target {
            Target::Residue(i) => {
                acc.add_energy(TermKind::Burial, self.residue_energy(ctx, i)?);
            }
            Target::Pair(i, j) => {
                let dx = ctx.representative(i, TermKind::Burial)?
                    - ctx.representative(j, TermKind::Burial)?;
                let rsq = dx.norm_squared();
                if !self.window.contains_sq(rsq) {
                    return Ok(());
                }
                let density = ctx.density_field(TermKind::Burial)?;
                let (_, prd) = self.window.theta_and_prd(rsq.sqrt());
                let slope = density.burial_slope(i) + density.burial_slope(j);
                central_force(
                    acc,
                    (i, ctx.representative_site(i)),
                    (j, ctx.representative_site(j)),
                    dx,
                    slope * prd,
                );
            }
        }
        Ok(())
    }
}
