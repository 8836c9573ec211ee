use super::{PotentialTerm, Scope, Target};
use crate::core::backbone::sites::Site;
use crate::core::forcefield::coefficients::{
    RAMA_BASIN_SLOTS, RamaBasin, RamaParams, SS_WEIGHT_BASINS,
};
use crate::core::forcefield::statistics::SsWeights;
use crate::core::forcefield::term::TermKind;
use crate::core::utils::geometry::dihedral_with_gradient;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;
use nalgebra::Vector3;

/// A sum of Gaussian-like basins on the backbone dihedrals φ and ψ. Basin weights arrive
/// already multiplied by `k_rama`.
///
/// Prolines use the `[Rama_P]` basins when that section is present. A basin flagged in
/// `[SSWeight]` is scaled by the residue's propensity for it and skipped where that
/// propensity is zero.
pub struct RamaTerm {
    basins: Vec<RamaBasin>,
    proline: Option<Vec<RamaBasin>>,
    flags: [bool; SS_WEIGHT_BASINS],
    weights: Option<SsWeights>,
}

struct Dihedral {
    angle: f64,
    sites: [(usize, Site); 4],
    gradient: [Vector3<f64>; 4],
}

impl RamaTerm {
    pub fn new(
        params: RamaParams,
        proline: Option<Vec<RamaBasin>>,
        flags: Option<[bool; SS_WEIGHT_BASINS]>,
        weights: Option<SsWeights>,
    ) -> Self {
        Self {
            basins: params.basins,
            proline,
            flags: flags.unwrap_or([false; SS_WEIGHT_BASINS]),
            weights,
        }
    }

    fn dihedral(ctx: &StepContext, sites: [(usize, Site); 4]) -> Result<Dihedral, EngineError> {
        let [a, b, c, d] = sites.map(|(res, site)| ctx.site(res, site, TermKind::Rama));
        let (angle, gradient) = dihedral_with_gradient(&a?, &b?, &c?, &d?);
        Ok(Dihedral {
            angle,
            sites,
            gradient,
        })
    }

    /// Basins for residue `i` with the index of the first one in the `[SSWeight]` layout.
    fn basins_for(&self, ctx: &StepContext, i: usize) -> (&[RamaBasin], usize) {
        match &self.proline {
            Some(proline) if ctx.residue_type(i).is_proline() => (proline, RAMA_BASIN_SLOTS),
            _ => (&self.basins, 0),
        }
    }
}

impl PotentialTerm for RamaTerm {
    fn kind(&self) -> TermKind {
        TermKind::Rama
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
        let phi = Self::dihedral(
            ctx,
            [
                (i - 1, Site::CPrime),
                (i, Site::Nitrogen),
                (i, Site::Alpha),
                (i, Site::CPrime),
            ],
        )?;
        let psi = Self::dihedral(
            ctx,
            [
                (i, Site::Nitrogen),
                (i, Site::Alpha),
                (i, Site::CPrime),
                (i + 1, Site::Nitrogen),
            ],
        )?;

        let (basins, first_slot) = self.basins_for(ctx, i);
        for (j, basin) in basins.iter().enumerate() {
            let slot = first_slot + j;
            let mut scale = 1.0;
            if self.flags[slot] {
                scale = self.weights.as_ref().map_or(0.0, |w| w.get(i, slot));
                if scale == 0.0 {
                    continue;
                }
            }

            let c_phi = (phi.angle + basin.phi0).cos() - 1.0;
            let c_psi = (psi.angle + basin.psi0).cos() - 1.0;
            let v = scale
                * basin.w
                * (-basin.phiw * c_phi * c_phi - basin.psiw * c_psi * c_psi).exp();
            acc.add_energy(TermKind::Rama, -v);

            let f_phi = 2.0 * v * basin.phiw * c_phi * (phi.angle + basin.phi0).sin();
            let f_psi = 2.0 * v * basin.psiw * c_psi * (psi.angle + basin.psi0).sin();
            for (dihedral, f) in [(&phi, f_phi), (&psi, f_psi)] {
                for ((res, site), g) in dihedral.sites.iter().zip(&dihedral.gradient) {
                    acc.add_force(*res, *site, g * f);
                }
            }
        }
        Ok(())
    }
}
