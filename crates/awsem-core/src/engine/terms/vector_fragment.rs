//! Vector fragment-memory bias: a Gaussian well on the angle between the Cα→Cβ vectors of
//! two residues, centered on the same angle in each aligned template fragment.

use super::fragment::MemoryWindows;
use super::{PotentialTerm, Scope, Target};
use crate::core::backbone::sites::Site;
use crate::core::forcefield::coefficients::VectorFragmentParams;
use crate::core::forcefield::gamma::FragmentGamma;
use crate::core::forcefield::term::TermKind;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;
use nalgebra::Vector3;

/// Below this `sin θ` the angle gradient is singular and the force is dropped.
const MIN_SINE: f64 = 1e-8;

fn angle(u: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    (u.dot(v) / (u.norm() * v.norm())).clamp(-1.0, 1.0).acos()
}

pub struct VectorFragmentTerm {
    strength: f64,
    sigma_sq: f64,
    /// Supplies the separation window shared with the distance bias.
    gamma: FragmentGamma,
    windows: MemoryWindows,
}

impl VectorFragmentTerm {
    pub(super) fn new(
        params: VectorFragmentParams,
        gamma: FragmentGamma,
        windows: MemoryWindows,
    ) -> Self {
        Self {
            strength: params.k,
            sigma_sq: params.sigma * params.sigma,
            gamma,
            windows,
        }
    }

    fn side_chain(&self, ctx: &StepContext, i: usize) -> Result<Vector3<f64>, EngineError> {
        Ok(ctx.site(i, Site::Beta, TermKind::VectorFragmentMemory)?
            - ctx.site(i, Site::Alpha, TermKind::VectorFragmentMemory)?)
    }
}

impl PotentialTerm for VectorFragmentTerm {
    fn kind(&self) -> TermKind {
        TermKind::VectorFragmentMemory
    }

    fn scope(&self) -> Scope {
        Scope::PerResidue
    }

    fn is_admissible(&self, ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        Ok(matches!(
            target,
            Target::Residue(i) if ctx.topology.is_local(i) && !self.windows.map.memories_at(i).is_empty()
        ))
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
        if ctx.residue_type(i).is_glycine() {
            return Ok(());
        }
        let vi = self.side_chain(ctx, i)?;

        for &m in self.windows.map.memories_at(i) {
            let Some(memory) = self.windows.library.get(m) else {
                continue;
            };
            let Some(ti) = memory.side_chain(i) else {
                continue;
            };
            let mut je = memory.target_end() - 1;
            if let Some(max) = self.gamma.max_sep() {
                je = je.min(i + max);
            }

            for j in i + self.gamma.min_sep()..=je {
                if !ctx.sequence.same_chain(i, j) {
                    return Err(EngineError::CrossChain {
                        i,
                        j,
                        term: TermKind::VectorFragmentMemory,
                    });
                }
                if ctx.residue_type(j).is_glycine() {
                    continue;
                }
                let Some(tj) = memory.side_chain(j) else {
                    continue;
                };
                let vj = self.side_chain(ctx, j)?;

                let (msq_i, msq_j) = (vi.norm_squared(), vj.norm_squared());
                let norms = (msq_i * msq_j).sqrt();
                let vp = vi.dot(&vj);
                let cosine = (vp / norms).clamp(-1.0, 1.0);
                let dg = cosine.acos() - angle(&ti, &tj);
                let v = -self.strength * (-dg * dg / (2.0 * self.sigma_sq)).exp();
                acc.add_energy(TermKind::VectorFragmentMemory, v);

                let sine = (1.0 - cosine * cosine).sqrt();
                if sine < MIN_SINE {
                    continue;
                }
                let force = -v * dg / (self.sigma_sq * norms * sine);
                let fi = (vj - vi * (vp / msq_i)) * force;
                let fj = (vi - vj * (vp / msq_j)) * force;
                acc.add_pair_force((i, Site::Beta), (i, Site::Alpha), fi);
                acc.add_pair_force((j, Site::Beta), (j, Site::Alpha), fj);
            }
        }
        Ok(())
    }
}
