use super::sites::Site;
use crate::core::forcefield::coefficients::VirtualSiteCoefficients;
use crate::core::models::sequence::Sequence;
use crate::core::models::system::ParticleSystem;
use crate::core::topology::residue::ResidueTopology;
use nalgebra::Point3;
use tracing::instrument;

/// Positions of all six backbone sites of every usable residue for one step.
///
/// Real sites come from the unwrapped particle positions of Local and Remote residues.
/// Virtual sites exist only where both defining residues are usable and on the same chain.
#[derive(Debug, Clone, PartialEq)]
pub struct BackboneFrame {
    sites: Vec<[Option<Point3<f64>>; Site::COUNT]>,
}

impl BackboneFrame {
    #[instrument(skip_all, name = "virtual_atoms")]
    pub fn build(
        system: &ParticleSystem,
        topology: &ResidueTopology,
        sequence: &Sequence,
        coefficients: &VirtualSiteCoefficients,
    ) -> Self {
        let n = topology.len();
        let mut sites = vec![[None; Site::COUNT]; n];

        for residue in topology.present_iter() {
            let slot = &mut sites[residue.index];
            slot[Site::Alpha.index()] = residue.alpha.and_then(|id| system.unwrapped_position(id));
            slot[Site::Beta.index()] = residue.beta.and_then(|id| system.unwrapped_position(id));
            slot[Site::Oxygen.index()] =
                residue.oxygen.and_then(|id| system.unwrapped_position(id));
        }

        let c = coefficients;
        for i in 1..n {
            if sequence.is_first(i) {
                continue;
            }
            let (Some(ca_prev), Some(ca), Some(o_prev)) = (
                sites[i - 1][Site::Alpha.index()],
                sites[i][Site::Alpha.index()],
                sites[i - 1][Site::Oxygen.index()],
            ) else {
                continue;
            };
            let combine = |a: f64, b: f64, cc: f64| {
                Point3::from(a * ca_prev.coords + b * ca.coords + cc * o_prev.coords)
            };
            sites[i][Site::Nitrogen.index()] = Some(combine(c.an, c.bn, c.cn));
            sites[i][Site::Hydrogen.index()] = Some(combine(c.ah, c.bh, c.ch));
            sites[i - 1][Site::CPrime.index()] = Some(combine(c.ap, c.bp, c.cp));
        }

        Self { sites }
    }

    #[inline]
    pub fn get(&self, residue: usize, site: Site) -> Option<Point3<f64>> {
        self.sites.get(residue).and_then(|s| s[site.index()])
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
