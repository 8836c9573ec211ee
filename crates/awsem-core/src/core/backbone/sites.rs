use crate::core::forcefield::coefficients::VirtualSiteCoefficients;
use crate::core::models::forces::ForceBuffer;
use crate::core::models::particle::ParticleKind;
use crate::core::topology::residue::ResidueTopology;
use nalgebra::Vector3;
use std::fmt;
use std::ops::AddAssign;

/// A backbone site of a residue: the three real pseudo-atoms followed by the three
/// virtual atoms rebuilt from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Site {
    Alpha,
    Beta,
    Oxygen,
    Nitrogen,
    CPrime,
    Hydrogen,
}

impl Site {
    pub const COUNT: usize = 6;
    pub const ALL: [Site; Self::COUNT] = [
        Self::Alpha,
        Self::Beta,
        Self::Oxygen,
        Self::Nitrogen,
        Self::CPrime,
        Self::Hydrogen,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Site::Alpha => "CA",
            Site::Beta => "CB",
            Site::Oxygen => "O",
            Site::Nitrogen => "N",
            Site::CPrime => "C'",
            Site::Hydrogen => "H",
        }
    }

    pub fn is_virtual(self) -> bool {
        matches!(self, Site::Nitrogen | Site::CPrime | Site::Hydrogen)
    }
}

impl From<ParticleKind> for Site {
    fn from(kind: ParticleKind) -> Self {
        match kind {
            ParticleKind::Alpha => Site::Alpha,
            ParticleKind::Beta => Site::Beta,
            ParticleKind::Oxygen => Site::Oxygen,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dense per-residue, per-site force accumulator.
///
/// Terms write forces on real and virtual sites alike; [`SiteForces::distribute`] folds the
/// virtual-site forces back onto the real particles.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteForces {
    forces: Vec<[Vector3<f64>; Site::COUNT]>,
}

impl SiteForces {
    pub fn new(residue_count: usize) -> Self {
        Self {
            forces: vec![[Vector3::zeros(); Site::COUNT]; residue_count],
        }
    }

    #[inline]
    pub fn add(&mut self, residue: usize, site: Site, force: Vector3<f64>) {
        self.forces[residue][site.index()] += force;
    }

    #[inline]
    pub fn get(&self, residue: usize, site: Site) -> Vector3<f64> {
        self.forces[residue][site.index()]
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn net(&self) -> Vector3<f64> {
        self.forces.iter().flatten().sum()
    }

    /// Moves each virtual-site force onto its three defining particles, then adds the
    /// real-site forces into `buffer` under the particle ids of `topology`.
    ///
    /// N(i) and H(i) are built from Cα(i-1), Cα(i) and O(i-1); C′(i) from Cα(i), Cα(i+1)
    /// and O(i).
    pub fn distribute(
        &self,
        topology: &ResidueTopology,
        coefficients: &VirtualSiteCoefficients,
        buffer: &mut ForceBuffer,
    ) {
        let c = coefficients;
        let mut real = self.forces.clone();
        for (i, sites) in self.forces.iter().enumerate() {
            let n = sites[Site::Nitrogen.index()];
            let h = sites[Site::Hydrogen.index()];
            if i > 0 && (n != Vector3::zeros() || h != Vector3::zeros()) {
                real[i - 1][Site::Alpha.index()] += c.an * n + c.ah * h;
                real[i][Site::Alpha.index()] += c.bn * n + c.bh * h;
                real[i - 1][Site::Oxygen.index()] += c.cn * n + c.ch * h;
            }
            let cp = sites[Site::CPrime.index()];
            if i + 1 < self.forces.len() && cp != Vector3::zeros() {
                real[i][Site::Alpha.index()] += c.ap * cp;
                real[i + 1][Site::Alpha.index()] += c.bp * cp;
                real[i][Site::Oxygen.index()] += c.cp * cp;
            }
        }

        for residue in topology.iter() {
            let forces = &real[residue.index];
            for kind in ParticleKind::ALL {
                if let Some(id) = residue.site(kind) {
                    buffer.add(id, forces[Site::from(kind).index()]);
                }
            }
        }
    }
}

impl AddAssign<&SiteForces> for SiteForces {
    fn add_assign(&mut self, rhs: &SiteForces) {
        for (lhs, rhs) in self.forces.iter_mut().zip(&rhs.forces) {
            for (a, b) in lhs.iter_mut().zip(rhs) {
                *a += b;
            }
        }
    }
}
