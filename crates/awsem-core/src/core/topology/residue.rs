use crate::core::models::ids::ParticleId;
use crate::core::models::particle::ParticleKind;
use crate::core::models::residue::AminoAcid;

/// How a residue takes part in this process's evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Owned here; every term anchored on it is evaluated here.
    Local,
    /// A ghost whose atoms are complete enough to serve as a partner.
    Remote,
    /// Present in the halo but unusable.
    Off,
}

/// One residue of the topology, identified by its 0-based global index.
#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    pub index: usize,
    pub residue_type: AminoAcid,
    /// 0-based chain ordinal.
    pub chain: usize,
    pub classification: Classification,
    pub alpha: Option<ParticleId>,
    pub beta: Option<ParticleId>,
    pub oxygen: Option<ParticleId>,
}

impl Residue {
    #[inline]
    pub fn is_local(&self) -> bool {
        self.classification == Classification::Local
    }

    /// Local or Remote.
    #[inline]
    pub fn is_present(&self) -> bool {
        self.classification != Classification::Off
    }

    pub fn site(&self, kind: ParticleKind) -> Option<ParticleId> {
        match kind {
            ParticleKind::Alpha => self.alpha,
            ParticleKind::Beta => self.beta,
            ParticleKind::Oxygen => self.oxygen,
        }
    }

    /// The particle that stands for the side chain in contact terms: Cβ, or Cα for glycine.
    pub fn representative(&self) -> Option<ParticleId> {
        if self.residue_type.is_glycine() {
            self.alpha
        } else {
            self.beta
        }
    }
}

/// The ordered residue index of one process, rebuilt on every neighbor-list update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResidueTopology {
    residues: Vec<Option<Residue>>,
    local: Vec<usize>,
}

impl ResidueTopology {
    pub(crate) fn from_residues(residues: Vec<Option<Residue>>) -> Self {
        let local = residues
            .iter()
            .flatten()
            .filter(|r| r.is_local())
            .map(|r| r.index)
            .collect();
        Self { residues, local }
    }

    /// Total number of residue slots, equal to the sequence length.
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// The residue at `index` if any of its particles is known here, Off residues included.
    pub fn get(&self, index: usize) -> Option<&Residue> {
        self.residues.get(index).and_then(Option::as_ref)
    }

    /// The residue at `index` if it is Local or Remote.
    pub fn present(&self, index: usize) -> Option<&Residue> {
        self.get(index).filter(|r| r.is_present())
    }

    pub fn is_local(&self, index: usize) -> bool {
        self.get(index).is_some_and(Residue::is_local)
    }

    /// Local residue indices in increasing order.
    pub fn local_indices(&self) -> &[usize] {
        &self.local
    }

    pub fn iter(&self) -> impl Iterator<Item = &Residue> {
        self.residues.iter().flatten()
    }

    pub fn present_iter(&self) -> impl Iterator<Item = &Residue> {
        self.iter().filter(|r| r.is_present())
    }
}
