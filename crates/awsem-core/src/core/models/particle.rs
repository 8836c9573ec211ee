use nalgebra::Point3;
use std::fmt;
use std::str::FromStr;

/// The three real pseudo-atoms that represent a residue in the coarse-grained model.
///
/// Every other backbone site (amide N, amide H, carbonyl C′) is a virtual site rebuilt
/// from these each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParticleKind {
    /// The α-carbon.
    Alpha,
    /// The side-chain pseudo-atom. Absent for glycine.
    Beta,
    /// The carbonyl oxygen.
    Oxygen,
}

impl ParticleKind {
    pub const ALL: [ParticleKind; 3] = [Self::Alpha, Self::Beta, Self::Oxygen];

    pub fn atom_name(&self) -> &'static str {
        match self {
            ParticleKind::Alpha => "CA",
            ParticleKind::Beta => "CB",
            ParticleKind::Oxygen => "O",
        }
    }
}

impl fmt::Display for ParticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.atom_name())
    }
}

impl FromStr for ParticleKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CA" => Ok(ParticleKind::Alpha),
            "CB" => Ok(ParticleKind::Beta),
            "O" => Ok(ParticleKind::Oxygen),
            _ => Err(()),
        }
    }
}

/// Whether this process owns a particle or only holds a replicated copy of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ownership {
    /// The particle lives in this process's subdomain.
    #[default]
    Owned,
    /// A halo copy of a particle owned by another process.
    Ghost,
}

/// A single pseudo-atom as handed over by the host engine.
///
/// The sequence tag and chain tag are the host's 1-based identifiers: the sequence tag
/// is the global residue number across all chains, the chain tag indexes the chains of
/// the sequence file.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Which pseudo-atom of its residue this particle is.
    pub kind: ParticleKind,
    /// The 1-based global residue number.
    pub sequence_tag: isize,
    /// The 1-based chain number.
    pub chain_tag: isize,
    /// The wrapped position in Angstroms.
    pub position: Point3<f64>,
    /// Periodic image counters, one per box dimension.
    pub image: [i32; 3],
    /// Ownership of the particle on this process.
    pub ownership: Ownership,
}

impl Particle {
    pub fn new(
        kind: ParticleKind,
        sequence_tag: isize,
        chain_tag: isize,
        position: Point3<f64>,
    ) -> Self {
        Self {
            kind,
            sequence_tag,
            chain_tag,
            position,
            image: [0; 3],
            ownership: Ownership::Owned,
        }
    }

    pub fn with_image(mut self, image: [i32; 3]) -> Self {
        self.image = image;
        self
    }

    pub fn as_ghost(mut self) -> Self {
        self.ownership = Ownership::Ghost;
        self
    }

    #[inline]
    pub fn is_owned(&self) -> bool {
        self.ownership == Ownership::Owned
    }
}
