use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Index, IndexMut};

/// The named energy terms, in the order used for the energy vector and the energy log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TermKind {
    Chain,
    Shake,
    Chi,
    Rama,
    Excluded,
    Dssp,
    PAp,
    Water,
    Burial,
    Helix,
    AmhGo,
    FragmentMemory,
    VectorFragmentMemory,
    ContactRestraints,
    SolventBarrier,
}

impl TermKind {
    pub const COUNT: usize = 15;

    pub const ALL: [TermKind; Self::COUNT] = [
        Self::Chain,
        Self::Shake,
        Self::Chi,
        Self::Rama,
        Self::Excluded,
        Self::Dssp,
        Self::PAp,
        Self::Water,
        Self::Burial,
        Self::Helix,
        Self::AmhGo,
        Self::FragmentMemory,
        Self::VectorFragmentMemory,
        Self::ContactRestraints,
        Self::SolventBarrier,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The column label used in the energy log.
    pub fn label(self) -> &'static str {
        match self {
            TermKind::Chain => "Chain",
            TermKind::Shake => "Shake",
            TermKind::Chi => "Chi",
            TermKind::Rama => "Rama",
            TermKind::Excluded => "Excluded",
            TermKind::Dssp => "DSSP",
            TermKind::PAp => "P_AP",
            TermKind::Water => "Water",
            TermKind::Burial => "Burial",
            TermKind::Helix => "Helix",
            TermKind::AmhGo => "AMH-Go",
            TermKind::FragmentMemory => "Frag_Mem",
            TermKind::VectorFragmentMemory => "Vec_FM",
            TermKind::ContactRestraints => "Contact_Restraints",
            TermKind::SolventBarrier => "SSB",
        }
    }
}

impl fmt::Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A decomposed energy: one slot per [`TermKind`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnergyVector {
    values: [f64; TermKind::COUNT],
}

impl EnergyVector {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn accumulate(&mut self, kind: TermKind, value: f64) {
        self.values[kind.index()] += value;
    }

    #[inline]
    pub fn get(&self, kind: TermKind) -> f64 {
        self.values[kind.index()]
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Raw access for the cross-process reduction.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (TermKind, f64)> + '_ {
        TermKind::ALL.iter().map(|&kind| (kind, self.get(kind)))
    }
}

impl Index<TermKind> for EnergyVector {
    type Output = f64;

    fn index(&self, kind: TermKind) -> &Self::Output {
        &self.values[kind.index()]
    }
}

impl IndexMut<TermKind> for EnergyVector {
    fn index_mut(&mut self, kind: TermKind) -> &mut Self::Output {
        &mut self.values[kind.index()]
    }
}

impl Add for EnergyVector {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for EnergyVector {
    fn add_assign(&mut self, rhs: Self) {
        for (lhs, rhs) in self.values.iter_mut().zip(rhs.values) {
            *lhs += rhs;
        }
    }
}

impl Sum for EnergyVector {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, e| acc + e)
    }
}
