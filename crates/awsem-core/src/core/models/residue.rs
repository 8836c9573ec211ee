use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The twenty standard residue types, declared in the column order of the
/// gamma and burial parameter tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AminoAcid {
    Alanine,       // ALA, A
    Arginine,      // ARG, R
    Asparagine,    // ASN, N
    AsparticAcid,  // ASP, D
    Cysteine,      // CYS, C
    Glutamine,     // GLN, Q
    GlutamicAcid,  // GLU, E
    Glycine,       // GLY, G
    Histidine,     // HIS, H
    Isoleucine,    // ILE, I
    Leucine,       // LEU, L
    Lysine,        // LYS, K
    Methionine,    // MET, M
    Phenylalanine, // PHE, F
    Proline,       // PRO, P
    Serine,        // SER, S
    Threonine,     // THR, T
    Tryptophan,    // TRP, W
    Tyrosine,      // TYR, Y
    Valine,        // VAL, V
}

pub const RESIDUE_TYPE_COUNT: usize = 20;

static ONE_LETTER_CODES: Map<char, AminoAcid> = phf_map! {
    'A' => AminoAcid::Alanine,
    'R' => AminoAcid::Arginine,
    'N' => AminoAcid::Asparagine,
    'D' => AminoAcid::AsparticAcid,
    'C' => AminoAcid::Cysteine,
    'Q' => AminoAcid::Glutamine,
    'E' => AminoAcid::GlutamicAcid,
    'G' => AminoAcid::Glycine,
    'H' => AminoAcid::Histidine,
    'I' => AminoAcid::Isoleucine,
    'L' => AminoAcid::Leucine,
    'K' => AminoAcid::Lysine,
    'M' => AminoAcid::Methionine,
    'F' => AminoAcid::Phenylalanine,
    'P' => AminoAcid::Proline,
    'S' => AminoAcid::Serine,
    'T' => AminoAcid::Threonine,
    'W' => AminoAcid::Tryptophan,
    'Y' => AminoAcid::Tyrosine,
    'V' => AminoAcid::Valine,
};

// Structure files in the wild carry a few protonation-state aliases.
static THREE_LETTER_CODES: Map<&'static str, AminoAcid> = phf_map! {
    "ALA" => AminoAcid::Alanine,
    "ARG" => AminoAcid::Arginine,
    "ASN" => AminoAcid::Asparagine,
    "ASP" => AminoAcid::AsparticAcid,
    "CYS" => AminoAcid::Cysteine,
    "GLN" => AminoAcid::Glutamine,
    "GLU" => AminoAcid::GlutamicAcid,
    "GLY" => AminoAcid::Glycine,
    "HIS" => AminoAcid::Histidine,
    "HSE" => AminoAcid::Histidine,
    "HSD" => AminoAcid::Histidine,
    "HSP" => AminoAcid::Histidine,
    "ILE" => AminoAcid::Isoleucine,
    "LEU" => AminoAcid::Leucine,
    "LYS" => AminoAcid::Lysine,
    "MET" => AminoAcid::Methionine,
    "PHE" => AminoAcid::Phenylalanine,
    "PRO" => AminoAcid::Proline,
    "SER" => AminoAcid::Serine,
    "THR" => AminoAcid::Threonine,
    "TRP" => AminoAcid::Tryptophan,
    "TYR" => AminoAcid::Tyrosine,
    "VAL" => AminoAcid::Valine,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseAminoAcidError {
    #[error("Unknown one-letter residue code '{0}'")]
    UnknownLetter(char),
    #[error("Unknown residue name '{0}'")]
    UnknownName(String),
}

impl AminoAcid {
    pub const ALL: [AminoAcid; RESIDUE_TYPE_COUNT] = [
        Self::Alanine,
        Self::Arginine,
        Self::Asparagine,
        Self::AsparticAcid,
        Self::Cysteine,
        Self::Glutamine,
        Self::GlutamicAcid,
        Self::Glycine,
        Self::Histidine,
        Self::Isoleucine,
        Self::Leucine,
        Self::Lysine,
        Self::Methionine,
        Self::Phenylalanine,
        Self::Proline,
        Self::Serine,
        Self::Threonine,
        Self::Tryptophan,
        Self::Tyrosine,
        Self::Valine,
    ];

    /// Column index into the 20-wide parameter tables.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_letter(letter: char) -> Result<Self, ParseAminoAcidError> {
        ONE_LETTER_CODES
            .get(&letter.to_ascii_uppercase())
            .copied()
            .ok_or(ParseAminoAcidError::UnknownLetter(letter))
    }

    pub fn from_name(name: &str) -> Result<Self, ParseAminoAcidError> {
        let upper = name.trim().to_ascii_uppercase();
        THREE_LETTER_CODES
            .get(upper.as_str())
            .copied()
            .ok_or_else(|| ParseAminoAcidError::UnknownName(name.trim().to_string()))
    }

    pub fn letter(self) -> char {
        const LETTERS: [char; RESIDUE_TYPE_COUNT] = [
            'A', 'R', 'N', 'D', 'C', 'Q', 'E', 'G', 'H', 'I', 'L', 'K', 'M', 'F', 'P', 'S', 'T',
            'W', 'Y', 'V',
        ];
        LETTERS[self.index()]
    }

    pub fn name(self) -> &'static str {
        const NAMES: [&str; RESIDUE_TYPE_COUNT] = [
            "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE", "LEU", "LYS",
            "MET", "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL",
        ];
        NAMES[self.index()]
    }

    /// Glycine carries no side-chain pseudo-atom.
    #[inline]
    pub fn is_glycine(self) -> bool {
        self == AminoAcid::Glycine
    }

    #[inline]
    pub fn is_proline(self) -> bool {
        self == AminoAcid::Proline
    }
}

impl fmt::Display for AminoAcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AminoAcid {
    type Err = ParseAminoAcidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_letter(c),
            _ => Self::from_name(trimmed),
        }
    }
}
