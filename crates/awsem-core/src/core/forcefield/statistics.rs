use super::coefficients::SS_WEIGHT_BASINS;
use super::params::{ParamLoadError, read_tokens};
use crate::core::models::residue::{AminoAcid, RESIDUE_TYPE_COUNT};
use std::path::Path;

const N: usize = RESIDUE_TYPE_COUNT;

type PairBlocks = [[[f64; 2]; N]; N];

/// Sequence statistics of β-sheet hydrogen bonding, read from the five fixed-name files
/// `anti_HB`, `anti_NHB`, `para_HB`, `anti_one` and `para_one`.
///
/// The pair tables have two blocks; the second index of [`Self::anti_hb`] and friends
/// selects the block.
#[derive(Debug, Clone, PartialEq)]
pub struct HBondStatistics {
    anti_hb: PairBlocks,
    anti_nhb: PairBlocks,
    para_hb: PairBlocks,
    anti_one: [f64; N],
    para_one: [f64; N],
}

impl HBondStatistics {
    pub fn load(dir: &Path) -> Result<Self, ParamLoadError> {
        Ok(Self {
            anti_hb: read_pair_blocks(&dir.join("anti_HB"))?,
            anti_nhb: read_pair_blocks(&dir.join("anti_NHB"))?,
            para_hb: read_pair_blocks(&dir.join("para_HB"))?,
            anti_one: read_singles(&dir.join("anti_one"))?,
            para_one: read_singles(&dir.join("para_one"))?,
        })
    }

    /// Uniform statistics, used where the tables only need to exist.
    pub fn uniform(pair: f64, single: f64) -> Self {
        Self {
            anti_hb: [[[pair; 2]; N]; N],
            anti_nhb: [[[pair; 2]; N]; N],
            para_hb: [[[pair; 2]; N]; N],
            anti_one: [single; N],
            para_one: [single; N],
        }
    }

    #[inline]
    pub fn anti_hb(&self, a: AminoAcid, b: AminoAcid, block: usize) -> f64 {
        self.anti_hb[a.index()][b.index()][block]
    }

    #[inline]
    pub fn anti_nhb(&self, a: AminoAcid, b: AminoAcid, block: usize) -> f64 {
        self.anti_nhb[a.index()][b.index()][block]
    }

    #[inline]
    pub fn para_hb(&self, a: AminoAcid, b: AminoAcid, block: usize) -> f64 {
        self.para_hb[a.index()][b.index()][block]
    }

    #[inline]
    pub fn anti_one(&self, a: AminoAcid) -> f64 {
        self.anti_one[a.index()]
    }

    #[inline]
    pub fn para_one(&self, a: AminoAcid) -> f64 {
        self.para_one[a.index()]
    }
}

fn read_pair_blocks(path: &Path) -> Result<PairBlocks, ParamLoadError> {
    let mut tokens = read_tokens(path)?;
    let mut blocks = [[[0.0; 2]; N]; N];
    for block in 0..2 {
        for (i, row) in blocks.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                cell[block] = tokens.next_f64(&format!("block {block} [{i}][{j}]"))?;
            }
        }
    }
    Ok(blocks)
}

fn read_singles(path: &Path) -> Result<[f64; N], ParamLoadError> {
    let mut tokens = read_tokens(path)?;
    Ok(tokens.next_f64_array::<N>("value")?)
}

/// Per-residue secondary-structure propensities for the twelve Ramachandran basins.
/// Basins whose `[SSWeight]` flag is unset read as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SsWeights {
    rows: Vec<[f64; SS_WEIGHT_BASINS]>,
}

impl SsWeights {
    pub fn load(
        path: &Path,
        flags: &[bool; SS_WEIGHT_BASINS],
        residue_count: usize,
    ) -> Result<Self, ParamLoadError> {
        let mut tokens = read_tokens(path)?;
        let mut rows = vec![[0.0; SS_WEIGHT_BASINS]; residue_count];
        for (residue, row) in rows.iter_mut().enumerate() {
            for (basin, value) in row.iter_mut().enumerate() {
                if flags[basin] {
                    *value = tokens.next_f64(&format!("residue {residue} basin {basin}"))?;
                }
            }
        }
        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<[f64; SS_WEIGHT_BASINS]>) -> Self {
        Self { rows }
    }

    #[inline]
    pub fn get(&self, residue: usize, basin: usize) -> f64 {
        self.rows[residue][basin]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
