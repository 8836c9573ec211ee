use super::map::FragmentMap;
use super::memory::{MemoryLibrary, PairKind};
use crate::core::forcefield::coefficients::TableGrid;
use crate::core::forcefield::gamma::FragmentGamma;
use crate::core::models::sequence::Sequence;
use itertools::Itertools;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument};

pub const ENERGY_FILE: &str = "fm_table.energy";
pub const FORCE_FILE: &str = "fm_table.force";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{path}: {message}")]
    Format { path: String, message: String },
    #[error("Distance {r} is outside the tabulated range [{rmin}, {rmax}]")]
    OutOfRange { r: f64, rmin: f64, rmax: f64 },
    #[error("Memory {memory}: partner residue {residue} lies past the end of the target")]
    MissingResidue { memory: usize, residue: usize },
}

/// Address of one tabulated curve: anchor residue, partner offset past the minimum
/// separation, and atom pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub residue: usize,
    pub offset: usize,
    pub kind: PairKind,
}

/// Energy and scalar force sampled on the table grid.
///
/// The force column already carries the `1/r` factor, so multiplying it by the pair vector
/// `x_i - x_j` gives the force on `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub energy: Vec<f64>,
    pub force: Vec<f64>,
}

impl Curve {
    fn zeros(size: usize) -> Self {
        Self {
            energy: vec![0.0; size],
            force: vec![0.0; size],
        }
    }
}

/// Precomputed fragment-memory curves for every (residue, offset, kind) cell.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentTable {
    grid: TableGrid,
    residue_count: usize,
    min_sep: usize,
    neighbors: usize,
    cells: HashMap<CellKey, Curve>,
}

/// Number of partner offsets tabulated per residue.
pub fn neighbor_count(residue_count: usize, min_sep: usize, max_sep: Option<usize>) -> usize {
    match max_sep {
        Some(max) => (max + 1).saturating_sub(min_sep),
        None => residue_count.saturating_sub(min_sep),
    }
}

impl FragmentTable {
    fn empty(grid: TableGrid, residue_count: usize, gamma: &FragmentGamma) -> Self {
        Self {
            grid,
            residue_count,
            min_sep: gamma.min_sep(),
            neighbors: neighbor_count(residue_count, gamma.min_sep(), gamma.max_sep()),
            cells: HashMap::new(),
        }
    }

    /// Sums the Gaussian well of every mapped memory onto the grid.
    ///
    /// `strength` is the fully scaled `epsilon * k_frag_mem`; each memory adds its weight
    /// times the gamma of the pair's separation class.
    #[instrument(skip_all, name = "fm_table_build")]
    pub fn build(
        grid: TableGrid,
        sequence: &Sequence,
        library: &MemoryLibrary,
        map: &FragmentMap,
        gamma: &FragmentGamma,
        strength: f64,
        sigma_exp: f64,
    ) -> Result<Self, TableError> {
        let n = sequence.len();
        let mut table = Self::empty(grid, n, gamma);
        let size = grid.size();
        let well_width_sq = grid.well_width * grid.well_width;

        for i in 0..n {
            let type_i = sequence.residues()[i];
            for &m in map.memories_at(i) {
                let Some(memory) = library.get(m) else {
                    continue;
                };
                let js = i + table.min_sep;
                let mut je = memory.target_end() - 1;
                if let Some(max) = gamma.max_sep() {
                    je = je.min(i + max);
                }
                if je >= n {
                    return Err(TableError::MissingResidue {
                        memory: m,
                        residue: je,
                    });
                }

                let glycine_i = type_i.is_glycine()
                    || memory.template_type(i).is_some_and(|t| t.is_glycine());

                for j in js..=je {
                    let type_j = sequence.residues()[j];
                    let separation = j - i;
                    let sigma_sq = (separation as f64).powf(2.0 * sigma_exp) * well_width_sq;
                    let depth =
                        strength * memory.weight * gamma.gamma(separation, type_i, type_j);

                    let glycine_j = type_j.is_glycine()
                        || memory.template_type(j).is_some_and(|t| t.is_glycine());

                    for kind in PairKind::ALL {
                        if (kind.uses_beta_on_i() && glycine_i)
                            || (kind.uses_beta_on_j() && glycine_j)
                        {
                            continue;
                        }
                        let Some(rf) = memory.reference_distance(i, j, kind) else {
                            continue;
                        };
                        let key = CellKey {
                            residue: i,
                            offset: j - js,
                            kind,
                        };
                        let curve = table
                            .cells
                            .entry(key)
                            .or_insert_with(|| Curve::zeros(size));
                        for k in 0..size {
                            let r = grid.node(k);
                            let dr = r - rf;
                            let v = -depth * (-dr * dr / (2.0 * sigma_sq)).exp();
                            curve.energy[k] += v;
                            curve.force[k] += v * dr / (sigma_sq * r);
                        }
                    }
                }
            }
        }

        for curve in table.cells.values_mut() {
            for v in curve.energy.iter_mut().chain(curve.force.iter_mut()) {
                if !v.is_finite() {
                    *v = 0.0;
                }
            }
        }

        info!(cells = table.cells.len(), nodes = size, "Fragment-memory table built");
        Ok(table)
    }

    pub fn grid(&self) -> &TableGrid {
        &self.grid
    }

    pub fn min_sep(&self) -> usize {
        self.min_sep
    }

    pub fn neighbors(&self) -> usize {
        self.neighbors
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn curve(&self, key: &CellKey) -> Option<&Curve> {
        self.cells.get(key)
    }

    /// Linear interpolation of `(energy, force)` at distance `r`. An absent cell yields `None`.
    pub fn query(&self, key: &CellKey, r: f64) -> Result<Option<(f64, f64)>, TableError> {
        let g = &self.grid;
        if !(g.rmin..=g.rmax).contains(&r) {
            return Err(TableError::OutOfRange {
                r,
                rmin: g.rmin,
                rmax: g.rmax,
            });
        }
        let Some(curve) = self.cells.get(key) else {
            return Ok(None);
        };
        let size = curve.energy.len();
        let mut k = (((r - g.rmin) / g.dr).floor() as usize).min(size - 2);
        if k + 2 < size && g.node(k + 1) <= r {
            k += 1;
        }
        let t = (r - g.node(k)) / g.dr;
        let lerp = |v: &[f64]| v[k] + (v[k + 1] - v[k]) * t;
        Ok(Some((lerp(&curve.energy), lerp(&curve.force))))
    }

    fn row_index(&self, key: &CellKey) -> usize {
        PairKind::COUNT * self.neighbors * key.residue
            + PairKind::COUNT * key.offset
            + key.kind.index()
    }

    fn row_count(&self) -> usize {
        PairKind::COUNT * self.residue_count * self.neighbors
    }

    fn key_at(&self, row: usize) -> CellKey {
        let per_residue = PairKind::COUNT * self.neighbors;
        CellKey {
            residue: row / per_residue,
            offset: (row % per_residue) / PairKind::COUNT,
            kind: PairKind::ALL[row % PairKind::COUNT],
        }
    }

    /// Writes `fm_table.energy` and `fm_table.force` into `dir`, one row per cell.
    #[instrument(skip_all, name = "fm_table_save")]
    pub fn save(&self, dir: &Path) -> Result<(), TableError> {
        let size = self.grid.size();
        let mut rows: Vec<Option<&Curve>> = vec![None; self.row_count()];
        for (key, curve) in &self.cells {
            let index = self.row_index(key);
            if let Some(slot) = rows.get_mut(index) {
                *slot = Some(curve);
            }
        }
        let zeros = vec![0.0; size];

        for (name, column) in [(ENERGY_FILE, true), (FORCE_FILE, false)] {
            let path = dir.join(name);
            let io_error = |e: std::io::Error| TableError::Io {
                path: path.to_string_lossy().to_string(),
                source: e,
            };
            let file = File::create(&path).map_err(io_error)?;
            let mut writer = BufWriter::new(file);
            for row in &rows {
                let values = match row {
                    Some(curve) if column => &curve.energy,
                    Some(curve) => &curve.force,
                    None => &zeros,
                };
                let line = values
                    .iter()
                    .map(|v| if v.is_finite() { *v } else { 0.0 })
                    .join(" ");
                writeln!(writer, "{line}").map_err(io_error)?;
            }
            writer.flush().map_err(io_error)?;
        }
        info!(dir = %dir.display(), rows = rows.len(), "Fragment-memory table saved");
        Ok(())
    }

    /// Reads a table written by [`FragmentTable::save`]. A row with any non-zero value in
    /// either file becomes a present cell.
    #[instrument(skip_all, name = "fm_table_load")]
    pub fn load(
        dir: &Path,
        grid: TableGrid,
        residue_count: usize,
        gamma: &FragmentGamma,
    ) -> Result<Self, TableError> {
        let mut table = Self::empty(grid, residue_count, gamma);
        let energy = read_rows(&dir.join(ENERGY_FILE), table.row_count(), grid.size())?;
        let force = read_rows(&dir.join(FORCE_FILE), table.row_count(), grid.size())?;

        for (row, (e, f)) in energy.into_iter().zip(force).enumerate() {
            if e.iter().chain(&f).any(|v| *v != 0.0) {
                table.cells.insert(table.key_at(row), Curve { energy: e, force: f });
            }
        }
        info!(cells = table.cells.len(), "Fragment-memory table loaded");
        Ok(table)
    }

    /// Whether both table files exist in `dir`.
    pub fn files_exist(dir: &Path) -> bool {
        dir.join(ENERGY_FILE).is_file() && dir.join(FORCE_FILE).is_file()
    }
}

fn read_rows(path: &Path, rows: usize, size: usize) -> Result<Vec<Vec<f64>>, TableError> {
    let origin = path.to_string_lossy().to_string();
    let text = fs::read_to_string(path).map_err(|e| TableError::Io {
        path: origin.clone(),
        source: e,
    })?;
    let format_error = |message: String| TableError::Format {
        path: origin.clone(),
        message,
    };

    let parsed = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(row, line)| {
            let values = line
                .split_whitespace()
                .map(|token| {
                    token.parse::<f64>().map_err(|_| {
                        format_error(format!("row {}: invalid value '{token}'", row + 1))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if values.len() != size {
                return Err(format_error(format!(
                    "row {} has {} values, expected {size}",
                    row + 1,
                    values.len()
                )));
            }
            Ok(values)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if parsed.len() != rows {
        return Err(format_error(format!(
            "found {} rows, expected {rows}",
            parsed.len()
        )));
    }
    Ok(parsed)
}
