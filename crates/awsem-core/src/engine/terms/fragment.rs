//! Fragment-memory bias: Gaussian wells on Cα/Cβ distances centered on the distances seen
//! in aligned template fragments.
//!
//! The direct backend sums the wells of every mapped memory each step; the table backend
//! interpolates the same sums from a [`FragmentTable`] built or loaded once.

use super::{PotentialTerm, Scope, Target, central_force};
use crate::core::forcefield::coefficients::{FragmentBackend, FragmentMemoryParams, TableGrid};
use crate::core::forcefield::gamma::FragmentGamma;
use crate::core::forcefield::potentials::gaussian;
use crate::core::forcefield::term::TermKind;
use crate::core::fragments::map::FragmentMap;
use crate::core::fragments::memory::{MemoryLibrary, PairKind};
use crate::core::fragments::table::{CellKey, FragmentTable};
use crate::core::models::sequence::Sequence;
use crate::engine::accumulator::Accumulator;
use crate::engine::context::StepContext;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// A memory library together with the windows each target residue falls in.
#[derive(Debug, Clone)]
pub struct MemoryWindows {
    pub library: Arc<MemoryLibrary>,
    pub map: FragmentMap,
}

/// Where the wells come from.
#[derive(Debug, Clone)]
pub enum FragmentSource {
    Direct(MemoryWindows),
    /// A tabulated sum. The windows are kept alongside only when another term reads the
    /// templates directly.
    Table {
        table: Arc<FragmentTable>,
        windows: Option<MemoryWindows>,
    },
}

impl FragmentSource {
    pub fn direct(library: MemoryLibrary, map: FragmentMap) -> Self {
        Self::Direct(MemoryWindows {
            library: Arc::new(library),
            map,
        })
    }

    pub fn table(table: FragmentTable) -> Self {
        Self::Table {
            table: Arc::new(table),
            windows: None,
        }
    }

    pub fn with_windows(self, library: MemoryLibrary, map: FragmentMap) -> Self {
        match self {
            Self::Direct(_) => Self::direct(library, map),
            Self::Table { table, .. } => Self::Table {
                table,
                windows: Some(MemoryWindows {
                    library: Arc::new(library),
                    map,
                }),
            },
        }
    }

    pub fn windows(&self) -> Option<&MemoryWindows> {
        match self {
            Self::Direct(windows) => Some(windows),
            Self::Table { windows, .. } => windows.as_ref(),
        }
    }
}

fn load_library(
    params: &FragmentMemoryParams,
    gamma: &FragmentGamma,
    sequence: &Sequence,
    reporter: &ProgressReporter,
) -> Result<(MemoryLibrary, FragmentMap), EngineError> {
    reporter.phase("Loading fragment memories", || {
        let library = MemoryLibrary::load(&params.memory_file, sequence.len())?;
        let map = FragmentMap::build(&library, sequence.len(), gamma.min_sep())?;
        Ok((library, map))
    })
}

fn tabulate(
    params: &FragmentMemoryParams,
    grid: TableGrid,
    gamma: &FragmentGamma,
    sequence: &Sequence,
    library: &MemoryLibrary,
    map: &FragmentMap,
    reporter: &ProgressReporter,
) -> Result<FragmentTable, EngineError> {
    reporter.phase("Building fragment-memory table", || {
        Ok(FragmentTable::build(
            grid,
            sequence,
            library,
            map,
            gamma,
            params.k,
            params.sigma_exp,
        )?)
    })
}

/// Reads the memory library and tabulates it on `grid`.
pub fn build_table(
    params: &FragmentMemoryParams,
    grid: TableGrid,
    gamma: &FragmentGamma,
    sequence: &Sequence,
    reporter: &ProgressReporter,
) -> Result<FragmentTable, EngineError> {
    let (library, map) = load_library(params, gamma, sequence, reporter)?;
    tabulate(params, grid, gamma, sequence, &library, &map, reporter)
}

/// Sets up the configured backend.
///
/// The table backend loads `fm_table.energy`/`fm_table.force` from `table_dir` when the
/// table flag is set and both files exist. Otherwise it builds the table, and saves it
/// when the flag is set. With `keep_memories` the library and its windows are attached to
/// a table source as well.
pub fn prepare(
    params: &FragmentMemoryParams,
    gamma: &FragmentGamma,
    sequence: &Sequence,
    table_dir: &Path,
    keep_memories: bool,
    reporter: &ProgressReporter,
) -> Result<FragmentSource, EngineError> {
    let grid = match params.backend {
        FragmentBackend::Direct => {
            let (library, map) = load_library(params, gamma, sequence, reporter)?;
            return Ok(FragmentSource::direct(library, map));
        }
        FragmentBackend::Table(grid) => grid,
    };

    let files_exist = FragmentTable::files_exist(table_dir);
    if grid.use_table_file && files_exist {
        let table = reporter.phase("Loading fragment-memory table", || {
            FragmentTable::load(table_dir, grid, sequence.len(), gamma)
        })?;
        let source = FragmentSource::table(table);
        if keep_memories {
            let (library, map) = load_library(params, gamma, sequence, reporter)?;
            return Ok(source.with_windows(library, map));
        }
        return Ok(source);
    }
    if files_exist {
        warn!(
            dir = %table_dir.display(),
            "Fragment-memory table files exist but fm_use_table_flag is off; rebuilding"
        );
    }

    let (library, map) = load_library(params, gamma, sequence, reporter)?;
    let table = tabulate(params, grid, gamma, sequence, &library, &map, reporter)?;
    if grid.use_table_file {
        table.save(table_dir)?;
        info!(dir = %table_dir.display(), "Fragment-memory table cached for later runs");
    }
    let source = FragmentSource::table(table);
    Ok(if keep_memories {
        source.with_windows(library, map)
    } else {
        source
    })
}

pub struct FragmentMemoryTerm {
    strength: f64,
    sigma_exp: f64,
    gamma: FragmentGamma,
    source: FragmentSource,
}

impl FragmentMemoryTerm {
    pub(super) fn new(
        params: &FragmentMemoryParams,
        gamma: FragmentGamma,
        source: FragmentSource,
    ) -> Self {
        Self {
            strength: params.k,
            sigma_exp: params.sigma_exp,
            gamma,
            source,
        }
    }

    fn direct(
        &self,
        ctx: &StepContext,
        library: &MemoryLibrary,
        map: &FragmentMap,
        i: usize,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        let seq = ctx.sequence;
        let type_i = ctx.residue_type(i);
        let min_sep = self.gamma.min_sep();

        for &m in map.memories_at(i) {
            let Some(memory) = library.get(m) else {
                continue;
            };
            let mut je = memory.target_end() - 1;
            if let Some(max) = self.gamma.max_sep() {
                je = je.min(i + max);
            }
            let glycine_i =
                type_i.is_glycine() || memory.template_type(i).is_some_and(|t| t.is_glycine());

            for j in i + min_sep..=je {
                if !seq.same_chain(i, j) {
                    return Err(EngineError::CrossChain {
                        i,
                        j,
                        term: TermKind::FragmentMemory,
                    });
                }
                let type_j = ctx.residue_type(j);
                let separation = j - i;
                let sigma_sq = (separation as f64).powf(2.0 * self.sigma_exp);
                let depth =
                    self.strength * memory.weight * self.gamma.gamma(separation, type_i, type_j);
                let glycine_j = type_j.is_glycine()
                    || memory.template_type(j).is_some_and(|t| t.is_glycine());

                for kind in PairKind::ALL {
                    if (kind.uses_beta_on_i() && glycine_i) || (kind.uses_beta_on_j() && glycine_j)
                    {
                        continue;
                    }
                    let Some(rf) = memory.reference_distance(i, j, kind) else {
                        continue;
                    };
                    let (si, sj) = kind.sites();
                    let dx = ctx.site(i, si, TermKind::FragmentMemory)?
                        - ctx.site(j, sj, TermKind::FragmentMemory)?;
                    let r = dx.norm();
                    let dr = r - rf;
                    let v = -depth * gaussian(dr, sigma_sq);
                    acc.add_energy(TermKind::FragmentMemory, v);
                    central_force(acc, (i, si), (j, sj), dx, v * dr / (sigma_sq * r));
                }
            }
        }
        Ok(())
    }

    fn tabulated(
        &self,
        ctx: &StepContext,
        table: &FragmentTable,
        i: usize,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        let Some(end) = ctx.sequence.chain_end(i) else {
            return Ok(());
        };
        let glycine_i = ctx.residue_type(i).is_glycine();
        for offset in 0..table.neighbors() {
            let j = i + table.min_sep() + offset;
            if j >= end {
                break;
            }
            let glycine_j = ctx.residue_type(j).is_glycine();
            for kind in PairKind::ALL {
                if (kind.uses_beta_on_i() && glycine_i) || (kind.uses_beta_on_j() && glycine_j) {
                    continue;
                }
                let key = CellKey {
                    residue: i,
                    offset,
                    kind,
                };
                if table.curve(&key).is_none() {
                    continue;
                }
                let (si, sj) = kind.sites();
                let dx = ctx.site(i, si, TermKind::FragmentMemory)?
                    - ctx.site(j, sj, TermKind::FragmentMemory)?;
                if let Some((energy, force)) = table.query(&key, dx.norm())? {
                    acc.add_energy(TermKind::FragmentMemory, energy);
                    central_force(acc, (i, si), (j, sj), dx, force);
                }
            }
        }
        Ok(())
    }
}

impl PotentialTerm for FragmentMemoryTerm {
    fn kind(&self) -> TermKind {
        TermKind::FragmentMemory
    }

    fn scope(&self) -> Scope {
        Scope::PerResidue
    }

    fn is_admissible(&self, _ctx: &StepContext, target: Target) -> Result<bool, EngineError> {
        let Target::Residue(i) = target else {
            return Ok(false);
        };
        Ok(match &self.source {
            FragmentSource::Direct(windows) => !windows.map.memories_at(i).is_empty(),
            FragmentSource::Table { .. } => true,
        })
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
        match &self.source {
            FragmentSource::Direct(windows) => {
                self.direct(ctx, &windows.library, &windows.map, i, acc)
            }
            FragmentSource::Table { table, .. } => self.tabulated(ctx, table, i, acc),
        }
    }
}
