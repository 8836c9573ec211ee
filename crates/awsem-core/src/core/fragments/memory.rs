use crate::core::backbone::sites::Site;
use crate::core::io::gro::{GroError, GroFile, GroTemplate, TemplateResidue};
use crate::core::io::traits::StructureFile;
use crate::core::models::residue::AminoAcid;
use nalgebra::Vector3;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{path}:{line}: {message}")]
    Format {
        path: String,
        line: usize,
        message: String,
    },
    #[error("Memory {memory}: cannot read template '{path}': {source}")]
    Template {
        memory: usize,
        path: String,
        #[source]
        source: GroError,
    },
    #[error("Memory {memory}: target window {start}..{end} extends past the {residue_count} residues of the target")]
    TargetOutOfRange {
        memory: usize,
        start: usize,
        end: usize,
        residue_count: usize,
    },
    #[error("Memory {memory}: fragment window {start}..{end} extends past the {template_len} residues of '{path}'")]
    FragmentOutOfRange {
        memory: usize,
        path: String,
        start: usize,
        end: usize,
        template_len: usize,
    },
}

/// The four atom pairings a fragment memory constrains, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PairKind {
    AlphaAlpha,
    AlphaBeta,
    BetaAlpha,
    BetaBeta,
}

impl PairKind {
    pub const COUNT: usize = 4;
    pub const ALL: [PairKind; Self::COUNT] = [
        Self::AlphaAlpha,
        Self::AlphaBeta,
        Self::BetaAlpha,
        Self::BetaBeta,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The sites on residue `i` and on residue `j`.
    pub fn sites(self) -> (Site, Site) {
        match self {
            PairKind::AlphaAlpha => (Site::Alpha, Site::Alpha),
            PairKind::AlphaBeta => (Site::Alpha, Site::Beta),
            PairKind::BetaAlpha => (Site::Beta, Site::Alpha),
            PairKind::BetaBeta => (Site::Beta, Site::Beta),
        }
    }

    pub fn uses_beta_on_i(self) -> bool {
        matches!(self, PairKind::BetaAlpha | PairKind::BetaBeta)
    }

    pub fn uses_beta_on_j(self) -> bool {
        matches!(self, PairKind::AlphaBeta | PairKind::BetaBeta)
    }
}

/// One memory: a window of a template structure aligned to a window of the target.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentMemory {
    pub template_path: PathBuf,
    /// 0-based first target residue.
    pub target_start: usize,
    /// 0-based first template residue.
    pub fragment_start: usize,
    pub len: usize,
    pub weight: f64,
    template: Arc<GroTemplate>,
}

impl FragmentMemory {
    pub fn new(
        template_path: PathBuf,
        target_start: usize,
        fragment_start: usize,
        len: usize,
        weight: f64,
        template: Arc<GroTemplate>,
    ) -> Self {
        Self {
            template_path,
            target_start,
            fragment_start,
            len,
            weight,
            template,
        }
    }

    /// Exclusive end of the target window.
    #[inline]
    pub fn target_end(&self) -> usize {
        self.target_start + self.len
    }

    #[inline]
    fn template_index(&self, target: usize) -> Option<usize> {
        (self.target_start..self.target_end())
            .contains(&target)
            .then(|| self.fragment_start + target - self.target_start)
    }

    /// Residue type of the template residue aligned to `target`.
    pub fn template_type(&self, target: usize) -> Option<AminoAcid> {
        self.template_index(target)
            .and_then(|t| self.template.residues.get(t))
            .map(|r| r.residue_type)
    }

    /// Template distance between the atoms of `kind` aligned to target residues `i` and `j`.
    /// `None` when a Cβ is requested from a template residue that has none.
    pub fn reference_distance(&self, i: usize, j: usize, kind: PairKind) -> Option<f64> {
        let ri = self.template.residues.get(self.template_index(i)?)?;
        let rj = self.template.residues.get(self.template_index(j)?)?;
        let (si, sj) = kind.sites();
        let pick = |r: &TemplateResidue, site: Site| match site {
            Site::Beta => r.beta,
            _ => Some(r.alpha),
        };
        Some((pick(ri, si)? - pick(rj, sj)?).norm())
    }

    /// The template's Cα→Cβ vector at the residue aligned to `target`, if it has a Cβ.
    pub fn side_chain(&self, target: usize) -> Option<Vector3<f64>> {
        let r = self.template.residues.get(self.template_index(target)?)?;
        Some(r.beta? - r.alpha)
    }
}

/// All memories named by a memory library file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryLibrary {
    memories: Vec<FragmentMemory>,
}

impl MemoryLibrary {
    pub fn from_memories(memories: Vec<FragmentMemory>) -> Self {
        Self { memories }
    }

    /// Reads the library at `path`. Relative template paths are resolved against the
    /// directory of the library file; a template shared by several memories is read once.
    pub fn load(path: &Path, residue_count: usize) -> Result<Self, MemoryError> {
        let origin = path.to_string_lossy().to_string();
        let text = fs::read_to_string(path).map_err(|e| MemoryError::Io {
            path: origin.clone(),
            source: e,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut templates: HashMap<PathBuf, Arc<GroTemplate>> = HashMap::new();
        let mut memories = Vec::new();
        let mut in_memories = false;

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.starts_with('#') {
                continue;
            }
            if line.is_empty() {
                in_memories = false;
                continue;
            }
            if line.starts_with('[') {
                in_memories = line.starts_with("[Memories]");
                continue;
            }
            if !in_memories {
                continue;
            }

            let format_error = |message: String| MemoryError::Format {
                path: origin.clone(),
                line: line_no + 1,
                message,
            };
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [file, target, fragment, len, weight] = fields[..] else {
                return Err(format_error(format!(
                    "expected 5 fields, found {}",
                    fields.len()
                )));
            };
            let one_based = |value: &str, what: &str| -> Result<usize, MemoryError> {
                match value.parse::<usize>() {
                    Ok(v) if v >= 1 => Ok(v - 1),
                    _ => Err(format_error(format!("invalid {what} '{value}'"))),
                }
            };
            let target_start = one_based(target, "target start")?;
            let fragment_start = one_based(fragment, "fragment start")?;
            let len: usize = len
                .parse()
                .map_err(|_| format_error(format!("invalid length '{len}'")))?;
            let weight: f64 = weight
                .parse()
                .map_err(|_| format_error(format!("invalid weight '{weight}'")))?;

            let index = memories.len();
            let template_path = if Path::new(file).is_absolute() {
                PathBuf::from(file)
            } else {
                base.join(file)
            };
            let template = match templates.get(&template_path) {
                Some(t) => Arc::clone(t),
                None => {
                    let t = Arc::new(GroFile::read_from_path(&template_path).map_err(|e| {
                        MemoryError::Template {
                            memory: index,
                            path: template_path.to_string_lossy().to_string(),
                            source: e,
                        }
                    })?);
                    templates.insert(template_path.clone(), Arc::clone(&t));
                    t
                }
            };

            if target_start + len > residue_count {
                return Err(MemoryError::TargetOutOfRange {
                    memory: index,
                    start: target_start,
                    end: target_start + len,
                    residue_count,
                });
            }
            if fragment_start + len > template.len() {
                return Err(MemoryError::FragmentOutOfRange {
                    memory: index,
                    path: template_path.to_string_lossy().to_string(),
                    start: fragment_start,
                    end: fragment_start + len,
                    template_len: template.len(),
                });
            }

            memories.push(FragmentMemory::new(
                template_path,
                target_start,
                fragment_start,
                len,
                weight,
                template,
            ));
        }

        info!(
            memories = memories.len(),
            templates = templates.len(),
            "Fragment memories loaded"
        );
        Ok(Self { memories })
    }

    pub fn get(&self, index: usize) -> Option<&FragmentMemory> {
        self.memories.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FragmentMemory> {
        self.memories.iter()
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }
}
