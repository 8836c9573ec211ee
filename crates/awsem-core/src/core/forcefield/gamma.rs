use super::params::{ParamLoadError, read_tokens};
use crate::core::models::residue::{AminoAcid, RESIDUE_TYPE_COUNT};
use serde::Deserialize;
use std::path::Path;

const N: usize = RESIDUE_TYPE_COUNT;

/// Contact gammas `(direct, mediated)` per well and residue-type pair, already scaled by
/// `k_water`.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterGamma {
    wells: Vec<[[(f64, f64); N]; N]>,
}

impl WaterGamma {
    pub fn load(path: &Path, n_wells: usize, k_water: f64) -> Result<Self, ParamLoadError> {
        let mut tokens = read_tokens(path)?;
        let mut wells = vec![[[(0.0, 0.0); N]; N]; n_wells];
        for (w, table) in wells.iter_mut().enumerate() {
            for i in 0..N {
                for j in i..N {
                    let what = format!("well {w} gamma[{i}][{j}]");
                    let direct = tokens.next_f64(&what)? * k_water;
                    let mediated = tokens.next_f64(&what)? * k_water;
                    table[i][j] = (direct, mediated);
                    table[j][i] = (direct, mediated);
                }
            }
        }
        Ok(Self { wells })
    }

    pub fn from_wells(wells: Vec<[[(f64, f64); N]; N]>) -> Self {
        Self { wells }
    }

    #[inline]
    pub fn get(&self, well: usize, a: AminoAcid, b: AminoAcid) -> (f64, f64) {
        self.wells[well][a.index()][b.index()]
    }

    pub fn well_count(&self) -> usize {
        self.wells.len()
    }
}

/// Burial gammas, three density wells per residue type.
#[derive(Debug, Clone, PartialEq)]
pub struct BurialGamma {
    values: [[f64; 3]; N],
}

impl BurialGamma {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let mut tokens = read_tokens(path)?;
        let mut values = [[0.0; 3]; N];
        for (i, row) in values.iter_mut().enumerate() {
            *row = tokens.next_f64_array::<3>(&format!("burial_gamma[{i}]"))?;
        }
        Ok(Self { values })
    }

    pub fn from_values(values: [[f64; 3]; N]) -> Self {
        Self { values }
    }

    #[inline]
    pub fn get(&self, residue: AminoAcid, well: usize) -> f64 {
        self.values[residue.index()][well]
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FragmentGammaFile {
    classes: Vec<SeparationClass>,
    #[serde(default)]
    gammas: Vec<GammaEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeparationClass {
    pub min: usize,
    pub max: Option<usize>,
}

impl SeparationClass {
    fn contains(&self, separation: usize) -> bool {
        separation >= self.min && self.max.is_none_or(|max| separation <= max)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GammaEntry {
    class: usize,
    i: String,
    j: String,
    gamma: f64,
}

/// Fragment-memory gammas per sequence-separation class and residue-type pair.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentGamma {
    classes: Vec<SeparationClass>,
    values: Vec<[[f64; N]; N]>,
}

impl FragmentGamma {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let origin = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: origin.clone(),
            source: e,
        })?;
        Self::parse(&origin, &content)
    }

    pub fn parse(origin: &str, content: &str) -> Result<Self, ParamLoadError> {
        let file: FragmentGammaFile =
            toml::from_str(content).map_err(|e| ParamLoadError::Toml {
                path: origin.to_string(),
                source: e,
            })?;
        Self::from_file(file, origin)
    }

    fn from_file(file: FragmentGammaFile, origin: &str) -> Result<Self, ParamLoadError> {
        let invalid = |what: &str, message: String| ParamLoadError::Invalid {
            origin: origin.to_string(),
            what: what.to_string(),
            message,
        };

        if file.classes.is_empty() {
            return Err(invalid("classes", "at least one class is required".into()));
        }
        for (k, class) in file.classes.iter().enumerate() {
            let last = k + 1 == file.classes.len();
            match class.max {
                None if !last => {
                    return Err(invalid(
                        "classes",
                        format!("class {k} is unbounded but is not the last class"),
                    ));
                }
                Some(max) if max < class.min => {
                    return Err(invalid(
                        "classes",
                        format!("class {k} has max {max} below min {}", class.min),
                    ));
                }
                Some(max) if !last && file.classes[k + 1].min != max + 1 => {
                    return Err(invalid(
                        "classes",
                        format!(
                            "class {} starts at {} but class {k} ends at {max}",
                            k + 1,
                            file.classes[k + 1].min
                        ),
                    ));
                }
                _ => {}
            }
        }

        let mut values = vec![[[1.0; N]; N]; file.classes.len()];
        for (e, entry) in file.gammas.iter().enumerate() {
            let what = format!("gammas[{e}]");
            let table = values.get_mut(entry.class).ok_or_else(|| {
                invalid(&what, format!("class {} is not defined", entry.class))
            })?;
            let rows = residue_selector(&entry.i).map_err(|m| invalid(&what, m))?;
            let cols = residue_selector(&entry.j).map_err(|m| invalid(&what, m))?;
            for &i in &rows {
                for &j in &cols {
                    table[i][j] = entry.gamma;
                }
            }
        }

        Ok(Self {
            classes: file.classes,
            values,
        })
    }

    /// Smallest sequence separation that any class covers.
    pub fn min_sep(&self) -> usize {
        self.classes[0].min
    }

    /// Largest covered separation, or `None` when the last class is unbounded.
    pub fn max_sep(&self) -> Option<usize> {
        self.classes[self.classes.len() - 1].max
    }

    /// Gamma for target residues `i` and `j` with the given types; zero outside every class.
    pub fn gamma(&self, separation: usize, a: AminoAcid, b: AminoAcid) -> f64 {
        self.classes
            .iter()
            .position(|c| c.contains(separation))
            .map_or(0.0, |k| self.values[k][a.index()][b.index()])
    }
}

fn residue_selector(token: &str) -> Result<Vec<usize>, String> {
    if token == "*" {
        return Ok((0..N).collect());
    }
    token
        .parse::<AminoAcid>()
        .map(|aa| vec![aa.index()])
        .map_err(|e| e.to_string())
}
