//! Native-structure tables of the AMH-Go term: the reference Cα/Cβ distances, the contact
//! gammas, the optional list of censored residue pairs, and the normalization constant
//! `a = 1/(8N) Σ_atoms |Σ_native contacts γ|^p`.

use super::coefficients::{AmhGoParams, GoCensoring};
use super::gamma::FragmentGamma;
use super::params::{ParamLoadError, read_tokens};
use crate::core::backbone::sites::Site;
use crate::core::io::gro::{GroFile, GroTemplate};
use crate::core::io::traits::StructureFile;
use crate::core::models::sequence::Sequence;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

pub const GO_GAMMA_FILE: &str = "amh-go.gamma";
pub const GO_NATIVE_FILE: &str = "amh-go.gro";
pub const GO_CENSORED_FILE: &str = "frustration_censored_contacts.dat";
pub const GO_NATIVE_ALPHA_ALPHA_FILE: &str = "go_rnativeCACA.dat";
pub const GO_NATIVE_BETA_BETA_FILE: &str = "go_rnativeCBCB.dat";
pub const GO_NATIVE_ALPHA_BETA_FILE: &str = "go_rnativeCACB.dat";

/// The sites a Go contact can involve.
pub fn contact_sites(glycine: bool) -> &'static [Site] {
    if glycine {
        &[Site::Alpha]
    } else {
        &[Site::Alpha, Site::Beta]
    }
}

/// Native Cα/Cβ distances between every pair of residues, row-major `n × n`.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeDistances {
    n: usize,
    alpha_alpha: Vec<f64>,
    beta_beta: Vec<f64>,
    /// Row residue contributes its Cα, column residue its Cβ.
    alpha_beta: Vec<f64>,
}

impl NativeDistances {
    /// Measures the distances on a reference structure. A residue without a Cβ record
    /// stands in with its Cα.
    pub fn from_template(template: &GroTemplate) -> Self {
        let n = template.len();
        let beta = |k: usize| {
            let r = &template.residues[k];
            r.beta.unwrap_or(r.alpha)
        };
        let mut distances = Self {
            n,
            alpha_alpha: vec![0.0; n * n],
            beta_beta: vec![0.0; n * n],
            alpha_beta: vec![0.0; n * n],
        };
        for i in 0..n {
            for j in 0..n {
                let (ai, aj) = (template.residues[i].alpha, template.residues[j].alpha);
                distances.alpha_alpha[i * n + j] = (ai - aj).norm();
                distances.beta_beta[i * n + j] = (beta(i) - beta(j)).norm();
                distances.alpha_beta[i * n + j] = (ai - beta(j)).norm();
            }
        }
        distances
    }

    /// Reads the three whitespace-separated `n × n` matrices from `dir`.
    pub fn load_matrices(dir: &Path, n: usize) -> Result<Self, ParamLoadError> {
        let read = |name: &str| -> Result<Vec<f64>, ParamLoadError> {
            let mut tokens = read_tokens(&dir.join(name))?;
            let mut values = Vec::with_capacity(n * n);
            for i in 0..n {
                for j in 0..n {
                    values.push(tokens.next_f64(&format!("r_native[{i}][{j}]"))?);
                }
            }
            Ok(values)
        };
        Ok(Self {
            n,
            alpha_alpha: read(GO_NATIVE_ALPHA_ALPHA_FILE)?,
            beta_beta: read(GO_NATIVE_BETA_BETA_FILE)?,
            alpha_beta: read(GO_NATIVE_ALPHA_BETA_FILE)?,
        })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// The native distance between site `a` of residue `i` and site `b` of residue `j`.
    /// Sites other than Cα and Cβ are never in contact.
    pub fn get(&self, i: usize, a: Site, j: usize, b: Site) -> f64 {
        let n = self.n;
        match (a, b) {
            (Site::Alpha, Site::Alpha) => self.alpha_alpha[i * n + j],
            (Site::Beta, Site::Beta) => self.beta_beta[i * n + j],
            (Site::Alpha, Site::Beta) => self.alpha_beta[i * n + j],
            (Site::Beta, Site::Alpha) => self.alpha_beta[j * n + i],
            _ => f64::INFINITY,
        }
    }
}

/// Everything the AMH-Go term needs besides the coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GoModel {
    gamma: FragmentGamma,
    native: NativeDistances,
    /// Residue pairs `(i, j)` with `i < j` whose contacts are dropped.
    censored: HashSet<(usize, usize)>,
    norm: f64,
}

impl GoModel {
    pub fn new(
        params: &AmhGoParams,
        gamma: FragmentGamma,
        native: NativeDistances,
        censored: HashSet<(usize, usize)>,
        sequence: &Sequence,
    ) -> Result<Self, ParamLoadError> {
        if native.len() != sequence.len() {
            return Err(ParamLoadError::Inconsistent(format!(
                "AMH-Go native structure has {} residues but the sequence has {}",
                native.len(),
                sequence.len()
            )));
        }
        let norm = normalization(params, &gamma, &native, sequence);
        if !norm.is_finite() || norm <= 0.0 {
            return Err(ParamLoadError::Inconsistent(format!(
                "AMH-Go native structure has no contact below rc = {}",
                params.rc
            )));
        }
        Ok(Self {
            gamma,
            native,
            censored,
            norm,
        })
    }

    /// Loads the gamma file, the native structure or distance matrices, and the censored
    /// pairs from `dir` according to the censoring mode.
    pub fn load(
        params: &AmhGoParams,
        dir: &Path,
        sequence: &Sequence,
    ) -> Result<Self, ParamLoadError> {
        let gamma = FragmentGamma::load(&dir.join(GO_GAMMA_FILE))?;
        let native = match params.censoring {
            GoCensoring::NativeDistances => NativeDistances::load_matrices(dir, sequence.len())?,
            GoCensoring::Off | GoCensoring::CensoredContacts => {
                let path = dir.join(GO_NATIVE_FILE);
                let template =
                    GroFile::read_from_path(&path).map_err(|source| ParamLoadError::Structure {
                        path: path.to_string_lossy().to_string(),
                        source,
                    })?;
                NativeDistances::from_template(&template)
            }
        };
        let censored = match params.censoring {
            GoCensoring::CensoredContacts => {
                read_censored_pairs(&dir.join(GO_CENSORED_FILE), sequence.len())?
            }
            GoCensoring::Off | GoCensoring::NativeDistances => HashSet::new(),
        };

        let model = Self::new(params, gamma, native, censored, sequence)?;
        info!(
            norm = model.norm,
            censored = model.censored.len(),
            mode = ?params.censoring,
            "Loaded AMH-Go native model"
        );
        Ok(model)
    }

    pub fn min_sep(&self) -> usize {
        self.gamma.min_sep()
    }

    pub fn gamma(&self) -> &FragmentGamma {
        &self.gamma
    }

    pub fn native(&self) -> &NativeDistances {
        &self.native
    }

    pub fn is_censored(&self, i: usize, j: usize) -> bool {
        self.censored.contains(&(i.min(j), i.max(j)))
    }

    pub fn norm(&self) -> f64 {
        self.norm
    }
}

fn normalization(
    params: &AmhGoParams,
    gamma: &FragmentGamma,
    native: &NativeDistances,
    sequence: &Sequence,
) -> f64 {
    let residues = sequence.residues();
    let n = residues.len();
    let mut sum = 0.0;
    for i in 0..n {
        for &a in contact_sites(residues[i].is_glycine()) {
            let mut per_atom = 0.0;
            for j in (0..n).filter(|&j| i.abs_diff(j) >= gamma.min_sep()) {
                for &b in contact_sites(residues[j].is_glycine()) {
                    if native.get(i, a, j, b) < params.rc {
                        per_atom += gamma.gamma(i.abs_diff(j), residues[i], residues[j]);
                    }
                }
            }
            sum += f64::abs(per_atom).powf(params.p);
        }
    }
    sum / (8.0 * n as f64)
}

fn read_censored_pairs(
    path: &Path,
    residue_count: usize,
) -> Result<HashSet<(usize, usize)>, ParamLoadError> {
    let mut tokens = read_tokens(path)?;
    let mut pairs = HashSet::new();
    while !tokens.is_exhausted() {
        let a = tokens.next_usize("censored residue")?;
        let b = tokens.next_usize("censored residue")?;
        if a == 0 || b == 0 || a > residue_count || b > residue_count {
            return Err(ParamLoadError::Invalid {
                origin: tokens.origin().to_string(),
                what: "censored pair".into(),
                message: format!("residues {a} and {b} must lie in 1..={residue_count}"),
            });
        }
        pairs.insert((a.min(b) - 1, a.max(b) - 1));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fragments::memory::tests::{straight_template, write_template};
    use std::fs;
    use tempfile::tempdir;

    const TOLERANCE: f64 = 1e-12;
    const GAMMA: &str = "[[classes]]\nmin = 2\n\n[[gammas]]\nclass = 0\ni = \"*\"\nj = \"*\"\ngamma = 0.5\n";

    fn params(censoring: GoCensoring) -> AmhGoParams {
        AmhGoParams {
            k: 1.0,
            p: 2.0,
            rc: 8.0,
            censoring,
        }
    }

    #[test]
    fn template_distances_fall_back_to_alpha_for_glycine() {
        let native = NativeDistances::from_template(&straight_template("AGA"));

        assert!((native.get(0, Site::Alpha, 2, Site::Alpha) - 7.6).abs() < TOLERANCE);
        // Cβ sits 1.5 Å off every non-glycine Cα.
        assert!((native.get(0, Site::Alpha, 1, Site::Beta) - 3.8).abs() < TOLERANCE);
        let diagonal = (3.8f64 * 3.8 + 1.5 * 1.5).sqrt();
        assert!((native.get(1, Site::Alpha, 0, Site::Beta) - diagonal).abs() < TOLERANCE);
        assert!((native.get(0, Site::Beta, 1, Site::Alpha) - diagonal).abs() < TOLERANCE);
        assert_eq!(native.get(0, Site::Oxygen, 1, Site::Alpha), f64::INFINITY);
    }

    #[test]
    fn normalization_counts_native_contacts_per_atom() {
        // Straight chain with 3.8 Å spacing; rc = 8.0 admits separation 2 only.
        let sequence = Sequence::parse("GGGG").unwrap();
        let gamma = FragmentGamma::parse("g", GAMMA).unwrap();
        let native = NativeDistances::from_template(&straight_template("GGGG"));

        let model = GoModel::new(
            &params(GoCensoring::Off),
            gamma,
            native,
            HashSet::new(),
            &sequence,
        )
        .unwrap();

        // Residues 0..=3 each hold one Cα; 0 and 2, 1 and 3 are the contacts.
        let expected = 4.0 * 0.5f64.powi(2) / 32.0;
        assert!((model.norm() - expected).abs() < TOLERANCE);
    }

    #[test]
    fn native_structure_must_match_the_sequence() {
        let sequence = Sequence::parse("GGG").unwrap();
        let gamma = FragmentGamma::parse("g", GAMMA).unwrap();
        let native = NativeDistances::from_template(&straight_template("GGGG"));

        let err = GoModel::new(
            &params(GoCensoring::Off),
            gamma,
            native,
            HashSet::new(),
            &sequence,
        )
        .unwrap_err();

        assert!(matches!(err, ParamLoadError::Inconsistent(_)));
    }

    #[test]
    fn model_without_native_contacts_is_rejected() {
        let sequence = Sequence::parse("GGGG").unwrap();
        let gamma = FragmentGamma::parse("g", GAMMA).unwrap();
        let native = NativeDistances::from_template(&straight_template("GGGG"));
        let params = AmhGoParams {
            rc: 3.0,
            ..params(GoCensoring::Off)
        };

        let err = GoModel::new(&params, gamma, native, HashSet::new(), &sequence).unwrap_err();

        assert!(err.to_string().contains("no contact below rc"));
    }

    #[test]
    fn load_reads_censored_pairs_in_either_order() {
        let dir = tempdir().unwrap();
        write_template(&dir.path().join(GO_NATIVE_FILE), "AKLAG");
        fs::write(dir.path().join(GO_GAMMA_FILE), GAMMA).unwrap();
        fs::write(dir.path().join(GO_CENSORED_FILE), "4 1\n2 5\n").unwrap();
        let sequence = Sequence::parse("AKLAG").unwrap();

        let model =
            GoModel::load(&params(GoCensoring::CensoredContacts), dir.path(), &sequence).unwrap();

        assert!(model.is_censored(0, 3));
        assert!(model.is_censored(3, 0));
        assert!(model.is_censored(4, 1));
        assert!(!model.is_censored(0, 2));
    }

    #[test]
    fn load_takes_native_distances_from_matrices() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(GO_GAMMA_FILE), GAMMA).unwrap();
        let matrix = |scale: f64| {
            (0..3)
                .map(|i| {
                    (0..3)
                        .map(|j| format!("{}", scale * (3 * i + j) as f64))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        fs::write(dir.path().join(GO_NATIVE_ALPHA_ALPHA_FILE), matrix(1.0)).unwrap();
        fs::write(dir.path().join(GO_NATIVE_BETA_BETA_FILE), matrix(2.0)).unwrap();
        fs::write(dir.path().join(GO_NATIVE_ALPHA_BETA_FILE), matrix(0.5)).unwrap();
        let sequence = Sequence::parse("AAA").unwrap();

        let model =
            GoModel::load(&params(GoCensoring::NativeDistances), dir.path(), &sequence).unwrap();

        let native = model.native();
        assert_eq!(native.get(0, Site::Alpha, 2, Site::Alpha), 2.0);
        assert_eq!(native.get(0, Site::Beta, 2, Site::Beta), 4.0);
        assert_eq!(native.get(0, Site::Alpha, 2, Site::Beta), 1.0);
        assert_eq!(native.get(2, Site::Beta, 0, Site::Alpha), 1.0);
    }

    #[test]
    fn truncated_matrix_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(GO_NATIVE_ALPHA_ALPHA_FILE), "1 2 3\n").unwrap();

        let err = NativeDistances::load_matrices(dir.path(), 2).unwrap_err();

        assert!(matches!(err, ParamLoadError::Token(_)));
    }
}
