use super::coefficients::CoefficientSet;
use super::gamma::{BurialGamma, FragmentGamma, WaterGamma};
use super::go::GoModel;
use super::restraints::ContactRestraints;
use super::statistics::{HBondStatistics, SsWeights};
use crate::core::io::gro::GroError;
use crate::core::io::tokens::{TokenError, Tokens};
use crate::core::models::sequence::Sequence;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const WATER_GAMMA_FILE: &str = "gamma.dat";
pub const BURIAL_GAMMA_FILE: &str = "burial_gamma.dat";
pub const SS_WEIGHT_FILE: &str = "ssweight";

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("{origin}: invalid {what}: {message}")]
    Invalid {
        origin: String,
        what: String,
        message: String,
    },
    #[error("Cannot read structure '{path}': {source}")]
    Structure {
        path: String,
        #[source]
        source: GroError,
    },
    #[error("Inconsistent parameters: {0}")]
    Inconsistent(String),
}

pub(crate) fn read_tokens(path: &Path) -> Result<Tokens, ParamLoadError> {
    Tokens::read_from_path(path).map_err(|e| ParamLoadError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

/// The coefficient file together with every fixed table its active sections require.
#[derive(Debug, Clone)]
pub struct ForceField {
    pub coefficients: CoefficientSet,
    pub water_gamma: Option<WaterGamma>,
    pub burial_gamma: Option<BurialGamma>,
    pub hbond: Option<HBondStatistics>,
    pub ss_weights: Option<SsWeights>,
    pub fragment_gamma: Option<FragmentGamma>,
    pub go_model: Option<GoModel>,
    pub contact_restraints: Option<ContactRestraints>,
}

impl ForceField {
    /// Loads the coefficient file, then the fixed-name tables from `param_dir` for each
    /// active section. The sequence sizes the per-residue tables and types the AMH-Go
    /// normalization.
    ///
    /// Relative file names inside the coefficient file are resolved against `param_dir`.
    pub fn load(
        coefficient_path: &Path,
        param_dir: &Path,
        sequence: &Sequence,
    ) -> Result<Self, ParamLoadError> {
        let residue_count = sequence.len();
        let mut coefficients = CoefficientSet::load(coefficient_path)?;
        info!(path = %coefficient_path.display(), epsilon = coefficients.epsilon, "Loaded coefficient file");

        let water_gamma = match &coefficients.water {
            Some(water) => Some(WaterGamma::load(
                &param_dir.join(WATER_GAMMA_FILE),
                water.wells.len(),
                water.k,
            )?),
            None => None,
        };
        let burial_gamma = match coefficients.burial {
            Some(_) => Some(BurialGamma::load(&param_dir.join(BURIAL_GAMMA_FILE))?),
            None => None,
        };
        let hbond = match coefficients.dssp {
            Some(_) => Some(HBondStatistics::load(param_dir)?),
            None => None,
        };
        let ss_weights = match &coefficients.ss_weight {
            Some(flags) => Some(SsWeights::load(
                &param_dir.join(SS_WEIGHT_FILE),
                flags,
                residue_count,
            )?),
            None => None,
        };
        let fragment_gamma = match coefficients.fragment_memory.as_mut() {
            Some(fm) => {
                fm.memory_file = resolve(param_dir, &fm.memory_file);
                fm.gamma_file = resolve(param_dir, &fm.gamma_file);
                Some(FragmentGamma::load(&fm.gamma_file)?)
            }
            None => None,
        };
        let go_model = match &coefficients.amh_go {
            Some(params) => Some(GoModel::load(params, param_dir, sequence)?),
            None => None,
        };
        let contact_restraints = match coefficients.contact_restraints.as_mut() {
            Some(cr) => {
                cr.file = resolve(param_dir, &cr.file);
                Some(ContactRestraints::load(&cr.file, cr.k, residue_count)?)
            }
            None => None,
        };

        Ok(Self {
            coefficients,
            water_gamma,
            burial_gamma,
            hbond,
            ss_weights,
            fragment_gamma,
            go_model,
            contact_restraints,
        })
    }

    /// The coefficient cutoff widened to the farthest restrained contact.
    pub fn pair_cutoff(&self) -> f64 {
        let cutoff = self.coefficients.pair_cutoff();
        match (&self.coefficients.contact_restraints, &self.contact_restraints) {
            (Some(params), Some(restraints)) => {
                cutoff.max(restraints.max_r0() + params.dr_cutoff())
            }
            _ => cutoff,
        }
    }
}

pub(crate) fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::coefficients::FragmentBackend;
    use crate::core::models::residue::AminoAcid;
    use crate::core::models::sequence::Sequence;
    use std::fs;
    use tempfile::tempdir;

    const TOLERANCE: f64 = 1e-12;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn write_water_gamma(dir: &Path, wells: usize) {
        let mut text = String::new();
        for _ in 0..wells {
            for i in 0..20 {
                for j in i..20 {
                    text.push_str(&format!("{} {}\n", 0.01 * i as f64, 0.01 * j as f64));
                }
            }
        }
        fs::write(dir.join(WATER_GAMMA_FILE), text).unwrap();
    }

    fn write_burial_gamma(dir: &Path) {
        let text = (0..20).map(|_| "0.1 0.2 0.3\n").collect::<String>();
        fs::write(dir.join(BURIAL_GAMMA_FILE), text).unwrap();
    }

    #[test]
    fn load_reads_tables_only_for_active_sections() {
        let dir = tempdir().unwrap();
        let coeff = dir.path().join("fix_backbone_coeff.data");
        fs::write(
            &coeff,
            "[Chain]\n10 10 30\n2.45 2.52 2.46\n\n\
             [Water]\n1.5\n5.0 7.0\n2.6\n10\n1\n4.5 6.5 1\n\n\
             [Burial]\n1.0\n4.0\n0.0 3.0\n3.0 6.0\n6.0 9.0\n",
        )
        .unwrap();
        write_water_gamma(dir.path(), 1);
        write_burial_gamma(dir.path());

        let ff = ForceField::load(&coeff, dir.path(), &Sequence::parse("AAAAA").unwrap()).unwrap();

        assert!(ff.hbond.is_none());
        assert!(ff.ss_weights.is_none());
        assert!(ff.fragment_gamma.is_none());
        let water = ff.water_gamma.unwrap();
        // Scaled by k_water and mirrored.
        let g = water.get(0, AminoAcid::Arginine, AminoAcid::Asparagine);
        assert!(f64_approx_equal(g.0, 1.5 * 0.01));
        assert!(f64_approx_equal(g.1, 1.5 * 0.02));
        assert_eq!(water.get(0, AminoAcid::Asparagine, AminoAcid::Arginine), g);
        let burial = ff.burial_gamma.unwrap();
        assert!(f64_approx_equal(burial.get(AminoAcid::Valine, 2), 0.3));
    }

    #[test]
    fn load_fails_when_a_required_table_is_missing() {
        let dir = tempdir().unwrap();
        let coeff = dir.path().join("coeff");
        fs::write(&coeff, "[Water]\n1.0\n5.0 7.0\n2.6\n10\n1\n4.5 6.5 1\n").unwrap();

        let result = ForceField::load(&coeff, dir.path(), &Sequence::parse("AAAAA").unwrap());

        match result {
            Err(ParamLoadError::Io { path, .. }) => assert!(path.ends_with(WATER_GAMMA_FILE)),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn fragment_files_resolve_against_the_parameter_directory() {
        let dir = tempdir().unwrap();
        let coeff = dir.path().join("coeff");
        fs::write(&coeff, "[Fragment_Memory]\n1.0\nfrags.mem\nfm.toml\n").unwrap();
        fs::write(dir.path().join("fm.toml"), "[[classes]]\nmin = 3\n").unwrap();

        let ff = ForceField::load(&coeff, dir.path(), &Sequence::parse("AAAAAAAAAA").unwrap()).unwrap();

        let fm = ff.coefficients.fragment_memory.unwrap();
        assert_eq!(fm.memory_file, dir.path().join("frags.mem"));
        assert_eq!(fm.backend, FragmentBackend::Direct);
        assert_eq!(ff.fragment_gamma.unwrap().min_sep(), 3);
    }

    #[test]
    fn contact_restraints_resolve_and_widen_the_pair_cutoff() {
        let dir = tempdir().unwrap();
        let coeff = dir.path().join("coeff");
        fs::write(&coeff, "[Contact_Restraints]\n2.0 1.0 cr.dat\n").unwrap();
        fs::write(dir.path().join("cr.dat"), "1 5 1.0 15.0\n2 4 0.5 6.0\n").unwrap();

        let ff = ForceField::load(&coeff, dir.path(), &Sequence::parse("AAAAA").unwrap()).unwrap();

        let restraints = ff.contact_restraints.as_ref().unwrap();
        assert_eq!(restraints.len(), 2);
        assert!(f64_approx_equal(restraints.get(0, 4).unwrap().weight, 2.0));
        assert!(f64_approx_equal(ff.pair_cutoff(), 15.0 + 4.29));
    }

    #[test]
    fn amh_go_fails_without_its_native_structure() {
        let dir = tempdir().unwrap();
        let coeff = dir.path().join("coeff");
        fs::write(&coeff, "[AMH-Go]\n1.0 2 8.0 0\n").unwrap();
        fs::write(
            dir.path().join(crate::core::forcefield::go::GO_GAMMA_FILE),
            "[[classes]]\nmin = 2\n",
        )
        .unwrap();

        let err = ForceField::load(&coeff, dir.path(), &Sequence::parse("AAAAA").unwrap())
            .unwrap_err();

        assert!(matches!(err, ParamLoadError::Structure { .. }));
    }
}
