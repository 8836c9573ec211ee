use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Coefficient file has no active {0} section")]
    MissingSection(&'static str),
}

/// Everything the evaluator needs to locate its input files.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub coefficient_path: PathBuf,
    pub sequence_path: PathBuf,
    /// Directory holding the fixed-name tables (`gamma.dat`, `burial_gamma.dat`, ...).
    pub param_dir: PathBuf,
    /// Directory where `fm_table.energy` and `fm_table.force` are read and written.
    pub table_dir: PathBuf,
    pub energy_log: Option<PathBuf>,
}

#[derive(Default)]
pub struct EngineConfigBuilder {
    coefficient_path: Option<PathBuf>,
    sequence_path: Option<PathBuf>,
    param_dir: Option<PathBuf>,
    table_dir: Option<PathBuf>,
    energy_log: Option<PathBuf>,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coefficient_path(mut self, path: PathBuf) -> Self {
        self.coefficient_path = Some(path);
        self
    }
    pub fn sequence_path(mut self, path: PathBuf) -> Self {
        self.sequence_path = Some(path);
        self
    }
    pub fn param_dir(mut self, path: PathBuf) -> Self {
        self.param_dir = Some(path);
        self
    }
    pub fn table_dir(mut self, path: PathBuf) -> Self {
        self.table_dir = Some(path);
        self
    }
    pub fn energy_log(mut self, path: Option<PathBuf>) -> Self {
        self.energy_log = path;
        self
    }

    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let param_dir = self
            .param_dir
            .ok_or(ConfigError::MissingParameter("param_dir"))?;
        Ok(EngineConfig {
            coefficient_path: self
                .coefficient_path
                .ok_or(ConfigError::MissingParameter("coefficient_path"))?,
            sequence_path: self
                .sequence_path
                .ok_or(ConfigError::MissingParameter("sequence_path"))?,
            table_dir: self.table_dir.unwrap_or_else(|| param_dir.clone()),
            param_dir,
            energy_log: self.energy_log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fails_without_coefficient_path() {
        let result = EngineConfigBuilder::new()
            .sequence_path("protein.seq".into())
            .param_dir("params".into())
            .build();
        assert_eq!(
            result,
            Err(ConfigError::MissingParameter("coefficient_path"))
        );
    }

    #[test]
    fn build_fails_without_param_dir() {
        let result = EngineConfigBuilder::new()
            .coefficient_path("fix_backbone_coeff.data".into())
            .sequence_path("protein.seq".into())
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("param_dir")));
    }

    #[test]
    fn table_dir_defaults_to_param_dir() {
        let config = EngineConfigBuilder::new()
            .coefficient_path("fix_backbone_coeff.data".into())
            .sequence_path("protein.seq".into())
            .param_dir("params".into())
            .build()
            .unwrap();
        assert_eq!(config.table_dir, PathBuf::from("params"));
        assert_eq!(config.energy_log, None);
    }

    #[test]
    fn explicit_table_dir_and_energy_log_are_kept() {
        let config = EngineConfigBuilder::new()
            .coefficient_path("coeff".into())
            .sequence_path("seq".into())
            .param_dir("params".into())
            .table_dir("tables".into())
            .energy_log(Some("energy.log".into()))
            .build()
            .unwrap();
        assert_eq!(config.table_dir, PathBuf::from("tables"));
        assert_eq!(config.energy_log, Some(PathBuf::from("energy.log")));
    }
}
