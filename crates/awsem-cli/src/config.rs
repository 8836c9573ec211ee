use crate::cli::ParameterArgs;
use crate::error::{CliError, Result};
use awsem::engine::config::{self as core_config, EngineConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialParameterConfig {
    coefficient_file: Option<PathBuf>,
    sequence_file: Option<PathBuf>,
    param_dir: Option<PathBuf>,
    table_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialOutputConfig {
    energy_log: Option<PathBuf>,
}

/// How the command line treats the energy log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyLogOverride<'a> {
    /// Keep whatever the config file says.
    FromFile,
    Path(&'a Path),
    Disabled,
}

/// The run configuration as read from TOML; every field may still be supplied on the
/// command line.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialRunConfig {
    parameters: Option<PartialParameterConfig>,
    output: Option<PartialOutputConfig>,
}

impl PartialRunConfig {
    /// Reads `path`. Relative paths inside the file are taken relative to the file itself.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_relative_to(base);
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut Option<PathBuf>| {
            if let Some(path) = p.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        };
        if let Some(params) = self.parameters.as_mut() {
            resolve(&mut params.coefficient_file);
            resolve(&mut params.sequence_file);
            resolve(&mut params.param_dir);
            resolve(&mut params.table_dir);
        }
        if let Some(output) = self.output.as_mut() {
            resolve(&mut output.energy_log);
        }
    }

    pub fn merge_with_cli(
        mut self,
        args: &ParameterArgs,
        energy_log: EnergyLogOverride,
    ) -> Result<EngineConfig> {
        self.apply_set_values(&args.set_values)?;

        let params = self.parameters.take().unwrap_or_default();
        let output = self.output.take().unwrap_or_default();

        let require = |cli: &Option<PathBuf>, file: Option<PathBuf>, key: &str| {
            cli.clone().or(file).ok_or_else(|| {
                CliError::Config(format!(
                    "A value for '{}' is required either in the config file or via CLI argument.",
                    key
                ))
            })
        };

        let mut builder = core_config::EngineConfigBuilder::new()
            .coefficient_path(require(
                &args.coefficients,
                params.coefficient_file,
                "parameters.coefficient-file",
            )?)
            .sequence_path(require(
                &args.sequence,
                params.sequence_file,
                "parameters.sequence-file",
            )?)
            .param_dir(require(&args.param_dir, params.param_dir, "parameters.param-dir")?);
        if let Some(table_dir) = args.table_dir.clone().or(params.table_dir) {
            builder = builder.table_dir(table_dir);
        }
        builder = builder.energy_log(match energy_log {
            EnergyLogOverride::FromFile => output.energy_log,
            EnergyLogOverride::Path(path) => Some(path.to_path_buf()),
            EnergyLogOverride::Disabled => None,
        });

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let value = Some(PathBuf::from(value));
            let params = self.parameters.get_or_insert_with(Default::default);

            match key {
                "parameters.coefficient-file" => params.coefficient_file = value,
                "parameters.sequence-file" => params.sequence_file = value,
                "parameters.param-dir" => params.param_dir = value,
                "parameters.table-dir" => params.table_dir = value,
                "output.energy-log" => {
                    self.output.get_or_insert_with(Default::default).energy_log = value
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
