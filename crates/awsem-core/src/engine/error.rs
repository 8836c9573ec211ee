use thiserror::Error;

use super::comm::CommError;
use super::config::ConfigError;
use crate::core::backbone::sites::Site;
use crate::core::forcefield::params::ParamLoadError;
use crate::core::forcefield::term::TermKind;
use crate::core::fragments::map::MapError;
use crate::core::fragments::memory::MemoryError;
use crate::core::fragments::table::TableError;
use crate::core::models::sequence::SequenceError;
use crate::core::topology::builder::TopologyError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parameter loading failed: {0}")]
    ParamLoad(#[from] ParamLoadError),

    #[error("Failed to read sequence file '{path}': {source}")]
    Sequence {
        path: String,
        #[source]
        source: SequenceError,
    },

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Fragment memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Fragment map error: {0}")]
    Map(#[from] MapError),

    #[error("Fragment-memory table error: {0}")]
    Table(#[from] TableError),

    #[error("Reduction failed: {0}")]
    Comm(#[from] CommError),

    #[error("{term}: residue {residue} is missing its {site} site")]
    MissingAtom {
        residue: usize,
        site: Site,
        term: TermKind,
    },

    #[error("{term}: residues {i} and {j} lie on different chains")]
    CrossChain { i: usize, j: usize, term: TermKind },

    #[error("Energy log error for '{path}': {source}")]
    EnergyLog {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Topology has not been built; call update_topology first")]
    TopologyNotBuilt,

    #[error("Internal logic error: {0}")]
    Internal(String),
}
