//! Readers for the structure and parameter files consumed by the engine.
//!
//! Structures come in as PDB frames (the evaluated coordinates) or GRO files (the
//! fragment-memory templates). The coefficient file and the fixed parameter tables are
//! plain whitespace token streams read through [`tokens::Tokens`].

pub mod gro;
pub mod pdb;
pub mod tokens;
pub mod traits;
