//! # Workflows Module
//!
//! High-level entry points that tie the engine to the files on disk. Each workflow loads
//! everything named by an [`EngineConfig`](crate::engine::config::EngineConfig), reports its
//! phases through a [`ProgressReporter`](crate::engine::progress::ProgressReporter) and
//! returns plain result structs.
//!
//! - **Evaluation** ([`evaluate`]) - Energies and forces for a sequence of frames, with the
//!   optional energy log
//! - **Table Build** ([`table`]) - Tabulates the fragment-memory library and writes
//!   `fm_table.energy` and `fm_table.force`

pub mod evaluate;
pub mod table;
