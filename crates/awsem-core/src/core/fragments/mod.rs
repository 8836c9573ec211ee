//! Fragment memories: template structures whose Cα/Cβ distances bias the target chain.
//!
//! [`memory`] reads the memory library and its GRO templates, [`map`] indexes memories by
//! the target residue that anchors them, and [`table`] precomputes the distance curves
//! used by the tabulated backend.

pub mod map;
pub mod memory;
pub mod table;
