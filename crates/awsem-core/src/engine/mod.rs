//! # Engine Module
//!
//! The stateful evaluation engine. An [`evaluator::Evaluator`] owns the sequence, the loaded
//! force field and one boxed [`terms::PotentialTerm`] per active coefficient section, and turns
//! a [`ParticleSystem`](crate::core::models::system::ParticleSystem) into decomposed energies
//! and per-particle forces once per step.
//!
//! ## Step Structure
//!
//! 1. Virtual N, H and C′ sites are rebuilt ([`BackboneFrame`](crate::core::backbone::virtual_atoms::BackboneFrame))
//!    and a Cα pair list is collected ([`neighbors`]).
//! 2. Per-residue water and helix densities are accumulated over owned pairs and summed
//!    across ranks ([`density`]).
//! 3. Density-mediated terms add their `dE/dρ` coefficients, which are summed across ranks
//!    as well.
//! 4. Every term adds its energy and site forces into per-worker [`accumulator::Accumulator`]s;
//!    site forces on virtual atoms are then spread onto their real parents.
//!
//! The two reductions go through a [`comm::Communicator`]. A single process uses
//! [`comm::SerialComm`]; several ranks inside one process can share a [`comm::LocalGroup`].
//!
//! ## Submodules
//!
//! - **Configuration** ([`config`]) - Input file locations for a run
//! - **Terms** ([`terms`]) - The potential-term registry and one module per term
//! - **Energy Log** ([`energy_log`]) - Tab-separated per-step energy table
//! - **Progress Monitoring** ([`progress`]) - Phase and task events for front ends
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod accumulator;
pub mod comm;
pub mod config;
pub mod context;
pub mod density;
pub mod energy_log;
pub mod error;
pub mod evaluator;
pub mod neighbors;
pub mod progress;
pub mod terms;
