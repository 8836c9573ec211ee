//! # AWSEM Core Library
//!
//! A coarse-grained protein backbone potential engine. Every residue is reduced to three
//! pseudo-atoms (Cα, Cβ and the carbonyl oxygen); the remaining backbone atoms are rebuilt
//! as virtual sites, and a set of knowledge-based terms is evaluated on top of them to
//! produce a decomposed energy and a per-particle force for each simulation step.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`ParticleSystem`, `Sequence`,
//!   `ResidueTopology`), the mathematical form of each potential, parameter loaders, and the
//!   fragment-memory library with its precomputed distance table.
//!
//! - **[`engine`]: The Logic Core.** The stateful evaluator. It owns the registry of active
//!   potential terms and drives the multi-pass step: virtual atoms, density accumulation and
//!   reduction, density-derived coefficients and their reduction, and the final force pass.
//!   The reduction barriers are encoded in types (`ReducedDensity`, `ReducedXi`) so that no
//!   density-dependent force can be evaluated on partial sums.
//!
//! - **[`workflows`]: The Public API.** Ties `engine` and `core` together: load every parameter
//!   file named by a configuration, evaluate one or more frames, and write the energy log.

pub mod core;
pub mod engine;
pub mod workflows;
