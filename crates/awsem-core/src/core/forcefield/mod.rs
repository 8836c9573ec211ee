//! Functional forms and parameters of the AWSEM terms.
//!
//! [`potentials`] holds the shared switching functions, [`term`] names the energy terms,
//! and the loaders turn the coefficient file and the fixed tables into a [`params::ForceField`].

pub mod coefficients;
pub mod gamma;
pub mod go;
pub mod params;
pub mod potentials;
pub mod restraints;
pub mod statistics;
pub mod term;
