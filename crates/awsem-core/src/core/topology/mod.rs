pub mod builder;
pub mod residue;
