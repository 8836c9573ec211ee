pub mod sites;
pub mod virtual_atoms;
