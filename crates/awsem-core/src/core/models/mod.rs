pub mod forces;
pub mod ids;
pub mod particle;
pub mod residue;
pub mod sequence;
pub mod system;
