pub mod backbone;
pub mod forcefield;
pub mod fragments;
pub mod io;
pub mod models;
pub mod topology;
pub mod utils;
