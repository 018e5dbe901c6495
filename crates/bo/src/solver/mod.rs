mod mfkg_solver;
mod mfkg_state;

pub use mfkg_solver::*;
pub use mfkg_state::*;
