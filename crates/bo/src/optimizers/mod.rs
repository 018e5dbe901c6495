//! Multistart optimization of acquisition functions
mod initializers;
mod multistart;
mod optimizer;

pub use initializers::*;
pub use multistart::*;
