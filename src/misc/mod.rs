//! Numerical helpers
mod func;

pub use func::*;
