//! Component families
mod poisson;

pub use poisson::{Poisson, PoissonError, PoissonFamily, PoissonRates};
