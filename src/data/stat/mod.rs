mod poisson;

pub use poisson::*;
