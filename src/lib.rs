//! Grouped finite mixture models fit by expectation maximization.
//!
//! Observations are `D`-dimensional vectors collected into named groups.
//! Each group has its own mixing coefficients over `K` components while
//! the component parameters are shared by all groups. The component
//! distribution is pluggable through [`traits::ComponentFamily`];
//! [`dist::PoissonFamily`] models independent counts per dimension.
//!
//! # Example
//!
//! ```
//! use pmm::dist::PoissonFamily;
//! use pmm::fit::{fit, EmConfig};
//! use pmm::model::MixtureModel;
//! use rand::SeedableRng;
//! use rand_xoshiro::Xoshiro256PlusPlus;
//!
//! let mut rng = Xoshiro256PlusPlus::seed_from_u64(1337);
//! let mut model = MixtureModel::new(PoissonFamily, 2, 1, &mut rng).unwrap();
//!
//! let csv = "a,1\na,2\na,3\nb,50\nb,52\nb,49\n";
//! model.read_csv(csv.as_bytes(), true).unwrap();
//!
//! let report = fit(&mut model, &EmConfig::default()).unwrap();
//! assert_eq!(report.n_iter, model.n_iter());
//! assert!(model.aic().unwrap().is_finite());
//! ```
pub mod config;
pub mod consts;
pub mod data;
pub mod dist;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod misc;
pub mod model;
pub mod traits;

pub use error::{DumpError, Error, NumericalError, Result};
pub use model::{MixtureModel, ModelState};
