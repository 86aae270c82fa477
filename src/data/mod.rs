//! Grouped observations and weighted statistics
mod group;
mod observation;
mod stat;

pub use group::{Group, GroupTable};
pub use observation::Observation;
pub use stat::*;
