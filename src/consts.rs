//! Numerical constants and defaults

/// Lower bound (inclusive) of the uniform range initial rates are drawn from
pub const INIT_RATE_LOWER: f64 = 0.0;
/// Upper bound (exclusive) of the uniform range initial rates are drawn from
pub const INIT_RATE_UPPER: f64 = 100.0;

/// Relative log-likelihood change below which an iteration counts as
/// converged
pub const CONVERGENCE_TOL: f64 = 1E-3;
/// Number of consecutive converged iterations required to stop
pub const CONVERGENCE_PATIENCE: usize = 3;

/// Default number of mixture components
pub const DEFAULT_K: usize = 4;
/// Default data dimension
pub const DEFAULT_D: usize = 1;
/// Default maximum number of EM iterations
pub const DEFAULT_MAX_ITER: usize = 20;
/// Default minimum number of observations a group must hold
pub const DEFAULT_MIN_GROUP_SIZE: usize = 1;

/// Width in bytes of every size field in the binary dump
pub const DUMP_SIZE_WIDTH: usize = 8;
