//! Poisson distribution on counts and the product-of-Poissons component
//! family
use crate::consts::{INIT_RATE_LOWER, INIT_RATE_UPPER};
use crate::data::PoissonWeightedStat;
use crate::error::NumericalError;
use crate::misc::{finite_positive, vec_to_string};
use crate::traits::{ComponentFamily, WeightedStat};
use rand::Rng;
use special::Gamma as _;
use std::fmt;
use thiserror::Error;

/// [Poisson distribution](https://en.wikipedia.org/wiki/Poisson_distribution)
/// over x in {0, 1, ... }.
///
/// # Example
///
/// ```
/// use pmm::dist::Poisson;
///
/// let pois = Poisson::new(5.3).unwrap();
/// assert!((pois.ln_f(5) + 1.7489576399916658).abs() < 1E-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Poisson {
    rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PoissonError {
    /// The rate parameter is less than or equal to zero
    #[error("rate ({rate}) must be greater than zero")]
    RateTooLow { rate: f64 },
    /// The rate parameter is infinite or NaN
    #[error("non-finite rate: {rate}")]
    RateNotFinite { rate: f64 },
}

impl Poisson {
    /// Create a new Poisson distribution with given rate
    pub fn new(rate: f64) -> Result<Self, PoissonError> {
        if rate <= 0.0 {
            Err(PoissonError::RateTooLow { rate })
        } else if !rate.is_finite() {
            Err(PoissonError::RateNotFinite { rate })
        } else {
            Ok(Poisson { rate })
        }
    }

    /// Creates a new Poisson without checking whether the parameter is valid.
    #[inline]
    pub fn new_unchecked(rate: f64) -> Self {
        Poisson { rate }
    }

    /// Get the rate parameter
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Log probability mass at `x`.
    ///
    /// Negative counts are outside the support and have zero mass. A zero
    /// count has log mass `-rate` even at a zero rate.
    pub fn ln_f(&self, x: i32) -> f64 {
        if x < 0 {
            f64::NEG_INFINITY
        } else if x == 0 {
            -self.rate
        } else {
            let kf = f64::from(x);
            kf * self.rate.ln() - self.rate - (kf + 1.0).ln_gamma().0
        }
    }

    /// Probability mass at `x`
    #[inline]
    pub fn f(&self, x: i32) -> f64 {
        self.ln_f(x).exp()
    }
}

impl fmt::Display for Poisson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Poisson(λ: {})", self.rate)
    }
}

/// Per-dimension rates of one product-of-Poissons component
#[derive(Debug, Clone, PartialEq)]
pub struct PoissonRates(Vec<f64>);

impl PoissonRates {
    pub fn new(rates: Vec<f64>) -> Self {
        PoissonRates(rates)
    }

    #[inline]
    pub fn rates(&self) -> &[f64] {
        &self.0
    }

    /// The rate of each dimension as a [`Poisson`]
    pub fn dists(&self) -> impl Iterator<Item = Poisson> + '_ {
        self.0.iter().map(|&rate| Poisson::new_unchecked(rate))
    }
}

impl AsRef<[f64]> for PoissonRates {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for PoissonRates {
    fn from(rates: Vec<f64>) -> Self {
        PoissonRates(rates)
    }
}

impl fmt::Display for PoissonRates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "λ: {}", vec_to_string(&self.0, 8))
    }
}

/// Components whose dimensions are independent Poisson counts.
///
/// The density of an observation is the product over dimensions of the
/// Poisson mass of each count given that dimension's rate. The M-step
/// update of a rate is the responsibility-weighted mean of its counts.
///
/// # Example
///
/// ```
/// use pmm::dist::{PoissonFamily, PoissonRates};
/// use pmm::traits::ComponentFamily;
///
/// let family = PoissonFamily::new();
/// let rates = PoissonRates::new(vec![2.0, 10.0]);
///
/// // Independent dimensions multiply
/// let f = family.f(&[1, 12], &rates);
/// let expected = (2.0 * (-2.0_f64).exp())
///     * (10.0_f64.powi(12) * (-10.0_f64).exp() / 479_001_600.0);
/// assert!((f - expected).abs() < 1E-12);
///
/// // one mixing weight per group and one rate per dimension, per component
/// assert_eq!(family.n_free_params(3, 2, 4), 20.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoissonFamily;

impl PoissonFamily {
    pub fn new() -> Self {
        PoissonFamily
    }
}

impl ComponentFamily for PoissonFamily {
    type Datum = i32;
    type Params = PoissonRates;
    type Stat = PoissonWeightedStat;

    fn name(&self) -> &str {
        "Poisson"
    }

    fn init_params<R: Rng>(&self, d: usize, rng: &mut R) -> PoissonRates {
        (0..d)
            .map(|_| rng.gen_range(INIT_RATE_LOWER..INIT_RATE_UPPER))
            .collect::<Vec<f64>>()
            .into()
    }

    fn validate_params(
        &self,
        params: &PoissonRates,
        d: usize,
    ) -> Result<(), String> {
        if params.rates().len() != d {
            return Err(format!(
                "expected {} rates, got {}",
                d,
                params.rates().len()
            ));
        }
        match params
            .rates()
            .iter()
            .find(|rate| !(rate.is_finite() && **rate >= 0.0))
        {
            Some(rate) => Err(format!("invalid rate: {}", rate)),
            None => Ok(()),
        }
    }

    fn supports(&self, x: &[i32]) -> bool {
        x.iter().all(|&xd| xd >= 0)
    }

    fn ln_f(&self, x: &[i32], params: &PoissonRates) -> f64 {
        params
            .dists()
            .zip(x.iter())
            .map(|(pois, &xd)| pois.ln_f(xd))
            .sum()
    }

    fn empty_stat(&self, d: usize) -> PoissonWeightedStat {
        PoissonWeightedStat::new(d)
    }

    fn update_params(
        &self,
        component: usize,
        stat: &PoissonWeightedStat,
    ) -> Result<PoissonRates, NumericalError> {
        let denom = stat.weight();
        stat.weighted_sum()
            .iter()
            .enumerate()
            .map(|(dim, &sum)| {
                let num = finite_positive(sum).ok_or(
                    NumericalError::NonFiniteParameter {
                        component,
                        dim,
                        value: sum,
                    },
                )?;
                let rate = num / denom;
                if rate.is_finite() {
                    Ok(rate)
                } else {
                    Err(NumericalError::NonFiniteRate {
                        component,
                        dim,
                        value: rate,
                    })
                }
            })
            .collect::<Result<Vec<f64>, NumericalError>>()
            .map(PoissonRates)
    }

    fn n_free_params(&self, n_groups: usize, d: usize, k: usize) -> f64 {
        ((n_groups + d) * k) as f64
    }
}
