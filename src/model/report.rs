use std::fmt;

/// Akaike Information Criterion of a fitted model, with its two terms
///
/// # Example
///
/// ```
/// use pmm::model::Aic;
///
/// let aic = Aic::new(-120.0, 10.0);
/// assert_eq!(aic.likelihood_term(), 240.0);
/// assert_eq!(aic.penalty_term(), 20.0);
/// assert_eq!(aic.score(), 260.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aic {
    ln_likelihood: f64,
    n_free_params: f64,
}

impl Aic {
    pub fn new(ln_likelihood: f64, n_free_params: f64) -> Self {
        Aic {
            ln_likelihood,
            n_free_params,
        }
    }

    #[inline]
    pub fn ln_likelihood(&self) -> f64 {
        self.ln_likelihood
    }

    #[inline]
    pub fn n_free_params(&self) -> f64 {
        self.n_free_params
    }

    /// `-2 ln L`
    #[inline]
    pub fn likelihood_term(&self) -> f64 {
        -2.0 * self.ln_likelihood
    }

    /// `2 p`
    #[inline]
    pub fn penalty_term(&self) -> f64 {
        2.0 * self.n_free_params
    }

    /// `-2 ln L + 2 p`
    #[inline]
    pub fn score(&self) -> f64 {
        self.likelihood_term() + self.penalty_term()
    }
}

impl fmt::Display for Aic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AIC = {:.6} (likelihood term = {:.6}, parameter term = {:.6})",
            self.score(),
            self.likelihood_term(),
            self.penalty_term()
        )
    }
}

/// Summary of how observations are spread over groups
#[derive(Debug, Clone, PartialEq)]
pub struct DataStats {
    pub n_groups: usize,
    pub n_observations: usize,
    /// Mean number of observations per group
    pub mean: f64,
    /// Population variance of the number of observations per group
    pub variance: f64,
    pub min: usize,
    pub max: usize,
    /// Group sizes at the first, second, and third quartile positions
    pub quartiles: [usize; 3],
}

impl DataStats {
    /// Compute the statistics from a list of group sizes. `None` if empty.
    ///
    /// # Example
    ///
    /// ```
    /// use pmm::model::DataStats;
    ///
    /// let stats = DataStats::from_sizes(vec![4, 1, 3, 2]).unwrap();
    /// assert_eq!(stats.n_observations, 10);
    /// assert_eq!(stats.mean, 2.5);
    /// assert_eq!(stats.variance, 1.25);
    /// assert_eq!((stats.min, stats.max), (1, 4));
    /// assert_eq!(stats.quartiles, [2, 3, 4]);
    /// ```
    pub fn from_sizes(mut sizes: Vec<usize>) -> Option<Self> {
        if sizes.is_empty() {
            return None;
        }
        sizes.sort_unstable();
        let s = sizes.len();
        let n_observations: usize = sizes.iter().sum();
        let mean = n_observations as f64 / s as f64;
        let variance = sizes
            .iter()
            .map(|&n| (n as f64 - mean).powi(2))
            .sum::<f64>()
            / s as f64;
        Some(DataStats {
            n_groups: s,
            n_observations,
            mean,
            variance,
            min: sizes[0],
            max: sizes[s - 1],
            quartiles: [sizes[s / 4], sizes[s / 2], sizes[s / 4 * 3]],
        })
    }
}
