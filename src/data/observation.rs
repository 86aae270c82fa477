use crate::misc::uniform_weights;

/// One data point together with its latent responsibility vector.
///
/// The value vector `x` is fixed at construction. The responsibilities
/// `gamma` start out uniform over the `k` components and are overwritten by
/// every E-step.
///
/// # Example
///
/// ```
/// use pmm::data::Observation;
///
/// let obs = Observation::new(vec![3_i32, 7], 4);
/// assert_eq!(obs.x(), &[3, 7]);
/// assert_eq!(obs.gamma(), &[0.25, 0.25, 0.25, 0.25]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<X> {
    x: Vec<X>,
    gamma: Vec<f64>,
}

impl<X> Observation<X> {
    /// Create an observation with uniform responsibilities over `k`
    /// components
    pub fn new(x: Vec<X>, k: usize) -> Self {
        Observation {
            x,
            gamma: uniform_weights(k),
        }
    }

    /// The observed value vector
    #[inline]
    pub fn x(&self) -> &[X] {
        &self.x
    }

    /// The dimension of the observed value
    #[inline]
    pub fn dim(&self) -> usize {
        self.x.len()
    }

    /// The responsibility of each component for this observation
    #[inline]
    pub fn gamma(&self) -> &[f64] {
        &self.gamma
    }

    /// Reset the responsibilities to uniform over `k` components
    pub fn init_latent(&mut self, k: usize) {
        self.gamma = uniform_weights(k);
    }

    pub(crate) fn gamma_mut(&mut self) -> &mut [f64] {
        &mut self.gamma
    }
}
