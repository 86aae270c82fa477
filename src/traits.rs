//! Trait definitions
use crate::error::NumericalError;
use crate::io::dump::DumpValue;
use crate::misc::cmp_lex;
use rand::Rng;
use std::cmp::Ordering;
use std::fmt::Debug;
use std::str::FromStr;

/// Responsibility-weighted sufficient statistic for one mixture component.
///
/// Every observation contributes with weight `gamma[k]`, its responsibility
/// under the component the statistic belongs to. Statistics computed on
/// disjoint sets of observations combine with `merge`, which is how
/// per-group partial sums are reduced into a global statistic.
///
/// # Example
///
/// ```
/// use pmm::data::PoissonWeightedStat;
/// use pmm::traits::WeightedStat;
///
/// let mut a = PoissonWeightedStat::new(1);
/// a.observe(&[4], 0.5);
///
/// let mut b = PoissonWeightedStat::new(1);
/// b.observe(&[2], 1.0);
///
/// a.merge(b);
/// assert_eq!(a.weight(), 1.5);
/// assert_eq!(a.weighted_sum(), &[4.0]);
/// ```
pub trait WeightedStat: Clone + Debug + Send {
    type Datum;

    /// Sum of all observation weights
    fn weight(&self) -> f64;

    /// Assimilate the datum `x` with weight `w`
    fn observe(&mut self, x: &[Self::Datum], w: f64);

    /// Absorb a statistic computed over a disjoint set of observations
    fn merge(&mut self, other: Self);
}

/// A family of component distributions that can be plugged into
/// [`MixtureModel`](crate::model::MixtureModel).
///
/// The engine only ever talks to its components through this trait: it
/// asks for densities during the E-step, feeds weighted observations into
/// [`WeightedStat`]s during the M-step, and asks the family for the closed
/// form parameter update.
pub trait ComponentFamily: Send + Sync {
    /// The raw type of one dimension of an observation
    type Datum: DumpValue + FromStr + Copy + Debug + PartialEq + Send + Sync;
    /// The parameters of one component
    type Params: AsRef<[f64]> + Clone + Debug + PartialEq + Send + Sync;
    /// The statistic the parameter update is computed from
    type Stat: WeightedStat<Datum = Self::Datum>;

    /// Short name of the family, used in reports
    fn name(&self) -> &str;

    /// Draw the initial parameters of one `d`-dimensional component
    fn init_params<R: Rng>(&self, d: usize, rng: &mut R) -> Self::Params;

    /// Check externally supplied parameters of a `d`-dimensional component
    fn validate_params(
        &self,
        params: &Self::Params,
        d: usize,
    ) -> Result<(), String>;

    /// Returns `true` if `x` is a valid observation for this family
    fn supports(&self, x: &[Self::Datum]) -> bool;

    /// Log density of `x` under a component with parameters `params`
    fn ln_f(&self, x: &[Self::Datum], params: &Self::Params) -> f64;

    /// Density of `x` under a component with parameters `params`.
    ///
    /// Never negative; underflows to zero for implausible combinations.
    fn f(&self, x: &[Self::Datum], params: &Self::Params) -> f64 {
        self.ln_f(x, params).exp()
    }

    /// An empty statistic for `d`-dimensional observations
    fn empty_stat(&self, d: usize) -> Self::Stat;

    /// Closed form parameter update of component `component` from its
    /// accumulated statistic
    fn update_params(
        &self,
        component: usize,
        stat: &Self::Stat,
    ) -> Result<Self::Params, NumericalError>;

    /// Number of free parameters used by the AIC penalty
    fn n_free_params(&self, n_groups: usize, d: usize, k: usize) -> f64;

    /// Order in which components are reported
    fn cmp_params(&self, a: &Self::Params, b: &Self::Params) -> Ordering {
        cmp_lex(a.as_ref(), b.as_ref())
    }
}
