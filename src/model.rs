//! The EM estimation engine
use crate::data::{Group, GroupTable};
use crate::error::{Error, NumericalError, Result};
use crate::io::csv::{read_records, IngestReport};
use crate::io::dump::{read_dump, write_dump, DumpValue};
use crate::traits::{ComponentFamily, WeightedStat};
use itertools::Itertools;
use rand::Rng;
use rayon::prelude::*;
use std::io::{Read, Seek, Write};
use tracing::{debug, info};

mod report;

pub use report::{Aic, DataStats};

/// Lifecycle of a [`MixtureModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// No data loaded yet
    Uninitialized,
    /// Data loaded and latent parameters uniform
    Loaded,
    /// At least one EM iteration has run
    Iterating,
    /// A driver stopped iterating because the log-likelihood settled
    Converged,
    /// A driver stopped iterating at its iteration limit
    Exhausted,
}

/// A finite mixture of `k` components from the family `Fx` over groups of
/// `d`-dimensional observations.
///
/// Every group has its own mixing coefficients; component parameters are
/// shared by all groups. The model only knows how to run one EM iteration
/// at a time and how to score itself; deciding when to stop is left to the
/// caller (see [`fit`](crate::fit::fit)).
///
/// # Example
///
/// ```
/// use pmm::dist::PoissonFamily;
/// use pmm::model::MixtureModel;
/// use rand::SeedableRng;
/// use rand_xoshiro::Xoshiro256PlusPlus;
///
/// let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
/// let mut model = MixtureModel::new(PoissonFamily, 2, 1, &mut rng).unwrap();
///
/// let csv = "a,1\na,2\na,3\nb,50\nb,52\nb,49\n";
/// model.read_csv(csv.as_bytes(), true).unwrap();
///
/// let ln_l0 = {
///     model.step().unwrap();
///     model.ln_likelihood().unwrap()
/// };
/// for _ in 0..10 {
///     model.step().unwrap();
/// }
/// assert!(model.ln_likelihood().unwrap() >= ln_l0);
/// ```
#[derive(Debug, Clone)]
pub struct MixtureModel<Fx: ComponentFamily> {
    family: Fx,
    k: usize,
    d: usize,
    min_group_size: usize,
    params: Vec<Fx::Params>,
    groups: Vec<Group<Fx::Datum>>,
    state: ModelState,
    n_iter: usize,
}

impl<Fx: ComponentFamily> MixtureModel<Fx> {
    /// Create a model with `k` components over `d` dimensions, drawing the
    /// initial component parameters from `rng`.
    pub fn new<R: Rng>(
        family: Fx,
        k: usize,
        d: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if k == 0 {
            return Err(Error::InvalidModel(
                "number of components must be positive".into(),
            ));
        }
        if d == 0 {
            return Err(Error::InvalidModel(
                "dimension must be positive".into(),
            ));
        }
        let params = (0..k).map(|_| family.init_params(d, rng)).collect();
        Ok(MixtureModel {
            family,
            k,
            d,
            min_group_size: 0,
            params,
            groups: Vec::new(),
            state: ModelState::Uninitialized,
            n_iter: 0,
        })
    }

    /// Builder form of [`MixtureModel::set_min_group_size`]
    pub fn with_min_group_size(mut self, min_group_size: usize) -> Self {
        self.min_group_size = min_group_size;
        self
    }

    /// Groups with fewer observations are discarded by every later load
    pub fn set_min_group_size(&mut self, min_group_size: usize) {
        self.min_group_size = min_group_size;
    }

    #[inline]
    pub fn family(&self) -> &Fx {
        &self.family
    }

    /// Number of components
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Dimension of every observation
    #[inline]
    pub fn d(&self) -> usize {
        self.d
    }

    #[inline]
    pub fn min_group_size(&self) -> usize {
        self.min_group_size
    }

    #[inline]
    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Number of EM iterations run since the last load
    #[inline]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// The parameters of each component
    #[inline]
    pub fn params(&self) -> &[Fx::Params] {
        &self.params
    }

    /// The groups, in the order they are held
    #[inline]
    pub fn groups(&self) -> &[Group<Fx::Datum>] {
        &self.groups
    }

    pub fn group(&self, id: &str) -> Option<&Group<Fx::Datum>> {
        self.groups.iter().find(|g| g.id() == id)
    }

    #[inline]
    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    /// Total number of observations over all groups
    pub fn n_observations(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    /// Replace the component parameters
    pub fn set_params(&mut self, params: Vec<Fx::Params>) -> Result<()> {
        if params.len() != self.k {
            return Err(Error::InvalidModel(format!(
                "expected parameters for {} components, got {}",
                self.k,
                params.len()
            )));
        }
        params.iter().enumerate().try_for_each(|(ix, p)| {
            self.family.validate_params(p, self.d).map_err(|msg| {
                Error::InvalidModel(format!("component {}: {}", ix, msg))
            })
        })?;
        self.params = params;
        Ok(())
    }

    /// Replace the held groups with `groups`.
    ///
    /// Groups with fewer than the minimum number of observations are
    /// discarded and every kept group gets uniform latent parameters.
    /// Returns the number of groups kept. Nothing changes if any
    /// observation does not have `d` dimensions.
    pub fn load_groups<I>(&mut self, groups: I) -> Result<usize>
    where
        I: IntoIterator<Item = Group<Fx::Datum>>,
    {
        let groups: Vec<Group<Fx::Datum>> = groups.into_iter().collect();
        let bad = groups.iter().find_map(|g| {
            g.observations()
                .iter()
                .find(|obs| obs.dim() != self.d)
                .map(|obs| (g.id(), obs.dim()))
        });
        if let Some((id, dim)) = bad {
            return Err(Error::InvalidModel(format!(
                "group `{}` holds a {}-D observation, expected {}-D",
                id, dim, self.d
            )));
        }

        let n_total = groups.len();
        let (k, min_group_size) = (self.k, self.min_group_size);
        self.groups = groups
            .into_iter()
            .filter(|g| g.len() >= min_group_size)
            .map(|mut g| {
                g.init_latent(k);
                g
            })
            .collect();
        self.state = ModelState::Loaded;
        self.n_iter = 0;

        info!(
            n_groups = self.groups.len(),
            n_discarded = n_total - self.groups.len(),
            n_observations = self.n_observations(),
            "loaded groups"
        );
        Ok(self.groups.len())
    }

    /// Ingest comma separated records and load the resulting groups.
    ///
    /// With `force_add` the held groups are replaced by the groups found
    /// in `reader`. Without it, records only extend groups already held
    /// and records of unknown groups are dropped.
    pub fn read_csv<R: Read>(
        &mut self,
        reader: R,
        force_add: bool,
    ) -> Result<IngestReport> {
        let mut table: GroupTable<Fx::Datum> = if force_add {
            GroupTable::new()
        } else {
            self.groups.iter().cloned().collect()
        };
        let report = read_records(
            reader,
            &self.family,
            self.d,
            self.k,
            &mut table,
            force_add,
        )?;
        self.load_groups(table.into_groups())?;
        Ok(report)
    }

    /// Load groups from a binary dump, replacing the held groups.
    ///
    /// Groups below the minimum size are skipped without being read. On
    /// error the held groups are left untouched.
    pub fn load_dump<R: Read + Seek>(&mut self, reader: &mut R) -> Result<()> {
        let groups = read_dump(reader, self.d, self.k, self.min_group_size)?;
        self.load_groups(groups)?;
        Ok(())
    }

    /// Write the held groups as a binary dump
    pub fn save_dump<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_dump(writer, self.d, &self.groups)
    }

    /// Bytes per raw value in a dump of this model
    pub fn value_size(&self) -> usize {
        <Fx::Datum as DumpValue>::SIZE
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.state == ModelState::Uninitialized || self.groups.is_empty() {
            Err(Error::NotLoaded)
        } else {
            Ok(())
        }
    }

    /// Recompute every observation's responsibilities from the current
    /// mixing coefficients and component parameters.
    ///
    /// If every component gives an observation zero density, its
    /// responsibilities become uniform instead of being normalized.
    pub fn e_step(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        let family = &self.family;
        let params = &self.params;
        let k = self.k;

        self.groups.par_iter_mut().for_each(|group| {
            let theta = group.theta().to_vec();
            let mut g = vec![0.0; k];
            for obs in group.observations_mut() {
                g.iter_mut()
                    .zip(theta.iter().zip(params.iter()))
                    .for_each(|(gk, (t, p))| *gk = t * family.f(obs.x(), p));
                let denom: f64 = g.iter().sum();
                let gamma = obs.gamma_mut();
                if denom == 0.0 {
                    gamma.fill((k as f64).recip());
                } else {
                    gamma
                        .iter_mut()
                        .zip(g.iter())
                        .for_each(|(gk, v)| *gk = v / denom);
                }
            }
        });
        Ok(())
    }

    /// Recompute every group's mixing coefficients and the component
    /// parameters from the current responsibilities.
    ///
    /// Groups are reduced independently in parallel; their partial
    /// statistics are then merged in group order, so the result does not
    /// depend on scheduling.
    pub fn m_step(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        let family = &self.family;
        let (k, d) = (self.k, self.d);

        let partials: Vec<Vec<Fx::Stat>> = self
            .groups
            .par_iter_mut()
            .map(|group| {
                let mut stats: Vec<Fx::Stat> =
                    (0..k).map(|_| family.empty_stat(d)).collect();
                for obs in group.observations() {
                    stats
                        .iter_mut()
                        .zip(obs.gamma().iter())
                        .for_each(|(stat, &w)| stat.observe(obs.x(), w));
                }
                if !group.is_empty() {
                    let n = group.len() as f64;
                    group
                        .theta_mut()
                        .iter_mut()
                        .zip(stats.iter())
                        .for_each(|(t, stat)| *t = stat.weight() / n);
                }
                stats
            })
            .collect();

        let mut totals: Vec<Fx::Stat> =
            (0..k).map(|_| family.empty_stat(d)).collect();
        for stats in partials {
            totals
                .iter_mut()
                .zip(stats)
                .for_each(|(total, stat)| total.merge(stat));
        }

        self.params = totals
            .iter()
            .enumerate()
            .map(|(ix, stat)| family.update_params(ix, stat))
            .collect::<std::result::Result<Vec<_>, NumericalError>>()?;
        Ok(())
    }

    /// One EM iteration: a full E-step followed by a full M-step
    pub fn step(&mut self) -> Result<()> {
        self.e_step()?;
        self.m_step()?;
        self.n_iter += 1;
        self.state = ModelState::Iterating;
        debug!(iter = self.n_iter, "completed EM iteration");
        Ok(())
    }

    /// Total log-likelihood of all observations.
    ///
    /// A zero mixture density is replaced by the smallest positive normal
    /// `f64` before taking the log. A log term that is not a finite normal
    /// number (zero included) is a numerical failure.
    pub fn ln_likelihood(&self) -> Result<f64> {
        self.ensure_loaded()?;
        let family = &self.family;
        let params = &self.params;

        let per_group: Vec<std::result::Result<f64, NumericalError>> = self
            .groups
            .par_iter()
            .map(|group| {
                group.observations().iter().try_fold(0.0, |acc, obs| {
                    let mix: f64 = group
                        .theta()
                        .iter()
                        .zip(params.iter())
                        .map(|(t, p)| t * family.f(obs.x(), p))
                        .sum();
                    let mix = if mix == 0.0 { f64::MIN_POSITIVE } else { mix };
                    let ln_mix = mix.ln();
                    if ln_mix.is_normal() {
                        Ok(acc + ln_mix)
                    } else {
                        Err(NumericalError::NonFiniteLikelihood {
                            group: group.id().to_owned(),
                            value: ln_mix,
                        })
                    }
                })
            })
            .collect();

        let ln_l = per_group
            .into_iter()
            .sum::<std::result::Result<f64, NumericalError>>()?;
        Ok(ln_l)
    }

    /// Number of free parameters counted by the AIC penalty
    pub fn n_free_params(&self) -> f64 {
        self.family.n_free_params(self.groups.len(), self.d, self.k)
    }

    /// The AIC together with its likelihood and penalty terms
    pub fn aic_report(&self) -> Result<Aic> {
        Ok(Aic::new(self.ln_likelihood()?, self.n_free_params()))
    }

    /// `-2 ln L + 2 p`
    pub fn aic(&self) -> Result<f64> {
        self.aic_report().map(|aic| aic.score())
    }

    /// Statistics of the group sizes, `None` if no groups are held
    pub fn data_stats(&self) -> Option<DataStats> {
        DataStats::from_sizes(self.groups.iter().map(|g| g.len()).collect())
    }

    /// Component indices sorted by the family's parameter order. Ties keep
    /// their index order.
    pub fn component_order(&self) -> Vec<usize> {
        (0..self.k)
            .sorted_by(|&a, &b| {
                self.family.cmp_params(&self.params[a], &self.params[b])
            })
            .collect()
    }

    /// Record that a driver stopped iterating
    pub fn conclude(&mut self, converged: bool) {
        self.state = if converged {
            ModelState::Converged
        } else {
            ModelState::Exhausted
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::{PoissonFamily, PoissonRates};
    use crate::misc::uniform_weights;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    const TOL: f64 = 1E-12;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(0x5eed)
    }

    fn model(k: usize, d: usize) -> MixtureModel<PoissonFamily> {
        MixtureModel::new(PoissonFamily, k, d, &mut rng()).unwrap()
    }

    fn two_cluster_model() -> MixtureModel<PoissonFamily> {
        let mut model = model(2, 1);
        let text = "A,1\nA,2\nA,3\nB,50\nB,52\nB,49\nC,1\nC,0\nC,2\n";
        model.read_csv(text.as_bytes(), true).unwrap();
        model
    }

    #[test]
    fn new_rejects_zero_components_or_dimensions() {
        assert!(MixtureModel::new(PoissonFamily, 0, 1, &mut rng()).is_err());
        assert!(MixtureModel::new(PoissonFamily, 1, 0, &mut rng()).is_err());
    }

    #[test]
    fn initial_rates_lie_in_init_range() {
        let model = model(8, 3);
        assert_eq!(model.state(), ModelState::Uninitialized);
        assert_eq!(model.params().len(), 8);
        model.params().iter().for_each(|p| {
            assert_eq!(p.rates().len(), 3);
            assert!(p.rates().iter().all(|&r| (0.0..100.0).contains(&r)));
        });
    }

    #[test]
    fn seeded_models_start_identically() {
        assert_eq!(model(4, 2).params(), model(4, 2).params());
    }

    #[test]
    fn em_operations_require_data() {
        let mut model = model(2, 1);
        assert!(matches!(model.e_step(), Err(Error::NotLoaded)));
        assert!(matches!(model.m_step(), Err(Error::NotLoaded)));
        assert!(matches!(model.step(), Err(Error::NotLoaded)));
        assert!(matches!(model.ln_likelihood(), Err(Error::NotLoaded)));
        assert!(matches!(model.aic(), Err(Error::NotLoaded)));
    }

    #[test]
    fn set_params_validates_count_and_values() {
        let mut model = model(2, 1);
        assert!(model.set_params(vec![vec![1.0].into()]).is_err());
        assert!(model
            .set_params(vec![vec![1.0].into(), vec![f64::NAN].into()])
            .is_err());
        assert!(model
            .set_params(vec![vec![1.0].into(), vec![1.0, 2.0].into()])
            .is_err());
        model
            .set_params(vec![vec![1.0].into(), vec![2.0].into()])
            .unwrap();
        assert_eq!(model.params()[1], PoissonRates::new(vec![2.0]));
    }

    #[test]
    fn load_discards_small_groups() {
        let mut model = model(2, 1).with_min_group_size(2);
        let text = "a,1\na,2\nb,3\n";
        model.read_csv(text.as_bytes(), true).unwrap();
        assert_eq!(model.n_groups(), 1);
        assert!(model.group("a").is_some());
        assert!(model.group("b").is_none());
        assert_eq!(model.state(), ModelState::Loaded);
    }

    #[test]
    fn read_csv_without_force_add_extends_held_groups() {
        let mut model = model(2, 1);
        model.read_csv("a,1\n".as_bytes(), true).unwrap();
        let report = model.read_csv("a,4\nz,9\n".as_bytes(), false).unwrap();
        assert_eq!(report.n_added, 1);
        assert_eq!(report.n_dropped, 1);
        assert_eq!(model.n_groups(), 1);
        assert_eq!(model.group("a").unwrap().len(), 2);
    }

    #[test]
    fn responsibilities_and_mixing_weights_sum_to_one() {
        let mut model = two_cluster_model();
        for _ in 0..3 {
            model.step().unwrap();
            for group in model.groups() {
                let theta_sum: f64 = group.theta().iter().sum();
                assert::close(theta_sum, 1.0, TOL);
                for obs in group.observations() {
                    let gamma_sum: f64 = obs.gamma().iter().sum();
                    assert::close(gamma_sum, 1.0, TOL);
                }
            }
        }
        assert_eq!(model.n_iter(), 3);
        assert_eq!(model.state(), ModelState::Iterating);
    }

    #[test]
    fn zero_density_gives_uniform_responsibilities() {
        let mut model = model(2, 1);
        model.read_csv("a,5\n".as_bytes(), true).unwrap();
        model
            .set_params(vec![vec![0.0].into(), vec![0.0].into()])
            .unwrap();
        model.e_step().unwrap();
        let gamma = model.groups()[0].observations()[0].gamma();
        assert_eq!(gamma, uniform_weights(2).as_slice());
    }

    #[test]
    fn m_step_rate_is_weighted_mean() {
        let mut model = model(1, 2);
        model.read_csv("a,1,10\na,3,20\nb,5,30\n".as_bytes(), true).unwrap();
        model.m_step().unwrap();
        assert::close(model.params()[0].rates().to_vec(), vec![3.0, 20.0], TOL);
        assert::close(model.groups()[0].theta().to_vec(), vec![1.0], TOL);
    }

    #[test]
    fn m_step_with_dead_component_is_numerical_error() {
        let mut model = model(2, 1);
        model.read_csv("a,5\n".as_bytes(), true).unwrap();
        model
            .set_params(vec![vec![5.0].into(), vec![1000.0].into()])
            .unwrap();
        model.e_step().unwrap();
        // all responsibility goes to the first component
        let res = model.m_step();
        assert!(matches!(res, Err(Error::Numerical(_))));
    }

    #[test]
    fn ln_likelihood_of_single_component_matches_pmf() {
        let mut model = model(1, 1);
        model.read_csv("a,5\na,11\n".as_bytes(), true).unwrap();
        model.set_params(vec![vec![5.3].into()]).unwrap();
        let ln_l = model.ln_likelihood().unwrap();
        assert::close(ln_l, -1.7489576399916658 + -4.4575328197350492, 1E-10);
    }

    #[test]
    fn ln_likelihood_floors_zero_mixture_density() {
        let mut model = model(1, 1);
        model.read_csv("a,5\n".as_bytes(), true).unwrap();
        model.set_params(vec![vec![0.0].into()]).unwrap();
        let ln_l = model.ln_likelihood().unwrap();
        assert_eq!(ln_l, f64::MIN_POSITIVE.ln());
    }

    #[test]
    fn ln_likelihood_rejects_zero_log_term() {
        let mut model = model(1, 1);
        model.read_csv("a,0\na,0\n".as_bytes(), true).unwrap();
        model.set_params(vec![vec![f64::MIN_POSITIVE].into()]).unwrap();
        // mass at zero is exactly one, so the log term is 0.0
        let err = model.ln_likelihood().unwrap_err();
        match err {
            Error::Numerical(NumericalError::NonFiniteLikelihood {
                group,
                value,
            }) => {
                assert_eq!(group, "a");
                assert_eq!(value, 0.0);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(matches!(model.aic(), Err(Error::Numerical(_))));
    }

    #[test]
    fn aic_is_repeatable() {
        let mut model = two_cluster_model();
        model.step().unwrap();
        let a = model.aic().unwrap();
        let b = model.aic().unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
        let report = model.aic_report().unwrap();
        assert_eq!(report.n_free_params(), 8.0);
        assert_eq!(report.score(), a);
    }

    #[test]
    fn component_order_is_lexicographic_and_stable() {
        let mut model = model(4, 2);
        model
            .set_params(vec![
                vec![5.0, 1.0].into(),
                vec![1.0, 9.0].into(),
                vec![5.0, 1.0].into(),
                vec![1.0, 2.0].into(),
            ])
            .unwrap();
        assert_eq!(model.component_order(), vec![3, 1, 0, 2]);
    }

    #[test]
    fn conclude_sets_terminal_state() {
        let mut model = two_cluster_model();
        model.conclude(true);
        assert_eq!(model.state(), ModelState::Converged);
        model.conclude(false);
        assert_eq!(model.state(), ModelState::Exhausted);
    }

    #[test]
    fn data_stats_follow_groups() {
        let model = two_cluster_model();
        let stats = model.data_stats().unwrap();
        assert_eq!(stats.n_groups, 3);
        assert_eq!(stats.n_observations, 9);
        assert_eq!(stats.mean, 3.0);
    }

    proptest! {
        #[test]
        fn em_keeps_latent_parameters_normalized(
            counts in prop::collection::vec((0_usize..4, 0_i32..60), 1..40),
            seed in any::<u64>(),
        ) {
            let text: String = counts
                .iter()
                .map(|(g, x)| format!("g{},{}\n", g, x))
                .collect();
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let mut model =
                MixtureModel::new(PoissonFamily, 3, 1, &mut rng).unwrap();
            model.read_csv(text.as_bytes(), true).unwrap();
            // a component may lose all weight; only check completed steps
            if model.step().is_ok() {
                for group in model.groups() {
                    let s: f64 = group.theta().iter().sum();
                    prop_assert!((s - 1.0).abs() < 1E-9);
                    prop_assert!(group.theta().iter().all(|t| *t >= 0.0));
                }
            }
        }
    }
}
