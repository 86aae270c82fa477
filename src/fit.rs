//! Iterating EM until the log-likelihood settles
use crate::consts::{CONVERGENCE_PATIENCE, CONVERGENCE_TOL, DEFAULT_MAX_ITER};
use crate::error::Result;
use crate::model::MixtureModel;
use crate::traits::ComponentFamily;
use std::time::{Duration, Instant};
use tracing::info;

/// Stopping rules for [`fit`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmConfig {
    /// Maximum number of EM iterations
    pub max_iter: usize,
    /// Run all `max_iter` iterations regardless of convergence
    pub fixed_iter: bool,
    /// Relative log-likelihood change under which an iteration counts as
    /// converged
    pub tol: f64,
    /// Consecutive converged iterations needed to stop
    pub patience: usize,
}

impl Default for EmConfig {
    fn default() -> Self {
        EmConfig {
            max_iter: DEFAULT_MAX_ITER,
            fixed_iter: false,
            tol: CONVERGENCE_TOL,
            patience: CONVERGENCE_PATIENCE,
        }
    }
}

/// Tracks the relative change of a sequence of log-likelihoods.
///
/// The first value only primes the monitor. After that each value whose
/// relative change `|(now - prev) / now|` is under `tol` increments a
/// counter and any other value resets it.
///
/// # Example
///
/// ```
/// use pmm::fit::ConvergenceMonitor;
///
/// let mut monitor = ConvergenceMonitor::new(1E-3, 2);
/// assert!(!monitor.observe(-100.0));
/// assert!(!monitor.observe(-50.0));
/// assert!(!monitor.observe(-50.001));
/// assert!(monitor.observe(-50.002));
/// ```
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    tol: f64,
    patience: usize,
    prev: f64,
    n_seen: usize,
    n_conv: usize,
}

impl ConvergenceMonitor {
    pub fn new(tol: f64, patience: usize) -> Self {
        ConvergenceMonitor {
            tol,
            patience,
            prev: f64::MIN_POSITIVE,
            n_seen: 0,
            n_conv: 0,
        }
    }

    /// The last value observed, `f64::MIN_POSITIVE` before any
    #[inline]
    pub fn prev(&self) -> f64 {
        self.prev
    }

    /// Record `now`; `true` once enough consecutive values have settled
    pub fn observe(&mut self, now: f64) -> bool {
        let settled = if self.n_seen > 0 {
            if ((now - self.prev) / now).abs() < self.tol {
                self.n_conv += 1;
                self.n_conv >= self.patience
            } else {
                self.n_conv = 0;
                false
            }
        } else {
            false
        };
        self.n_seen += 1;
        self.prev = now;
        settled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The log-likelihood settled before the iteration limit
    Converged,
    /// The iteration limit was reached
    Exhausted,
}

/// What happened during a call to [`fit`]
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Number of EM iterations run
    pub n_iter: usize,
    /// Log-likelihood after each iteration
    pub ln_likelihoods: Vec<f64>,
    pub termination: Termination,
    /// Wall time spent iterating
    pub elapsed: Duration,
}

impl FitReport {
    /// The log-likelihood after the final iteration
    pub fn ln_likelihood(&self) -> Option<f64> {
        self.ln_likelihoods.last().copied()
    }
}

/// Run EM iterations on a loaded model until the log-likelihood settles or
/// `config.max_iter` iterations have run.
///
/// The model is left in the [`Converged`](crate::model::ModelState) or
/// [`Exhausted`](crate::model::ModelState) state. Any error from an
/// iteration stops the fit and is returned.
pub fn fit<Fx: ComponentFamily>(
    model: &mut MixtureModel<Fx>,
    config: &EmConfig,
) -> Result<FitReport> {
    let start = Instant::now();
    let mut monitor = ConvergenceMonitor::new(config.tol, config.patience);
    let mut ln_likelihoods: Vec<f64> = Vec::with_capacity(config.max_iter);
    let mut termination = Termination::Exhausted;

    info!(
        k = model.k(),
        d = model.d(),
        max_iter = config.max_iter,
        family = model.family().name(),
        "starting EM"
    );

    for iter in 0..config.max_iter {
        model.step()?;
        let now = model.ln_likelihood()?;
        info!(
            iter = iter + 1,
            ln_likelihood = now,
            delta = now - monitor.prev(),
            "ln likelihood"
        );
        ln_likelihoods.push(now);

        let settled = monitor.observe(now);
        if !config.fixed_iter && settled {
            termination = Termination::Converged;
            break;
        }
    }

    model.conclude(termination == Termination::Converged);
    let elapsed = start.elapsed();
    info!(
        n_iter = ln_likelihoods.len(),
        ?termination,
        elapsed_s = elapsed.as_secs_f64(),
        "finished EM"
    );

    Ok(FitReport {
        n_iter: ln_likelihoods.len(),
        ln_likelihoods,
        termination,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::PoissonFamily;
    use crate::error::Error;
    use crate::model::ModelState;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::io;
    use std::sync::{Arc, Mutex};

    fn loaded_model() -> MixtureModel<PoissonFamily> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let mut model =
            MixtureModel::new(PoissonFamily, 2, 1, &mut rng).unwrap();
        let text = "A,1\nA,2\nA,3\nB,50\nB,52\nB,49\nC,1\nC,0\nC,2\n";
        model.read_csv(text.as_bytes(), true).unwrap();
        model
            .set_params(vec![vec![5.0].into(), vec![30.0].into()])
            .unwrap();
        model
    }

    #[test]
    fn monitor_ignores_first_value() {
        let mut monitor = ConvergenceMonitor::new(1E-3, 1);
        assert!(!monitor.observe(-10.0));
        assert!(monitor.observe(-10.0));
    }

    #[test]
    fn monitor_resets_on_large_change() {
        let mut monitor = ConvergenceMonitor::new(1E-3, 2);
        assert!(!monitor.observe(-10.0));
        assert!(!monitor.observe(-10.0));
        assert!(!monitor.observe(-20.0));
        assert!(!monitor.observe(-20.0));
        assert!(monitor.observe(-20.0));
    }

    #[test]
    fn fit_converges_on_separated_clusters() {
        let mut model = loaded_model();
        let report = fit(&mut model, &EmConfig::default()).unwrap();
        assert_eq!(report.termination, Termination::Converged);
        assert_eq!(model.state(), ModelState::Converged);
        assert_eq!(report.n_iter, report.ln_likelihoods.len());
        assert_eq!(report.n_iter, model.n_iter());
        assert!(report.n_iter >= 4);
        assert!(report.n_iter < 20);
    }

    #[test]
    fn ln_likelihood_does_not_decrease() {
        let mut model = loaded_model();
        let config = EmConfig {
            max_iter: 10,
            fixed_iter: true,
            ..EmConfig::default()
        };
        let report = fit(&mut model, &config).unwrap();
        report
            .ln_likelihoods
            .windows(2)
            .for_each(|w| assert!(w[1] >= w[0] - 1E-9));
    }

    #[test]
    fn fixed_iter_runs_all_iterations() {
        let mut model = loaded_model();
        let config = EmConfig {
            max_iter: 12,
            fixed_iter: true,
            ..EmConfig::default()
        };
        let report = fit(&mut model, &config).unwrap();
        assert_eq!(report.n_iter, 12);
        assert_eq!(report.termination, Termination::Exhausted);
        assert_eq!(model.state(), ModelState::Exhausted);
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn every_iteration_is_logged_at_info() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let mut model = loaded_model();
        let config = EmConfig {
            max_iter: 3,
            fixed_iter: true,
            ..EmConfig::default()
        };
        tracing::subscriber::with_default(subscriber, || {
            fit(&mut model, &config).unwrap();
        });

        let bytes = capture.0.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text
            .lines()
            .filter(|line| line.contains("ln likelihood"))
            .collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains("iter=3"));
        assert!(lines.iter().all(|line| line.contains("delta=")));
    }

    #[test]
    fn fit_without_data_fails() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let mut model =
            MixtureModel::new(PoissonFamily, 2, 1, &mut rng).unwrap();
        let res = fit(&mut model, &EmConfig::default());
        assert!(matches!(res, Err(Error::NotLoaded)));
    }
}
