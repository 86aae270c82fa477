use crate::traits::WeightedStat;

/// Responsibility-weighted Poisson sufficient statistic.
///
/// Holds the total weight and, per dimension, the weighted sum of the
/// observed counts.
#[derive(Debug, Clone, PartialEq)]
pub struct PoissonWeightedStat {
    /// Sum of weights
    weight: f64,
    /// Weighted sum of observations, one entry per dimension
    weighted_sum: Vec<f64>,
}

impl PoissonWeightedStat {
    /// Create a new empty statistic over `d` dimensions
    pub fn new(d: usize) -> Self {
        Self {
            weight: 0.0,
            weighted_sum: vec![0.0; d],
        }
    }

    /// Get the dimension of the statistic
    pub fn dim(&self) -> usize {
        self.weighted_sum.len()
    }

    /// Get the per-dimension weighted sums
    pub fn weighted_sum(&self) -> &[f64] {
        &self.weighted_sum
    }
}

impl WeightedStat for PoissonWeightedStat {
    type Datum = i32;

    fn weight(&self) -> f64 {
        self.weight
    }

    fn observe(&mut self, x: &[i32], w: f64) {
        self.weight += w;
        self.weighted_sum
            .iter_mut()
            .zip(x.iter())
            .for_each(|(acc, &xd)| *acc += w * f64::from(xd));
    }

    fn merge(&mut self, other: Self) {
        self.weight += other.weight;
        self.weighted_sum
            .iter_mut()
            .zip(other.weighted_sum)
            .for_each(|(acc, s)| *acc += s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1E-12;

    #[test]
    fn new_should_be_empty() {
        let stat = PoissonWeightedStat::new(3);
        assert_eq!(stat.weight(), 0.0);
        assert_eq!(stat.weighted_sum(), &[0.0, 0.0, 0.0]);
        assert_eq!(stat.dim(), 3);
    }

    #[test]
    fn observe_weights_each_dimension() {
        let mut stat = PoissonWeightedStat::new(2);
        stat.observe(&[3, 10], 0.25);
        stat.observe(&[1, 0], 0.5);
        assert::close(stat.weight(), 0.75, TOL);
        assert::close(stat.weighted_sum()[0], 1.25, TOL);
        assert::close(stat.weighted_sum()[1], 2.5, TOL);
    }

    #[test]
    fn merge_equals_observing_everything() {
        let xs: [[i32; 2]; 4] = [[1, 2], [5, 0], [7, 7], [0, 3]];
        let ws = [0.1, 0.9, 0.4, 0.6];

        let mut all = PoissonWeightedStat::new(2);
        xs.iter().zip(ws.iter()).for_each(|(x, &w)| all.observe(x, w));

        let mut left = PoissonWeightedStat::new(2);
        let mut right = PoissonWeightedStat::new(2);
        left.observe(&xs[0], ws[0]);
        left.observe(&xs[1], ws[1]);
        right.observe(&xs[2], ws[2]);
        right.observe(&xs[3], ws[3]);
        left.merge(right);

        assert::close(left.weight(), all.weight(), TOL);
        assert::close(
            left.weighted_sum().to_vec(),
            all.weighted_sum().to_vec(),
            TOL,
        );
    }
}
