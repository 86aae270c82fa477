use super::Observation;
use crate::misc::uniform_weights;
use std::collections::HashMap;

/// A named collection of observations sharing a set of mixing
/// coefficients.
///
/// # Example
///
/// ```
/// use pmm::data::{Group, Observation};
///
/// let mut group = Group::new("road-17", 2);
/// group.add_observation(Observation::new(vec![12_i32], 2));
/// group.add_observation(Observation::new(vec![9_i32], 2));
///
/// assert_eq!(group.id(), "road-17");
/// assert_eq!(group.len(), 2);
/// assert_eq!(group.theta(), &[0.5, 0.5]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Group<X> {
    id: String,
    observations: Vec<Observation<X>>,
    theta: Vec<f64>,
}

impl<X> Group<X> {
    /// Create an empty group with uniform mixing coefficients over `k`
    /// components
    pub fn new(id: impl Into<String>, k: usize) -> Self {
        Group {
            id: id.into(),
            observations: Vec::new(),
            theta: uniform_weights(k),
        }
    }

    /// The identifier of the group
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of observations in the group
    #[inline]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// The observations, in insertion order
    #[inline]
    pub fn observations(&self) -> &[Observation<X>] {
        &self.observations
    }

    /// The mixing coefficient of each component
    #[inline]
    pub fn theta(&self) -> &[f64] {
        &self.theta
    }

    /// Append an observation. Latent parameters are left alone until the
    /// next call to [`Group::init_latent`].
    pub fn add_observation(&mut self, obs: Observation<X>) {
        self.observations.push(obs);
    }

    /// Reset the mixing coefficients and every observation's
    /// responsibilities to uniform over `k` components
    pub fn init_latent(&mut self, k: usize) {
        self.theta = uniform_weights(k);
        self.observations
            .iter_mut()
            .for_each(|obs| obs.init_latent(k));
    }

    pub(crate) fn observations_mut(&mut self) -> &mut [Observation<X>] {
        &mut self.observations
    }

    pub(crate) fn theta_mut(&mut self) -> &mut [f64] {
        &mut self.theta
    }
}

/// Groups keyed by identifier, kept in the order they were first seen.
///
/// # Example
///
/// ```
/// use pmm::data::{GroupTable, Observation};
///
/// let mut table: GroupTable<i32> = GroupTable::new();
///
/// // Unknown identifiers are only created when `force_add` is set
/// assert!(table.find_or_insert("a", 1, false).is_none());
///
/// table
///     .find_or_insert("a", 1, true)
///     .unwrap()
///     .add_observation(Observation::new(vec![1], 1));
/// table
///     .find_or_insert("a", 1, false)
///     .unwrap()
///     .add_observation(Observation::new(vec![2], 1));
///
/// assert_eq!(table.len(), 1);
/// assert_eq!(table.get("a").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTable<X> {
    groups: Vec<Group<X>>,
    index: HashMap<String, usize>,
}

impl<X> Default for GroupTable<X> {
    fn default() -> Self {
        GroupTable {
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<X> GroupTable<X> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of observations over all groups
    pub fn n_observations(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    /// Look up a group by identifier
    pub fn get(&self, id: &str) -> Option<&Group<X>> {
        self.index.get(id).map(|&ix| &self.groups[ix])
    }

    /// Look up a group by identifier, creating an empty one with `k`
    /// components if it is absent and `force_add` is set.
    pub fn find_or_insert(
        &mut self,
        id: &str,
        k: usize,
        force_add: bool,
    ) -> Option<&mut Group<X>> {
        let ix = match self.index.get(id).copied() {
            Some(ix) => ix,
            None if force_add => {
                let ix = self.groups.len();
                self.groups.push(Group::new(id, k));
                self.index.insert(id.to_owned(), ix);
                ix
            }
            None => return None,
        };
        Some(&mut self.groups[ix])
    }

    /// Insert a whole group, replacing any group with the same identifier
    pub fn insert(&mut self, group: Group<X>) {
        match self.index.get(group.id()).copied() {
            Some(ix) => self.groups[ix] = group,
            None => {
                self.index.insert(group.id().to_owned(), self.groups.len());
                self.groups.push(group);
            }
        }
    }

    /// Iterate over the groups in first-seen order
    pub fn iter(&self) -> std::slice::Iter<'_, Group<X>> {
        self.groups.iter()
    }

    /// Consume the table, yielding its groups in first-seen order
    pub fn into_groups(self) -> Vec<Group<X>> {
        self.groups
    }
}

impl<X> FromIterator<Group<X>> for GroupTable<X> {
    fn from_iter<I: IntoIterator<Item = Group<X>>>(iter: I) -> Self {
        let mut table = GroupTable::new();
        iter.into_iter().for_each(|g| table.insert(g));
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_observation_leaves_latent_params_alone() {
        let mut group: Group<i32> = Group::new("g", 3);
        group.theta_mut().copy_from_slice(&[0.2, 0.3, 0.5]);
        group.add_observation(Observation::new(vec![4], 3));
        assert_eq!(group.theta(), &[0.2, 0.3, 0.5]);
    }

    #[test]
    fn init_latent_resets_theta_and_gamma() {
        let mut group: Group<i32> = Group::new("g", 2);
        group.add_observation(Observation::new(vec![4], 2));
        group.theta_mut().copy_from_slice(&[0.9, 0.1]);
        group.observations_mut()[0]
            .gamma_mut()
            .copy_from_slice(&[0.7, 0.3]);

        group.init_latent(4);

        assert_eq!(group.theta(), &[0.25; 4]);
        assert_eq!(group.observations()[0].gamma(), &[0.25; 4]);
    }

    #[test]
    fn table_preserves_first_seen_order() {
        let mut table: GroupTable<i32> = GroupTable::new();
        for id in ["c", "a", "b", "a", "c"] {
            table
                .find_or_insert(id, 1, true)
                .unwrap()
                .add_observation(Observation::new(vec![0], 1));
        }
        let ids: Vec<&str> = table.iter().map(|g| g.id()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(table.n_observations(), 5);
    }

    #[test]
    fn insert_replaces_same_identifier() {
        let mut table: GroupTable<i32> = GroupTable::new();
        table.insert(Group::new("x", 1));
        let mut replacement = Group::new("x", 1);
        replacement.add_observation(Observation::new(vec![3], 1));
        table.insert(replacement);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("x").unwrap().len(), 1);
    }
}
