//! Visit tracking: which houses each user has visited.
//!
//! Visit sets only grow. Marking a house twice is a no-op, not an error, and
//! there is no way to un-visit.

use crate::catalog::Catalog;
use crate::error::{require_user, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Set of visited house ids for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitSet {
    houses: BTreeSet<String>,
}

impl VisitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a house. Returns `false` if it was already present.
    pub fn insert(&mut self, house: &str) -> bool {
        if self.houses.contains(house) {
            return false;
        }
        self.houses.insert(house.to_string())
    }

    pub fn contains(&self, house: &str) -> bool {
        self.houses.contains(house)
    }

    pub fn len(&self) -> usize {
        self.houses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.houses.is_empty()
    }

    /// Union `other` into this set, returning how many houses were new.
    pub fn merge(&mut self, other: &VisitSet) -> usize {
        let before = self.houses.len();
        self.houses.extend(other.houses.iter().cloned());
        self.houses.len() - before
    }

    /// Number of visited houses that are part of `catalog`.
    pub fn count_in(&self, catalog: &Catalog) -> usize {
        self.houses.iter().filter(|h| catalog.contains(h)).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.houses.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for VisitSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            houses: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of [`VisitTracker::mark_visited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitOutcome {
    /// The house had been visited before this call
    pub already_visited: bool,
    /// Catalog houses visited after this call
    pub new_count: usize,
}

/// Visit sets for every user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitTracker {
    users: BTreeMap<String, VisitSet>,
}

impl VisitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a catalog house as visited by `user`.
    pub fn mark_visited(&mut self, catalog: &Catalog, user: &str, house: &str) -> Result<VisitOutcome> {
        require_user(user)?;
        catalog.require(house)?;

        let set = self.users.entry(user.to_string()).or_default();
        let added = set.insert(house);
        if added {
            tracing::debug!(user, house, count = set.len(), "house visited");
        }
        Ok(VisitOutcome {
            already_visited: !added,
            new_count: set.count_in(catalog),
        })
    }

    /// Union a whole visit set into `user`'s set. Returns the number of new houses.
    pub fn merge(&mut self, user: &str, visits: &VisitSet) -> Result<usize> {
        require_user(user)?;
        Ok(self.users.entry(user.to_string()).or_default().merge(visits))
    }

    /// Number of catalog houses visited by `user` (0 for unknown users).
    ///
    /// Stored ids that are no longer in the catalog are not counted.
    pub fn visit_count(&self, catalog: &Catalog, user: &str) -> usize {
        self.users
            .get(user)
            .map(|set| set.count_in(catalog))
            .unwrap_or(0)
    }

    /// True once `user` has visited every house of a non-empty catalog.
    pub fn is_complete(&self, catalog: &Catalog, user: &str) -> bool {
        !catalog.is_empty()
            && self
                .users
                .get(user)
                .is_some_and(|set| set.count_in(catalog) == catalog.len())
    }

    /// Visit set for `user`; empty for unknown users.
    pub fn visited(&self, user: &str) -> VisitSet {
        self.users.get(user).cloned().unwrap_or_default()
    }

    /// Users with at least one visit.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(user, _)| user.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VisitSet)> {
        self.users.iter().map(|(user, set)| (user.as_str(), set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{House, DEFAULT_COORDINATES};
    use crate::error::Error;
    use proptest::prelude::*;

    fn catalog() -> Catalog {
        Catalog::new(vec![
            House::new("A", "Rua A, 1", DEFAULT_COORDINATES),
            House::new("B", "Rua B, 2", DEFAULT_COORDINATES),
        ])
        .unwrap()
    }

    #[test]
    fn visiting_twice_is_a_no_op() {
        let catalog = catalog();
        let mut tracker = VisitTracker::new();

        let first = tracker.mark_visited(&catalog, "ana", "A").unwrap();
        assert_eq!(first, VisitOutcome { already_visited: false, new_count: 1 });

        let second = tracker.mark_visited(&catalog, "ana", "A").unwrap();
        assert_eq!(second, VisitOutcome { already_visited: true, new_count: 1 });
        assert_eq!(tracker.visit_count(&catalog, "ana"), 1);
    }

    #[test]
    fn complete_after_every_house() {
        let catalog = catalog();
        let mut tracker = VisitTracker::new();
        tracker.mark_visited(&catalog, "ana", "A").unwrap();
        assert!(!tracker.is_complete(&catalog, "ana"));
        tracker.mark_visited(&catalog, "ana", "B").unwrap();
        assert!(tracker.is_complete(&catalog, "ana"));
        assert!(!tracker.is_complete(&catalog, "bob"));
    }

    #[test]
    fn empty_catalog_is_never_complete() {
        let tracker = VisitTracker::new();
        assert!(!tracker.is_complete(&Catalog::default(), "ana"));
    }

    #[test]
    fn rejects_unknown_house_and_blank_user() {
        let catalog = catalog();
        let mut tracker = VisitTracker::new();
        assert!(matches!(
            tracker.mark_visited(&catalog, "ana", "Z"),
            Err(Error::UnknownHouse(_))
        ));
        assert!(matches!(
            tracker.mark_visited(&catalog, " ", "A"),
            Err(Error::EmptyUser)
        ));
        assert_eq!(tracker.users().count(), 0);
    }

    #[test]
    fn merge_is_a_union() {
        let mut tracker = VisitTracker::new();
        tracker.merge("ana", &["A"].into_iter().collect()).unwrap();
        let added = tracker.merge("ana", &["A", "B"].into_iter().collect()).unwrap();
        assert_eq!(added, 1);
        assert_eq!(tracker.visit_count(&catalog(), "ana"), 2);
    }

    #[test]
    fn retired_houses_are_not_counted() {
        let catalog = catalog();
        let mut tracker = VisitTracker::new();
        tracker
            .merge("ana", &["Rua Velha, 7"].into_iter().collect())
            .unwrap();

        let outcome = tracker.mark_visited(&catalog, "ana", "A").unwrap();
        assert_eq!(outcome.new_count, 1);
        assert_eq!(tracker.visit_count(&catalog, "ana"), 1);
        assert_eq!(tracker.visited("ana").len(), 2);

        tracker.mark_visited(&catalog, "ana", "B").unwrap();
        assert!(tracker.is_complete(&catalog, "ana"));
    }

    #[test]
    fn stored_shape_is_user_to_list() {
        let json = r#"{"ana": ["A", "B"], "bob": []}"#;
        let tracker: VisitTracker = serde_json::from_str(json).unwrap();
        assert_eq!(tracker.visit_count(&catalog(), "ana"), 2);
        assert_eq!(tracker.users().collect::<Vec<_>>(), ["ana"]);
        assert_eq!(serde_json::to_string(&tracker).unwrap(), r#"{"ana":["A","B"],"bob":[]}"#);
    }

    proptest! {
        #[test]
        fn visit_count_never_decreases(visits in proptest::collection::vec(0usize..2, 0..30)) {
            let catalog = catalog();
            let houses = ["A", "B"];
            let mut tracker = VisitTracker::new();
            let mut last = 0;
            for h in visits {
                let outcome = tracker.mark_visited(&catalog, "ana", houses[h]).unwrap();
                prop_assert!(outcome.new_count >= last);
                prop_assert_eq!(outcome.already_visited, outcome.new_count == last);
                last = outcome.new_count;
            }
        }
    }
}
