//! Vote ledger: per-house, per-category vote counts and voters.
//!
//! A user can vote at most once per `(house, category)`. The voter list is
//! stored alongside the count so the rule can be enforced without an identity
//! service, and `count == voters.len()` holds for every record.

use crate::catalog::Catalog;
use crate::category::Category;
use crate::error::{require_user, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Votes for one `(house, category)` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredVoteRecord")]
pub struct VoteRecord {
    count: u64,
    voters: Vec<String>,
}

/// Wire shape of a vote record before the invariant is checked.
#[derive(Deserialize)]
struct StoredVoteRecord {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    voters: Vec<String>,
}

impl TryFrom<StoredVoteRecord> for VoteRecord {
    type Error = Error;

    fn try_from(stored: StoredVoteRecord) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for voter in &stored.voters {
            if voter.trim().is_empty() {
                return Err(Error::InvalidRecord("empty voter name".into()));
            }
            if !seen.insert(voter.as_str()) {
                return Err(Error::InvalidRecord(format!("duplicate voter {}", voter)));
            }
        }
        let len = stored.voters.len() as u64;
        match stored.count {
            Some(count) if count != len => Err(Error::InvalidRecord(format!(
                "count {} does not match {} voters",
                count, len
            ))),
            _ => Ok(Self {
                count: len,
                voters: stored.voters,
            }),
        }
    }
}

impl VoteRecord {
    /// Number of votes.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Users who voted, in vote order.
    pub fn voters(&self) -> &[String] {
        &self.voters
    }

    pub fn has_voter(&self, user: &str) -> bool {
        self.voters.iter().any(|v| v == user)
    }

    fn push(&mut self, user: &str) {
        self.voters.push(user.to_string());
        self.count = self.voters.len() as u64;
    }
}

/// All votes, keyed by house id then category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteLedger {
    houses: BTreeMap<String, BTreeMap<Category, VoteRecord>>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cast a vote for a catalog house, returning the new count.
    ///
    /// Fails with [`Error::AlreadyVoted`] and leaves the ledger untouched when
    /// the user already voted for this pair.
    pub fn cast_vote(
        &mut self,
        catalog: &Catalog,
        user: &str,
        house: &str,
        category: Category,
    ) -> Result<u64> {
        catalog.require(house)?;
        self.record_vote(user, house, category).map(VoteRecord::count)
    }

    /// Record a vote without a catalog check.
    ///
    /// Used by stores that persist votes for a house id already validated by
    /// the caller.
    pub fn record_vote(&mut self, user: &str, house: &str, category: Category) -> Result<&VoteRecord> {
        require_user(user)?;
        if self.has_voted(user, house, category) {
            return Err(Error::AlreadyVoted {
                user: user.to_string(),
                house: house.to_string(),
                category,
            });
        }

        let record = self
            .houses
            .entry(house.to_string())
            .or_default()
            .entry(category)
            .or_default();
        record.push(user);
        tracing::debug!(user, house, %category, count = record.count(), "vote recorded");
        Ok(record)
    }

    /// Whether `user` already voted for `(house, category)`.
    pub fn has_voted(&self, user: &str, house: &str, category: Category) -> bool {
        self.record(house, category).is_some_and(|r| r.has_voter(user))
    }

    pub fn record(&self, house: &str, category: Category) -> Option<&VoteRecord> {
        self.houses.get(house).and_then(|cats| cats.get(&category))
    }

    /// Votes for a house by category. Unknown houses yield an empty map.
    pub fn votes(&self, house: &str) -> BTreeMap<Category, VoteRecord> {
        self.houses.get(house).cloned().unwrap_or_default()
    }

    /// Sum of counts across categories for one house.
    pub fn house_total(&self, house: &str) -> u64 {
        self.houses
            .get(house)
            .map(|cats| cats.values().map(VoteRecord::count).sum())
            .unwrap_or(0)
    }

    /// Every user who has voted at least once.
    pub fn voters(&self) -> BTreeSet<&str> {
        self.houses
            .values()
            .flat_map(|cats| cats.values())
            .flat_map(|r| r.voters.iter().map(String::as_str))
            .collect()
    }

    /// Iterate `(house, category, record)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Category, &VoteRecord)> {
        self.houses.iter().flat_map(|(house, cats)| {
            cats.iter().map(move |(cat, record)| (house.as_str(), *cat, record))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.houses.is_empty()
    }
}
