//! Persistence gateways.
//!
//! A [`Gateway`] is where a session's state lives between runs: either a
//! per-device RocksDB store ([`LocalGateway`]) or the shared server
//! ([`SharedGateway`]). Loads never fail on missing or malformed data; they
//! return the empty snapshot and log a warning. Only an unreachable store
//! surfaces as an error.

mod local;
mod shared;

pub use local::LocalGateway;
pub use shared::SharedGateway;

use crate::error::Result;
use async_trait::async_trait;
use candymap_core::{
    Catalog, Category, PublicFeed, PublicNote, UserNotes, VisitSet, VisitTracker, VoteLedger,
    VoteRecord,
};
use std::collections::BTreeMap;

/// Published scores, user -> score.
pub type Scores = BTreeMap<String, f64>;

/// Storage for votes, progress, notes, the public feed and scores.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Short name for logs (`local` or `shared`).
    fn mode(&self) -> &'static str;

    /// The whole vote ledger.
    async fn load_votes(&self) -> Result<VoteLedger>;

    /// Record one vote atomically and return the updated record.
    ///
    /// A duplicate vote fails with [`candymap_core::Error::AlreadyVoted`].
    async fn cast_vote(&self, user: &str, house: &str, category: Category) -> Result<VoteRecord>;

    /// One user's visited houses.
    async fn load_progress(&self, user: &str) -> Result<VisitSet>;

    /// Every user's visited houses.
    async fn load_all_progress(&self) -> Result<VisitTracker>;

    /// Store a user's visited houses. Visit sets only grow, so the stored set
    /// becomes the union of what was there and `visits`.
    async fn save_progress(&self, user: &str, visits: &VisitSet) -> Result<()>;

    async fn load_notes(&self, user: &str) -> Result<UserNotes>;

    /// Replace a user's private notes.
    async fn save_notes(&self, user: &str, notes: &UserNotes) -> Result<()>;

    async fn load_public_notes(&self) -> Result<PublicFeed>;

    /// Append one entry to the public feed.
    async fn append_public_note(
        &self,
        house: &str,
        category: Category,
        note: &PublicNote,
    ) -> Result<()>;

    async fn load_scores(&self) -> Result<Scores>;

    async fn save_score(&self, user: &str, score: f64) -> Result<()>;

    /// The house catalog, when this store can provide one.
    async fn load_catalog(&self) -> Result<Option<Catalog>> {
        Ok(None)
    }
}
