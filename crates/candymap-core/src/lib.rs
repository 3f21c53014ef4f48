//! Candymap core - visit and vote game state
//!
//! Pure, in-memory rules for a location-based "visit and vote" game. Players
//! mark houses as visited, vote at most once per category per house, and leave
//! notes. Nothing in this crate performs I/O; persistence lives behind the
//! gateway in `candymap-gateway` and the server in `candymap-server`.
//!
//! # Stores
//!
//! - [`Catalog`] - the static list of houses, keyed by stable id
//! - [`VoteLedger`] - per-house, per-category counts plus voters
//! - [`VisitTracker`] - per-user visited sets that only grow
//! - [`NotesStore`] - private notes and the append-only public feed
//!
//! # Derived
//!
//! - [`ranking`] - top houses and user ranking, recomputed on every read
//! - [`CompletionWatch`] - edge-triggered "all houses visited" detection
//!
//! # Invariants
//!
//! - `count == voters.len()` for every vote record
//! - a user appears at most once among the voters of a `(house, category)`
//! - a visit set never shrinks

pub mod catalog;
pub mod category;
pub mod completion;
pub mod error;
pub mod ledger;
pub mod notes;
pub mod ranking;
pub mod visits;

pub use catalog::{Catalog, CatalogEntry, Coordinates, House, DEFAULT_COORDINATES};
pub use category::Category;
pub use completion::{CompletionEvent, CompletionWatch, Progress};
pub use error::{Error, ErrorKind, Result};
pub use ledger::{VoteLedger, VoteRecord};
pub use notes::{NoteChange, NoteSaved, NotesStore, PublicFeed, PublicNote, UserNotes};
pub use ranking::{HouseScore, RankingSnapshot, UserScore, DEFAULT_TOP_LIMIT};
pub use visits::{VisitOutcome, VisitSet, VisitTracker};

#[cfg(test)]
mod tests {
    use super::*;

    fn two_houses() -> Catalog {
        Catalog::new(vec![
            House::new("A", "Rua A, 1", DEFAULT_COORDINATES),
            House::new("B", "Rua B, 2", DEFAULT_COORDINATES),
        ])
        .unwrap()
    }

    #[test]
    fn ana_visits_everything_once() {
        let catalog = two_houses();
        let mut visits = VisitTracker::new();
        let mut watch = CompletionWatch::with_baseline(visits.visit_count(&catalog, "ana"), catalog.len());

        let mut fired = 0;
        for house in ["A", "B", "A"] {
            let outcome = visits.mark_visited(&catalog, "ana", house).unwrap();
            if watch.observe(outcome.new_count, catalog.len()).is_some() {
                fired += 1;
            }
        }

        assert!(visits.is_complete(&catalog, "ana"));
        assert_eq!(fired, 1);
        assert_eq!(visits.visit_count(&catalog, "ana"), 2);
    }

    #[test]
    fn bob_votes_twice() {
        let catalog = two_houses();
        let mut ledger = VoteLedger::new();
        let category: Category = "mais criativa".parse().unwrap();

        assert_eq!(ledger.cast_vote(&catalog, "bob", "A", category).unwrap(), 1);
        let again = ledger.cast_vote(&catalog, "bob", "A", category).unwrap_err();
        assert_eq!(again.kind(), ErrorKind::Conflict);
        assert_eq!(ledger.record("A", category).unwrap().count(), 1);
    }
}
