//! Rankings derived on demand from the vote ledger and visit tracker.
//!
//! Nothing here is stored, so a ranking can never be stale relative to the
//! stores it was computed from.

use crate::catalog::Catalog;
use crate::ledger::VoteLedger;
use crate::notes::NotesStore;
use crate::visits::VisitTracker;
use serde::Serialize;
use std::collections::BTreeSet;

/// Default `limit` for [`top_houses`] when the caller gives none.
pub const DEFAULT_TOP_LIMIT: usize = 5;

/// `(house id, total votes)`, serialized as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HouseScore(pub String, pub u64);

/// `(user, visit count)`, serialized as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserScore(pub String, pub usize);

/// Both rankings computed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingSnapshot {
    pub top_houses: Vec<HouseScore>,
    pub user_ranking: Vec<UserScore>,
}

/// Houses by total votes, highest first, truncated to `limit`.
///
/// Houses without votes count as zero. Ties keep catalog order.
pub fn top_houses(catalog: &Catalog, ledger: &VoteLedger, limit: usize) -> Vec<HouseScore> {
    let mut scores: Vec<HouseScore> = catalog
        .iter()
        .map(|house| HouseScore(house.id.clone(), ledger.house_total(&house.id)))
        .collect();
    // stable sort keeps catalog order among equal totals
    scores.sort_by(|a, b| b.1.cmp(&a.1));
    scores.truncate(limit);
    scores
}

/// Known users by visit count, highest first; ties by user id.
///
/// A user is known once they voted, visited or wrote a note. Only visits to
/// houses in `catalog` are counted.
pub fn user_ranking(
    catalog: &Catalog,
    ledger: &VoteLedger,
    visits: &VisitTracker,
    notes: &NotesStore,
) -> Vec<UserScore> {
    let mut known: BTreeSet<&str> = ledger.voters();
    known.extend(visits.users());
    known.extend(notes.users());

    let mut ranking: Vec<UserScore> = known
        .into_iter()
        .map(|user| UserScore(user.to_string(), visits.visit_count(catalog, user)))
        .collect();
    // `known` is sorted, so a stable sort leaves ties in user-id order
    ranking.sort_by(|a, b| b.1.cmp(&a.1));
    ranking
}

/// Compute both rankings.
pub fn snapshot(
    catalog: &Catalog,
    ledger: &VoteLedger,
    visits: &VisitTracker,
    notes: &NotesStore,
    limit: usize,
) -> RankingSnapshot {
    RankingSnapshot {
        top_houses: top_houses(catalog, ledger, limit),
        user_ranking: user_ranking(catalog, ledger, visits, notes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{House, DEFAULT_COORDINATES};
    use crate::category::Category;
    use proptest::prelude::*;

    fn catalog(ids: &[&str]) -> Catalog {
        Catalog::new(
            ids.iter()
                .map(|id| House::new(*id, *id, DEFAULT_COORDINATES))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn zero_votes_in_catalog_order() {
        let catalog = catalog(&["A", "B", "C"]);
        let top = top_houses(&catalog, &VoteLedger::new(), DEFAULT_TOP_LIMIT);
        assert_eq!(
            serde_json::to_value(&top).unwrap(),
            serde_json::json!([["A", 0], ["B", 0], ["C", 0]])
        );
    }

    #[test]
    fn sorted_by_total_then_catalog_order() {
        let catalog = catalog(&["A", "B", "C", "D"]);
        let mut ledger = VoteLedger::new();
        ledger.cast_vote(&catalog, "ana", "C", Category::MaisCriativa).unwrap();
        ledger.cast_vote(&catalog, "bob", "C", Category::MaisCriativa).unwrap();
        ledger.cast_vote(&catalog, "ana", "B", Category::MelhoresDoces).unwrap();
        ledger.cast_vote(&catalog, "ana", "D", Category::MelhoresDoces).unwrap();

        let top = top_houses(&catalog, &ledger, 3);
        assert_eq!(
            top,
            [
                HouseScore("C".into(), 2),
                HouseScore("B".into(), 1),
                HouseScore("D".into(), 1),
            ]
        );
    }

    #[test]
    fn limit_zero_is_empty() {
        let catalog = catalog(&["A"]);
        assert!(top_houses(&catalog, &VoteLedger::new(), 0).is_empty());
    }

    #[test]
    fn users_known_from_any_store() {
        let catalog = catalog(&["A", "B"]);
        let mut ledger = VoteLedger::new();
        let mut visits = VisitTracker::new();
        let mut notes = NotesStore::new();

        visits.mark_visited(&catalog, "ana", "A").unwrap();
        visits.mark_visited(&catalog, "ana", "B").unwrap();
        visits.mark_visited(&catalog, "duda", "A").unwrap();
        ledger.cast_vote(&catalog, "bob", "A", Category::MaisCriativa).unwrap();
        notes
            .save_note(&catalog, "caio", "A", Category::MaisAssustadora, "medo", 0)
            .unwrap();

        let ranking = user_ranking(&catalog, &ledger, &visits, &notes);
        assert_eq!(
            ranking,
            [
                UserScore("ana".into(), 2),
                UserScore("duda".into(), 1),
                UserScore("bob".into(), 0),
                UserScore("caio".into(), 0),
            ]
        );
    }

    #[test]
    fn stored_visits_outside_catalog_score_zero() {
        let catalog = catalog(&["A", "B"]);
        let mut visits = VisitTracker::new();
        visits
            .merge("ana", &["Rua Velha, 7", "A"].into_iter().collect())
            .unwrap();
        visits
            .merge("bob", &["Rua Velha, 7", "Rua Velha, 9"].into_iter().collect())
            .unwrap();

        let ranking = user_ranking(&catalog, &VoteLedger::new(), &visits, &NotesStore::new());
        assert_eq!(
            ranking,
            [UserScore("ana".into(), 1), UserScore("bob".into(), 0)]
        );
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let catalog = catalog(&["A"]);
        let snap = snapshot(
            &catalog,
            &VoteLedger::new(),
            &VisitTracker::new(),
            &NotesStore::new(),
            5,
        );
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["topHouses"], serde_json::json!([["A", 0]]));
        assert_eq!(json["userRanking"], serde_json::json!([]));
    }

    proptest! {
        #[test]
        fn top_houses_sorted_and_complete(
            votes in proptest::collection::vec((0usize..5, 0usize..5, 0usize..4), 0..80),
            limit in 0usize..8,
        ) {
            let ids = ["A", "B", "C", "D", "E"];
            let catalog = catalog(&ids);
            let users = ["u0", "u1", "u2", "u3", "u4"];
            let mut ledger = VoteLedger::new();
            for (u, h, c) in votes {
                let _ = ledger.cast_vote(&catalog, users[u], ids[h], Category::ALL[c]);
            }

            let top = top_houses(&catalog, &ledger, limit);
            prop_assert_eq!(top.len(), limit.min(ids.len()));
            for pair in top.windows(2) {
                prop_assert!(pair[0].1 >= pair[1].1);
                if pair[0].1 == pair[1].1 {
                    prop_assert!(catalog.position(&pair[0].0) < catalog.position(&pair[1].0));
                }
            }
            for HouseScore(id, total) in &top {
                prop_assert_eq!(*total, ledger.house_total(id));
            }
        }
    }
}
