//! Per-device store backed by RocksDB.
//!
//! Each store is one JSON value under its own key (`votes`, `progress`,
//! `notes`, `publicNotes`, `ranking`), using the same schema as the server
//! document.

use super::{Gateway, Scores};
use crate::error::{Error, Result};
use async_trait::async_trait;
use candymap_core::{
    Category, PublicFeed, PublicNote, UserNotes, VisitSet, VisitTracker, VoteLedger, VoteRecord,
};
use rocksdb::{Options, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;

const VOTES: &str = "votes";
const PROGRESS: &str = "progress";
const NOTES: &str = "notes";
const PUBLIC_NOTES: &str = "publicNotes";
const RANKING: &str = "ranking";

/// Local gateway.
pub struct LocalGateway {
    db: DB,
    /// Held for every read-modify-write cycle.
    write_lock: Mutex<()>,
}

impl LocalGateway {
    /// Open or create the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path.as_ref())?;
        tracing::info!("Opened local store at {:?}", path.as_ref());
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| Error::Corrupt {
                    store: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Load a store; missing or corrupt data reads as empty.
    fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.get(key) {
            Ok(value) => Ok(value.unwrap_or_default()),
            Err(e @ Error::Corrupt { .. }) => {
                tracing::warn!("{}; using empty snapshot", e);
                Ok(T::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Load a store that is about to be rewritten.
    ///
    /// A corrupt value is copied to `<key>.corrupt-<timestamp>` first, so the
    /// write that follows does not destroy it.
    fn load_for_update<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.get(key) {
            Ok(value) => Ok(value.unwrap_or_default()),
            Err(e @ Error::Corrupt { .. }) => {
                if let Some(raw) = self.db.get(key.as_bytes())? {
                    let aside = format!(
                        "{}.corrupt-{}",
                        key,
                        chrono::Utc::now().format("%Y%m%d%H%M%S%3f")
                    );
                    self.db.put(aside.as_bytes(), raw)?;
                    tracing::warn!("{}; moved aside to {}", e, aside);
                }
                Ok(T::default())
            }
            Err(e) => Err(e),
        }
    }

    fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        self.db.put(key.as_bytes(), data)?;
        Ok(())
    }
}

#[async_trait]
impl Gateway for LocalGateway {
    fn mode(&self) -> &'static str {
        "local"
    }

    async fn load_votes(&self) -> Result<VoteLedger> {
        self.load(VOTES)
    }

    async fn cast_vote(&self, user: &str, house: &str, category: Category) -> Result<VoteRecord> {
        let _guard = self.write_lock.lock().await;
        let mut ledger: VoteLedger = self.load_for_update(VOTES)?;
        let record = ledger.record_vote(user, house, category)?.clone();
        self.put(VOTES, &ledger)?;
        Ok(record)
    }

    async fn load_progress(&self, user: &str) -> Result<VisitSet> {
        Ok(self.load::<VisitTracker>(PROGRESS)?.visited(user))
    }

    async fn load_all_progress(&self) -> Result<VisitTracker> {
        self.load(PROGRESS)
    }

    async fn save_progress(&self, user: &str, visits: &VisitSet) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut tracker: VisitTracker = self.load_for_update(PROGRESS)?;
        tracker.merge(user, visits)?;
        self.put(PROGRESS, &tracker)
    }

    async fn load_notes(&self, user: &str) -> Result<UserNotes> {
        let mut all: BTreeMap<String, UserNotes> = self.load(NOTES)?;
        Ok(all.remove(user).unwrap_or_default())
    }

    async fn save_notes(&self, user: &str, notes: &UserNotes) -> Result<()> {
        candymap_core::error::require_user(user)?;
        let _guard = self.write_lock.lock().await;
        let mut all: BTreeMap<String, UserNotes> = self.load_for_update(NOTES)?;
        if notes.is_empty() {
            all.remove(user);
        } else {
            all.insert(user.to_string(), notes.clone());
        }
        self.put(NOTES, &all)
    }

    async fn load_public_notes(&self) -> Result<PublicFeed> {
        self.load(PUBLIC_NOTES)
    }

    async fn append_public_note(
        &self,
        house: &str,
        category: Category,
        note: &PublicNote,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut feed: PublicFeed = self.load_for_update(PUBLIC_NOTES)?;
        feed.append(house, category, note.clone());
        self.put(PUBLIC_NOTES, &feed)
    }

    async fn load_scores(&self) -> Result<Scores> {
        self.load(RANKING)
    }

    async fn save_score(&self, user: &str, score: f64) -> Result<()> {
        candymap_core::error::require_user(user)?;
        let _guard = self.write_lock.lock().await;
        let mut scores: Scores = self.load_for_update(RANKING)?;
        scores.insert(user.to_string(), score);
        self.put(RANKING, &scores)
    }
}
