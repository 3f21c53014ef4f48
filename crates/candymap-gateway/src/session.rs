//! One player's session.
//!
//! A [`Session`] owns the player's visit set and private notes, and the
//! completion watch that fires the celebration. Writes go to the gateway as
//! read-modify-write cycles. A failed write is reported to the caller but the
//! in-memory state is kept, and [`Session::sync`] sends it again. Reads that
//! fail fall back to empty snapshots.

use crate::error::Result;
use crate::gateway::{Gateway, Scores};
use candymap_core::{
    error::require_user, ranking, Catalog, Category, CompletionEvent, CompletionWatch,
    NoteChange, NoteSaved, NotesStore, Progress, PublicFeed, PublicNote, RankingSnapshot,
    UserNotes, VisitOutcome, VisitSet, VisitTracker, VoteLedger, VoteRecord,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Result of [`Session::mark_visited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    pub outcome: VisitOutcome,
    /// Set when this visit completed the catalog
    pub completed: Option<CompletionEvent>,
}

/// Writes that have not reached the gateway yet.
#[derive(Debug, Default)]
struct Pending {
    progress: bool,
    notes: bool,
    public: VecDeque<(String, Category, PublicNote)>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        !self.progress && !self.notes && self.public.is_empty()
    }
}

/// Session state for one user.
pub struct Session {
    user: String,
    catalog: Arc<Catalog>,
    gateway: Arc<dyn Gateway>,
    visits: VisitSet,
    notes: UserNotes,
    completion: CompletionWatch,
    pending: Pending,
}

/// Use an empty snapshot when a read fails.
fn degrade<T: Default>(store: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(store, "read failed ({}); using empty snapshot", e);
        T::default()
    })
}

impl Session {
    /// Load the user's progress and notes.
    ///
    /// The loaded visit count is the completion baseline: opening a session
    /// that is already complete does not fire the celebration.
    pub async fn open(user: &str, catalog: Arc<Catalog>, gateway: Arc<dyn Gateway>) -> Result<Self> {
        require_user(user)?;
        let visits = degrade("progress", gateway.load_progress(user).await);
        let notes = degrade("notes", gateway.load_notes(user).await);
        let completion = CompletionWatch::with_baseline(visits.count_in(&catalog), catalog.len());

        tracing::info!(
            user,
            mode = gateway.mode(),
            visited = visits.count_in(&catalog),
            total = catalog.len(),
            "session opened"
        );

        Ok(Self {
            user: user.to_string(),
            catalog,
            gateway,
            visits,
            notes,
            completion,
            pending: Pending::default(),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn visits(&self) -> &VisitSet {
        &self.visits
    }

    /// Catalog houses visited. Stored ids outside the catalog are not counted.
    pub fn visit_count(&self) -> usize {
        self.visits.count_in(&self.catalog)
    }

    /// Every catalog house has been visited.
    pub fn is_complete(&self) -> bool {
        !self.catalog.is_empty() && self.visits.count_in(&self.catalog) == self.catalog.len()
    }

    /// Progress as last observed by the completion watch.
    pub fn progress(&self) -> Progress {
        self.completion.state()
    }

    /// Whether some write failed and is waiting for [`Session::sync`].
    pub fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }

    // --- Writes ---

    /// Mark a house visited. Visiting a house twice changes nothing.
    pub async fn mark_visited(&mut self, house: &str) -> Result<Visit> {
        self.catalog.require(house)?;
        let added = self.visits.insert(house);

        if added || self.pending.progress {
            self.pending.progress = true;
            self.flush_progress().await?;
        }

        let outcome = VisitOutcome {
            already_visited: !added,
            new_count: self.visit_count(),
        };
        let completed = self.observe_completion();
        if added {
            tracing::info!(user = %self.user, house, count = outcome.new_count, "house visited");
            self.publish_score().await;
        }
        Ok(Visit { outcome, completed })
    }

    /// Vote for a house in a category. Each user votes once per pair.
    pub async fn cast_vote(&self, house: &str, category: Category) -> Result<VoteRecord> {
        self.catalog.require(house)?;
        let record = self
            .gateway
            .cast_vote(&self.user, house, category)
            .await
            .inspect_err(|e| tracing::warn!(user = %self.user, house, %category, "vote failed: {}", e))?;
        tracing::info!(user = %self.user, house, %category, count = record.count(), "vote cast");
        Ok(record)
    }

    /// Write, overwrite or (with blank text) delete a private note.
    ///
    /// Non-blank text is also appended to the public feed.
    pub async fn save_note(&mut self, house: &str, category: Category, text: &str) -> Result<NoteSaved> {
        self.catalog.require(house)?;

        if !self.pending.notes {
            match self.gateway.load_notes(&self.user).await {
                Ok(stored) => self.notes = stored,
                Err(e) => tracing::warn!("could not refresh notes ({}); using cached copy", e),
            }
        }

        let change = self.notes.apply(house, category, text);
        let public = match change {
            NoteChange::Written => {
                let note = PublicNote {
                    user: self.user.clone(),
                    text: text.trim().to_string(),
                    date: chrono::Utc::now().timestamp_millis(),
                };
                self.pending
                    .public
                    .push_back((house.to_string(), category, note.clone()));
                Some(note)
            }
            NoteChange::Removed { .. } => None,
        };
        self.pending.notes = true;
        self.flush_notes().await?;

        tracing::debug!(user = %self.user, house, %category, ?change, "note saved");
        Ok(NoteSaved { change, public })
    }

    /// Send pending writes and pull changes made elsewhere.
    ///
    /// Returns the completion event if the merged progress completed the
    /// catalog.
    pub async fn sync(&mut self) -> Result<Option<CompletionEvent>> {
        let before = self.visits.len();
        self.pending.progress = true;
        self.flush_progress().await?;

        if self.pending.notes || !self.pending.public.is_empty() {
            self.flush_notes().await?;
        } else {
            self.notes = degrade("notes", self.gateway.load_notes(&self.user).await);
        }

        let completed = self.observe_completion();
        if self.visits.len() != before || completed.is_some() {
            self.publish_score().await;
        }
        tracing::info!(user = %self.user, visited = self.visit_count(), "session synced");
        Ok(completed)
    }

    fn observe_completion(&mut self) -> Option<CompletionEvent> {
        self.completion
            .observe(self.visits.count_in(&self.catalog), self.catalog.len())
    }

    async fn flush_progress(&mut self) -> Result<()> {
        match self.gateway.load_progress(&self.user).await {
            Ok(stored) => {
                self.visits.merge(&stored);
            }
            Err(e) => tracing::warn!("could not load stored progress ({})", e),
        }
        self.gateway
            .save_progress(&self.user, &self.visits)
            .await
            .inspect_err(|e| tracing::warn!(user = %self.user, "progress not saved: {}", e))?;
        self.pending.progress = false;
        Ok(())
    }

    async fn flush_notes(&mut self) -> Result<()> {
        if self.pending.notes {
            self.gateway
                .save_notes(&self.user, &self.notes)
                .await
                .inspect_err(|e| tracing::warn!(user = %self.user, "notes not saved: {}", e))?;
            self.pending.notes = false;
        }
        while let Some((house, category, note)) = self.pending.public.front() {
            self.gateway
                .append_public_note(house, *category, note)
                .await
                .inspect_err(|e| tracing::warn!("public note not sent: {}", e))?;
            self.pending.public.pop_front();
        }
        Ok(())
    }

    /// Publish the visit count as this user's score. Failures are only logged.
    async fn publish_score(&self) {
        let score = self.visits.count_in(&self.catalog) as f64;
        if let Err(e) = self.gateway.save_score(&self.user, score).await {
            tracing::warn!(user = %self.user, "score not published: {}", e);
        }
    }

    // --- Reads ---

    async fn ledger(&self) -> VoteLedger {
        degrade("votes", self.gateway.load_votes().await)
    }

    async fn feed(&self) -> PublicFeed {
        degrade("publicNotes", self.gateway.load_public_notes().await)
    }

    /// Votes per category for one house.
    pub async fn votes(&self, house: &str) -> BTreeMap<Category, VoteRecord> {
        self.ledger().await.votes(house)
    }

    pub async fn house_total(&self, house: &str) -> u64 {
        self.ledger().await.house_total(house)
    }

    pub async fn has_voted(&self, house: &str, category: Category) -> bool {
        self.ledger().await.has_voted(&self.user, house, category)
    }

    /// This user's private notes for a house.
    pub fn private_notes(&self, house: &str) -> BTreeMap<Category, String> {
        self.notes.for_house(house)
    }

    /// Number of public notes per category for a house.
    pub async fn public_summary(&self, house: &str) -> BTreeMap<Category, usize> {
        self.feed().await.summary(house)
    }

    /// Public notes for one house and category, oldest first.
    pub async fn public_feed(&self, house: &str, category: Category) -> Vec<PublicNote> {
        self.feed().await.feed(house, category).to_vec()
    }

    pub async fn top_houses(&self, limit: usize) -> Vec<ranking::HouseScore> {
        ranking::top_houses(&self.catalog, &self.ledger().await, limit)
    }

    pub async fn user_ranking(&self) -> Vec<ranking::UserScore> {
        let (ledger, tracker, notes) = self.ranking_inputs().await;
        ranking::user_ranking(&self.catalog, &ledger, &tracker, &notes)
    }

    pub async fn snapshot(&self, limit: usize) -> RankingSnapshot {
        let (ledger, tracker, notes) = self.ranking_inputs().await;
        ranking::snapshot(&self.catalog, &ledger, &tracker, &notes, limit)
    }

    /// Published scores of every user.
    pub async fn scores(&self) -> Scores {
        degrade("ranking", self.gateway.load_scores().await)
    }

    /// Stored state plus anything this session has not written yet.
    ///
    /// Other users' private notes are not readable through every gateway, so
    /// only this user's notes are included.
    async fn ranking_inputs(&self) -> (VoteLedger, VisitTracker, NotesStore) {
        let ledger = self.ledger().await;
        let mut tracker = degrade("progress", self.gateway.load_all_progress().await);
        if let Err(e) = tracker.merge(&self.user, &self.visits) {
            tracing::debug!("own progress not merged: {}", e);
        }
        let mut notes = NotesStore {
            public: self.feed().await,
            ..NotesStore::default()
        };
        if !self.notes.is_empty() {
            notes.private.insert(self.user.clone(), self.notes.clone());
        }
        (ledger, tracker, notes)
    }
}
