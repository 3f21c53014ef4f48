//! Private notes and the public note feed.
//!
//! Each user keeps at most one private note per `(house, category)`. Saving
//! blank text removes the note. Every non-blank save also appends an entry to
//! the public feed, which is never edited afterwards.

use crate::catalog::Catalog;
use crate::category::Category;
use crate::error::{require_user, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

type HouseNotes = BTreeMap<String, BTreeMap<Category, String>>;

/// One user's private notes, keyed by house then category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HouseNotes", into = "HouseNotes")]
pub struct UserNotes {
    houses: HouseNotes,
}

impl From<UserNotes> for HouseNotes {
    fn from(notes: UserNotes) -> Self {
        notes.houses
    }
}

impl From<HouseNotes> for UserNotes {
    /// Blank texts are dropped: absence means "no opinion".
    fn from(mut houses: HouseNotes) -> Self {
        for cats in houses.values_mut() {
            cats.retain(|_, text| !text.trim().is_empty());
        }
        houses.retain(|_, cats| !cats.is_empty());
        Self { houses }
    }
}

/// What [`UserNotes::apply`] did to the private note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteChange {
    /// Text was blank; any existing note was removed
    Removed { existed: bool },
    /// The note now holds the new text
    Written,
}

impl UserNotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite or remove the note for `(house, category)`.
    pub fn apply(&mut self, house: &str, category: Category, text: &str) -> NoteChange {
        let text = text.trim();
        if text.is_empty() {
            let existed = match self.houses.get_mut(house) {
                Some(cats) => {
                    let existed = cats.remove(&category).is_some();
                    if cats.is_empty() {
                        self.houses.remove(house);
                    }
                    existed
                }
                None => false,
            };
            return NoteChange::Removed { existed };
        }

        self.houses
            .entry(house.to_string())
            .or_default()
            .insert(category, text.to_string());
        NoteChange::Written
    }

    pub fn get(&self, house: &str, category: Category) -> Option<&str> {
        self.houses
            .get(house)
            .and_then(|cats| cats.get(&category))
            .map(String::as_str)
    }

    /// Notes for one house; empty when there are none.
    pub fn for_house(&self, house: &str) -> BTreeMap<Category, String> {
        self.houses.get(house).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.houses.is_empty()
    }

    /// Number of notes across all houses.
    pub fn len(&self) -> usize {
        self.houses.values().map(BTreeMap::len).sum()
    }

    /// Houses that have at least one note.
    pub fn house_ids(&self) -> impl Iterator<Item = &str> {
        self.houses.keys().map(String::as_str)
    }
}

/// One entry of the public feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicNote {
    pub user: String,
    pub text: String,
    /// Milliseconds since the Unix epoch
    pub date: i64,
}

/// Append-only public notes, keyed by house then category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicFeed {
    houses: BTreeMap<String, BTreeMap<Category, Vec<PublicNote>>>,
}

impl PublicFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, house: &str, category: Category, note: PublicNote) {
        self.houses
            .entry(house.to_string())
            .or_default()
            .entry(category)
            .or_default()
            .push(note);
    }

    /// Entry count per category for a house.
    pub fn summary(&self, house: &str) -> BTreeMap<Category, usize> {
        self.houses
            .get(house)
            .map(|cats| cats.iter().map(|(c, notes)| (*c, notes.len())).collect())
            .unwrap_or_default()
    }

    /// Full feed for one pair, oldest first.
    pub fn feed(&self, house: &str, category: Category) -> &[PublicNote] {
        self.houses
            .get(house)
            .and_then(|cats| cats.get(&category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every user with at least one public note.
    pub fn authors(&self) -> BTreeSet<&str> {
        self.houses
            .values()
            .flat_map(|cats| cats.values())
            .flat_map(|notes| notes.iter().map(|n| n.user.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.houses
            .values()
            .flat_map(|cats| cats.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of [`NotesStore::save_note`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSaved {
    pub change: NoteChange,
    /// Entry appended to the public feed, if any
    pub public: Option<PublicNote>,
}

/// Private notes for every user plus the shared public feed.
///
/// Serialized with the `notes` / `publicNotes` keys of the persisted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesStore {
    #[serde(rename = "notes", default)]
    pub private: BTreeMap<String, UserNotes>,
    #[serde(rename = "publicNotes", default)]
    pub public: PublicFeed,
}

impl NotesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save a note at time `date` (ms since epoch).
    pub fn save_note(
        &mut self,
        catalog: &Catalog,
        user: &str,
        house: &str,
        category: Category,
        text: &str,
        date: i64,
    ) -> Result<NoteSaved> {
        require_user(user)?;
        catalog.require(house)?;

        let notes = self.private.entry(user.to_string()).or_default();
        let change = notes.apply(house, category, text);
        if notes.is_empty() {
            self.private.remove(user);
        }

        let public = match change {
            NoteChange::Written => {
                let note = PublicNote {
                    user: user.to_string(),
                    text: text.trim().to_string(),
                    date,
                };
                self.public.append(house, category, note.clone());
                Some(note)
            }
            NoteChange::Removed { .. } => None,
        };
        Ok(NoteSaved { change, public })
    }

    pub fn private_notes(&self, user: &str, house: &str) -> BTreeMap<Category, String> {
        self.private
            .get(user)
            .map(|notes| notes.for_house(house))
            .unwrap_or_default()
    }

    pub fn public_summary(&self, house: &str) -> BTreeMap<Category, usize> {
        self.public.summary(house)
    }

    pub fn public_feed(&self, house: &str, category: Category) -> &[PublicNote] {
        self.public.feed(house, category)
    }

    /// Users with a private or public note.
    pub fn users(&self) -> BTreeSet<&str> {
        let mut users: BTreeSet<&str> = self.private.keys().map(String::as_str).collect();
        users.extend(self.public.authors());
        users
    }
}
