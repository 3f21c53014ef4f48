//! Persistent storage: one JSON document on disk.
//!
//! The document holds every store under the keys `votes`, `progress`, `notes`,
//! `publicNotes` and `ranking`. All mutations go through [`Storage::update`],
//! which holds a single lock for the whole read-modify-write cycle, so two
//! concurrent requests can never overwrite each other's changes.

use crate::error::{Error, Result};
use candymap_core::{NotesStore, VisitTracker, VoteLedger};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// The persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// house -> category -> {count, voters}
    #[serde(default)]
    pub votes: VoteLedger,

    /// user -> visited house ids
    #[serde(default)]
    pub progress: VisitTracker,

    /// `notes` (user -> house -> category -> text) and `publicNotes`
    #[serde(flatten)]
    pub notes: NotesStore,

    /// user -> published score
    #[serde(default)]
    pub ranking: BTreeMap<String, f64>,
}

/// Storage backend for the server.
pub struct Storage {
    path: PathBuf,
    doc: Mutex<Document>,
}

impl Storage {
    /// Open or create the document at the given path.
    ///
    /// A document that fails schema validation is moved aside and replaced by
    /// an empty one instead of stopping the server.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let doc = if path.exists() {
            let raw = std::fs::read(&path)?;
            match serde_json::from_slice::<Document>(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    let aside = corrupt_path(&path);
                    tracing::warn!(
                        "Document {:?} is malformed ({}); moving it to {:?} and starting empty",
                        path,
                        e,
                        aside
                    );
                    std::fs::rename(&path, &aside)?;
                    Document::default()
                }
            }
        } else {
            Document::default()
        };

        if !path.exists() {
            write_sync(&path, &doc)?;
            tracing::info!("Created empty document at {:?}", path);
        }

        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// Read from the current document.
    pub async fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        let doc = self.doc.lock().await;
        f(&doc)
    }

    /// Apply a mutation and write the whole document back.
    ///
    /// The mutation runs on a copy. If it fails, or the write fails, the
    /// in-memory document is left exactly as it was.
    pub async fn update<R>(
        &self,
        f: impl FnOnce(&mut Document) -> candymap_core::Result<R>,
    ) -> Result<R> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        let out = f(&mut next)?;
        self.persist(&next).await?;
        *doc = next;
        Ok(out)
    }

    async fn persist(&self, doc: &Document) -> Result<()> {
        let data = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| Error::Storage(format!("write {:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Storage(format!("rename {:?}: {}", tmp, e)))?;
        Ok(())
    }
}

fn write_sync(path: &Path, doc: &Document) -> Result<()> {
    let data = serde_json::to_vec_pretty(doc)?;
    std::fs::write(path, data)?;
    Ok(())
}

fn corrupt_path(path: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{}", stamp));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candymap_core::{Catalog, Category, House, DEFAULT_COORDINATES};
    use tempfile::tempdir;

    fn catalog() -> Catalog {
        Catalog::new(vec![House::new("A", "Rua A, 1", DEFAULT_COORDINATES)]).unwrap()
    }

    #[tokio::test]
    async fn creates_empty_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        let storage = Storage::open(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for key in ["votes", "progress", "notes", "publicNotes", "ranking"] {
            assert_eq!(raw[key], serde_json::json!({}), "key {}", key);
        }
        assert_eq!(storage.read(|doc| doc.clone()).await, Document::default());
    }

    #[tokio::test]
    async fn update_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        let catalog = catalog();

        let storage = Storage::open(&path).unwrap();
        storage
            .update(|doc| doc.votes.cast_vote(&catalog, "bob", "A", Category::MaisCriativa))
            .await
            .unwrap();
        drop(storage);

        let reopened = Storage::open(&path).unwrap();
        let total = reopened.read(|doc| doc.votes.house_total("A")).await;
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn failed_update_changes_nothing() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("db.json")).unwrap();
        let catalog = catalog();

        let result = storage
            .update(|doc| {
                doc.progress.mark_visited(&catalog, "ana", "A")?;
                doc.votes.cast_vote(&catalog, "", "A", Category::MaisCriativa)
            })
            .await;
        assert!(result.is_err());
        assert_eq!(storage.read(|doc| doc.progress.visit_count(&catalog, "ana")).await, 0);
    }

    #[tokio::test]
    async fn malformed_document_is_moved_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, r#"{"votes": {"A": {"mais criativa": {"count": 5, "voters": []}}}}"#)
            .unwrap();

        let storage = Storage::open(&path).unwrap();
        assert!(storage.read(|doc| doc.votes.is_empty()).await);

        let moved = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().contains(".corrupt-"));
        assert!(moved);
    }

    #[test]
    fn reads_original_document_shape() {
        let json = r#"{
            "votes": {"A": {"mais criativa": {"count": 1, "voters": ["bob"]}}},
            "progress": {"ana": ["A"]},
            "notes": {"ana": {"A": {"melhores doces": "brigadeiro"}}},
            "publicNotes": {"A": {"melhores doces": [{"user": "ana", "text": "brigadeiro", "date": 1730000000000}]}},
            "ranking": {"ana": 1}
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.votes.house_total("A"), 1);
        assert_eq!(doc.progress.visited("ana").len(), 1);
        assert_eq!(
            doc.notes.private_notes("ana", "A")[&Category::MelhoresDoces],
            "brigadeiro"
        );
        assert_eq!(doc.notes.public_feed("A", Category::MelhoresDoces).len(), 1);
        assert_eq!(doc.ranking["ana"], 1.0);
    }
}
