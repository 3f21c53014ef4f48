//! Shared store reached over the server's HTTP API.
//!
//! Votes and public notes are sent as single atomic operations; progress is
//! merged by the server. Every request carries the client timeout, and a
//! timeout is reported as a retryable [`Error::Timeout`].

use super::{Gateway, Scores};
use crate::error::{Error, Result};
use async_trait::async_trait;
use candymap_core::{
    Catalog, Category, House, PublicFeed, PublicNote, UserNotes, VisitSet, VisitTracker,
    VoteLedger, VoteRecord,
};
use reqwest::{Client, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Shared gateway.
pub struct SharedGateway {
    client: Client,
    base: Url,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CastVoteResponse {
    votes: VoteRecord,
}

impl SharedGateway {
    /// Build a gateway for the server at `base` with a per-request timeout.
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!("server URL {} cannot be a base", base)));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            client,
            base,
            timeout,
        })
    }

    /// URL for the given path segments, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn fetch(&self, url: Url) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.body(response).await
    }

    /// GET a store; a body that fails to decode reads as empty.
    async fn load<T: DeserializeOwned + Default>(&self, segments: &[&str]) -> Result<T> {
        let body = self.fetch(self.endpoint(segments)).await?;
        match serde_json::from_slice(&body) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(
                    "store /{} is corrupt ({}); using empty snapshot",
                    segments.join("/"),
                    e
                );
                Ok(T::default())
            }
        }
    }

    async fn post<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.endpoint(segments))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.body(response).await
    }

    async fn body(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        Ok(body.to_vec())
    }

    fn transport_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::Http(error.to_string())
        }
    }
}

/// Pull the server's `error` or `message` field out of a failed response.
fn status_error(status: StatusCode, body: &[u8]) -> Error {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
    Error::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Gateway for SharedGateway {
    fn mode(&self) -> &'static str {
        "shared"
    }

    async fn load_votes(&self) -> Result<VoteLedger> {
        self.load(&["api", "votes"]).await
    }

    async fn cast_vote(&self, user: &str, house: &str, category: Category) -> Result<VoteRecord> {
        let request = json!({ "user": user, "house": house, "cat": category.label() });
        match self.post(&["api", "votes"], &request).await {
            Ok(body) => Ok(serde_json::from_slice::<CastVoteResponse>(&body)?.votes),
            Err(Error::Status { status: 409, .. }) => {
                Err(Error::Domain(candymap_core::Error::AlreadyVoted {
                    user: user.to_string(),
                    house: house.to_string(),
                    category,
                }))
            }
            Err(e) => Err(e),
        }
    }

    async fn load_progress(&self, user: &str) -> Result<VisitSet> {
        self.load(&["api", "progress", user]).await
    }

    async fn load_all_progress(&self) -> Result<VisitTracker> {
        self.load(&["api", "progress"]).await
    }

    async fn save_progress(&self, user: &str, visits: &VisitSet) -> Result<()> {
        let houses: Vec<&str> = visits.iter().collect();
        self.post(&["api", "progress", user], &json!({ "houses": houses }))
            .await?;
        Ok(())
    }

    async fn load_notes(&self, user: &str) -> Result<UserNotes> {
        self.load(&["api", "notes", user]).await
    }

    async fn save_notes(&self, user: &str, notes: &UserNotes) -> Result<()> {
        self.post(&["api", "notes", user], notes).await?;
        Ok(())
    }

    async fn load_public_notes(&self) -> Result<PublicFeed> {
        self.load(&["api", "publicNotes"]).await
    }

    /// The server stamps the entry with its own clock.
    async fn append_public_note(
        &self,
        house: &str,
        category: Category,
        note: &PublicNote,
    ) -> Result<()> {
        let request = json!({
            "house": house,
            "category": category.label(),
            "text": note.text,
            "user": note.user,
        });
        self.post(&["api", "publicNotes"], &request).await?;
        Ok(())
    }

    async fn load_scores(&self) -> Result<Scores> {
        self.load(&["api", "ranking"]).await
    }

    async fn save_score(&self, user: &str, score: f64) -> Result<()> {
        self.post(&["api", "ranking"], &json!({ "user": user, "score": score }))
            .await?;
        Ok(())
    }

    async fn load_catalog(&self) -> Result<Option<Catalog>> {
        let body = self.fetch(self.endpoint(&["api", "houses"])).await?;
        let houses: Vec<House> = serde_json::from_slice(&body).map_err(|e| Error::Corrupt {
            store: "houses".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(Catalog::new(houses)?))
    }
}
