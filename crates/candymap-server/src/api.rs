//! HTTP API for Candymap.

use crate::error::ApiError;
use crate::node::ServerState;
use crate::storage::Document;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use candymap_core::{
    error::require_user, ranking, Catalog, Category, House, PublicFeed, PublicNote, RankingSnapshot, UserNotes, VisitSet,
    VisitTracker, VoteLedger, VoteRecord, DEFAULT_TOP_LIMIT,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

type AppState = Arc<ServerState>;
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Build the API router.
pub fn build_router(state: AppState, static_dir: Option<&std::path::Path>) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/health", get(health))
        // Catalog
        .route("/api/houses", get(list_houses))
        // Votes
        .route("/api/votes", get(list_votes).post(cast_vote))
        .route("/api/top", get(top_houses))
        // Progress
        .route("/api/progress", get(list_progress))
        .route("/api/progress/:user", get(get_progress).post(save_progress))
        // Notes
        .route("/api/notes/:user", get(get_notes).post(save_notes))
        .route("/api/publicNotes", get(list_public_notes).post(append_public_note))
        .route("/api/publicNotes/:house/:category", get(get_public_feed))
        // Rankings
        .route("/api/ranking", get(list_ranking).post(save_ranking))
        .route("/api/leaderboard", get(leaderboard));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Health endpoints ---

async fn health() -> &'static str {
    "OK"
}

async fn list_houses(State(state): State<AppState>) -> Json<Vec<House>> {
    Json(state.catalog.houses().to_vec())
}

fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Require a present, non-blank field.
///
/// The value is returned as sent. Users and house ids are compared by exact
/// equality, so trimming here would split one user into two.
fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    match field {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::BadRequest(format!("missing {}", name))),
    }
}

/// Find a house that is neither in the catalog nor already stored.
///
/// Stored ids may predate the current catalog; a client sending them back
/// must not be rejected for it.
fn unknown_house<'a>(
    catalog: &Catalog,
    mut sent: impl Iterator<Item = &'a str>,
    stored: impl Fn(&str) -> bool,
) -> candymap_core::Result<()> {
    match sent.find(|house| !catalog.contains(house) && !stored(*house)) {
        Some(house) => Err(candymap_core::Error::UnknownHouse(house.to_string())),
        None => Ok(()),
    }
}

fn parse_category(label: &str) -> Result<Category, ApiError> {
    label
        .parse()
        .map_err(|e: candymap_core::Error| ApiError::BadRequest(e.to_string()))
}

// --- Vote endpoints ---

async fn list_votes(State(state): State<AppState>) -> Json<VoteLedger> {
    Json(state.storage.read(|doc| doc.votes.clone()).await)
}

#[derive(Debug, Deserialize)]
struct CastVoteRequest {
    user: Option<String>,
    house: Option<String>,
    cat: Option<String>,
}

#[derive(Debug, Serialize)]
struct CastVoteResponse {
    ok: bool,
    votes: VoteRecord,
}

async fn cast_vote(
    State(state): State<AppState>,
    payload: Result<Json<CastVoteRequest>, JsonRejection>,
) -> ApiResult<CastVoteResponse> {
    let Json(req) = payload?;
    let user = required(req.user, "user")?;
    let house = required(req.house, "house")?;
    let category = parse_category(&required(req.cat, "cat")?)?;

    let catalog = Arc::clone(&state.catalog);
    let record = state
        .storage
        .update(|doc| {
            doc.votes.cast_vote(&catalog, &user, &house, category)?;
            Ok(doc.votes.record(&house, category).cloned().unwrap_or_default())
        })
        .await
        .inspect_err(|e| tracing::debug!(%user, %house, %category, "vote rejected: {}", e))?;

    tracing::info!(%user, %house, %category, count = record.count(), "vote cast");
    Ok(Json(CastVoteResponse {
        ok: true,
        votes: record,
    }))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn top_houses(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Vec<ranking::HouseScore>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    let top = state
        .storage
        .read(|doc| ranking::top_houses(&state.catalog, &doc.votes, limit))
        .await;
    Ok(Json(top))
}

// --- Progress endpoints ---

async fn list_progress(State(state): State<AppState>) -> Json<VisitTracker> {
    Json(state.storage.read(|doc| doc.progress.clone()).await)
}

async fn get_progress(State(state): State<AppState>, Path(user): Path<String>) -> Json<VisitSet> {
    Json(state.storage.read(|doc| doc.progress.visited(&user)).await)
}

#[derive(Debug, Deserialize)]
struct ProgressRequest {
    #[serde(default)]
    houses: Vec<String>,
}

/// Visit sets only grow, so a save is merged into the stored set.
async fn save_progress(
    State(state): State<AppState>,
    Path(user): Path<String>,
    payload: Result<Json<ProgressRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(req) = payload?;
    let visits: VisitSet = req.houses.into_iter().collect();

    let catalog = Arc::clone(&state.catalog);
    let added = state
        .storage
        .update(|doc| {
            let stored = doc.progress.visited(&user);
            unknown_house(&catalog, visits.iter(), |h| stored.contains(h))?;
            doc.progress.merge(&user, &visits)
        })
        .await
        .inspect_err(|e| tracing::debug!(%user, "progress rejected: {}", e))?;
    if added > 0 {
        tracing::info!(%user, added, "progress saved");
    }
    Ok(ok())
}

// --- Note endpoints ---

async fn get_notes(State(state): State<AppState>, Path(user): Path<String>) -> Json<UserNotes> {
    let notes = state
        .storage
        .read(|doc| doc.notes.private.get(&user).cloned())
        .await;
    Json(notes.unwrap_or_default())
}

/// Replace a user's private notes.
async fn save_notes(
    State(state): State<AppState>,
    Path(user): Path<String>,
    payload: Result<Json<UserNotes>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(notes) = payload?;
    require_user(&user).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let catalog = Arc::clone(&state.catalog);
    state
        .storage
        .update(|doc| {
            let stored = doc.notes.private.get(&user);
            unknown_house(&catalog, notes.house_ids(), |h| {
                stored.is_some_and(|n| n.house_ids().any(|s| s == h))
            })?;
            if notes.is_empty() {
                doc.notes.private.remove(&user);
            } else {
                doc.notes.private.insert(user.clone(), notes);
            }
            Ok(())
        })
        .await
        .inspect_err(|e| tracing::debug!(%user, "notes rejected: {}", e))?;
    tracing::debug!(%user, "private notes saved");
    Ok(ok())
}

async fn list_public_notes(State(state): State<AppState>) -> Json<PublicFeed> {
    Json(state.storage.read(|doc| doc.notes.public.clone()).await)
}

async fn get_public_feed(
    State(state): State<AppState>,
    Path((house, category)): Path<(String, String)>,
) -> ApiResult<Vec<PublicNote>> {
    let category = parse_category(&category)?;
    let feed = state
        .storage
        .read(|doc| doc.notes.public_feed(&house, category).to_vec())
        .await;
    Ok(Json(feed))
}

#[derive(Debug, Deserialize)]
struct PublicNoteRequest {
    house: Option<String>,
    category: Option<String>,
    text: Option<String>,
    user: Option<String>,
}

async fn append_public_note(
    State(state): State<AppState>,
    payload: Result<Json<PublicNoteRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(req) = payload?;
    let house = required(req.house, "house")?;
    let category = parse_category(&required(req.category, "category")?)?;
    let text = required(req.text, "text")?.trim().to_string();
    let user = required(req.user, "user")?;
    state
        .catalog
        .require(&house)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let note = PublicNote {
        user,
        text,
        date: chrono::Utc::now().timestamp_millis(),
    };
    state
        .storage
        .update(|doc| {
            doc.notes.public.append(&house, category, note);
            Ok(())
        })
        .await?;
    tracing::debug!(%house, %category, "public note appended");
    Ok(ok())
}

// --- Ranking endpoints ---

async fn list_ranking(State(state): State<AppState>) -> Json<BTreeMap<String, f64>> {
    Json(state.storage.read(|doc| doc.ranking.clone()).await)
}

#[derive(Debug, Deserialize)]
struct RankingRequest {
    user: Option<String>,
    score: Option<Value>,
}

async fn save_ranking(
    State(state): State<AppState>,
    payload: Result<Json<RankingRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(req) = payload?;
    let user = required(req.user, "user")?;
    let score = req
        .score
        .as_ref()
        .and_then(Value::as_f64)
        .ok_or_else(|| ApiError::BadRequest("score must be a number".into()))?;

    state
        .storage
        .update(|doc| {
            doc.ranking.insert(user, score);
            Ok(())
        })
        .await?;
    Ok(ok())
}

async fn leaderboard(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<RankingSnapshot> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    let snapshot = state
        .storage
        .read(|doc: &Document| {
            ranking::snapshot(&state.catalog, &doc.votes, &doc.progress, &doc.notes, limit)
        })
        .await;
    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use candymap_core::Catalog;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    const CATALOG: &str = r#"[
        {"id": "A", "nome": "Rua A, 1"},
        {"id": "B", "nome": "Rua B, 2"},
        {"id": "C", "nome": "Rua C, 3"}
    ]"#;

    fn setup() -> (Router, TempDir) {
        setup_with(None)
    }

    /// Router over a document that already holds `db`.
    fn setup_with(db: Option<Value>) -> (Router, TempDir) {
        let dir = tempdir().unwrap();
        if let Some(db) = db {
            std::fs::write(dir.path().join("db.json"), db.to_string()).unwrap();
        }
        let storage = Storage::open(dir.path().join("db.json")).unwrap();
        let catalog = Arc::new(Catalog::from_json(CATALOG).unwrap());
        let state = Arc::new(ServerState::new(storage, catalog));
        (build_router(state, None), dir)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_ok() {
        let (app, _dir) = setup();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn vote_once_then_conflict() {
        let (app, _dir) = setup();
        let vote = json!({"user": "bob", "house": "A", "cat": "mais criativa"});

        let (status, body) = send(&app, "POST", "/api/votes", Some(vote.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "votes": {"count": 1, "voters": ["bob"]}}));

        let (status, body) = send(&app, "POST", "/api/votes", Some(vote)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, json!({"ok": false, "message": "already voted"}));

        let (_, votes) = send(&app, "GET", "/api/votes", None).await;
        assert_eq!(votes["A"]["mais criativa"]["count"], 1);
    }

    #[tokio::test]
    async fn vote_validation() {
        let (app, _dir) = setup();
        let cases = [
            json!({"house": "A", "cat": "mais criativa"}),
            json!({"user": "bob", "cat": "mais criativa"}),
            json!({"user": "bob", "house": "A"}),
            json!({"user": "bob", "house": "Z", "cat": "mais criativa"}),
            json!({"user": "bob", "house": "A", "cat": "mais bonita"}),
        ];
        for case in cases {
            let (status, _) = send(&app, "POST", "/api/votes", Some(case.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", case);
        }
        let (_, votes) = send(&app, "GET", "/api/votes", None).await;
        assert_eq!(votes, json!({}));
    }

    #[tokio::test]
    async fn top_includes_zero_vote_houses() {
        let (app, _dir) = setup();
        let (status, top) = send(&app, "GET", "/api/top", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(top, json!([["A", 0], ["B", 0], ["C", 0]]));

        send(&app, "POST", "/api/votes", Some(json!({"user": "bob", "house": "C", "cat": "melhores doces"}))).await;
        let (_, top) = send(&app, "GET", "/api/top?limit=2", None).await;
        assert_eq!(top, json!([["C", 1], ["A", 0]]));

        let (status, _) = send(&app, "GET", "/api/top?limit=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn progress_merges() {
        let (app, _dir) = setup();
        let (status, _) = send(&app, "POST", "/api/progress/ana", Some(json!({"houses": ["A"]}))).await;
        assert_eq!(status, StatusCode::OK);
        // a stale client sending a smaller set loses nothing
        send(&app, "POST", "/api/progress/ana", Some(json!({"houses": ["B"]}))).await;

        let (_, progress) = send(&app, "GET", "/api/progress/ana", None).await;
        assert_eq!(progress, json!(["A", "B"]));

        let (_, unknown) = send(&app, "GET", "/api/progress/nobody", None).await;
        assert_eq!(unknown, json!([]));

        let (status, _) = send(&app, "POST", "/api/progress/ana", Some(json!({"houses": ["Z"]}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, all) = send(&app, "GET", "/api/progress", None).await;
        assert_eq!(all, json!({"ana": ["A", "B"]}));
    }

    #[tokio::test]
    async fn stored_houses_outside_catalog_are_accepted_back() {
        let (app, _dir) = setup_with(Some(json!({
            "progress": {"ana": ["Rua Velha, 7"]},
            "notes": {"ana": {"Rua Velha, 7": {"melhores doces": "paçoca"}}}
        })));

        let (_, progress) = send(&app, "GET", "/api/progress/ana", None).await;
        assert_eq!(progress, json!(["Rua Velha, 7"]));

        // what a client sends after merging stored progress with a new visit
        let union = json!({"houses": ["A", "Rua Velha, 7"]});
        let (status, _) = send(&app, "POST", "/api/progress/ana", Some(union)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, progress) = send(&app, "GET", "/api/progress/ana", None).await;
        assert_eq!(progress, json!(["A", "Rua Velha, 7"]));

        let notes = json!({
            "A": {"mais criativa": "abóboras"},
            "Rua Velha, 7": {"melhores doces": "paçoca"}
        });
        let (status, _) = send(&app, "POST", "/api/notes/ana", Some(notes)).await;
        assert_eq!(status, StatusCode::OK);

        // another user cannot introduce the same unknown id
        let (status, _) = send(&app, "POST", "/api/progress/bob", Some(json!({"houses": ["Rua Velha, 7"]}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(
            &app,
            "POST",
            "/api/notes/bob",
            Some(json!({"Rua Velha, 7": {"melhores doces": "x"}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (_, all) = send(&app, "GET", "/api/progress", None).await;
        assert_eq!(all, json!({"ana": ["A", "Rua Velha, 7"]}));

        let (_, board) = send(&app, "GET", "/api/leaderboard", None).await;
        assert_eq!(board["userRanking"], json!([["ana", 1]]));
    }

    #[tokio::test]
    async fn user_names_are_kept_verbatim() {
        let (app, _dir) = setup();
        send(&app, "POST", "/api/votes", Some(json!({"user": " ana", "house": "A", "cat": "mais criativa"}))).await;
        send(&app, "POST", "/api/progress/%20ana", Some(json!({"houses": ["A"]}))).await;

        let (_, votes) = send(&app, "GET", "/api/votes", None).await;
        assert_eq!(votes["A"]["mais criativa"]["voters"], json!([" ana"]));

        // " ana" and "ana" are different users, and " ana" is listed once
        let (status, _) = send(&app, "POST", "/api/votes", Some(json!({"user": "ana", "house": "A", "cat": "mais criativa"}))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, board) = send(&app, "GET", "/api/leaderboard", None).await;
        assert_eq!(board["userRanking"], json!([[" ana", 1], ["ana", 0]]));

        let (status, _) = send(&app, "POST", "/api/votes", Some(json!({"user": "  ", "house": "A", "cat": "mais criativa"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "POST", "/api/notes/%20", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn private_notes_replace() {
        let (app, _dir) = setup();
        let notes = json!({"A": {"mais criativa": "abóboras gigantes"}});
        let (status, _) = send(&app, "POST", "/api/notes/ana", Some(notes.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let (_, stored) = send(&app, "GET", "/api/notes/ana", None).await;
        assert_eq!(stored, notes);

        let (status, _) = send(&app, "POST", "/api/notes/ana", Some(json!({"A": {"mais bonita": "x"}}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(&app, "POST", "/api/notes/ana", Some(json!({}))).await;
        let (_, stored) = send(&app, "GET", "/api/notes/ana", None).await;
        assert_eq!(stored, json!({}));
    }

    #[tokio::test]
    async fn public_notes_append() {
        let (app, _dir) = setup();
        let note = json!({"house": "A", "category": "mais assustadora", "text": "socorro", "user": "caio"});
        let (status, _) = send(&app, "POST", "/api/publicNotes", Some(note.clone())).await;
        assert_eq!(status, StatusCode::OK);
        send(&app, "POST", "/api/publicNotes", Some(note)).await;

        let (_, feed) = send(&app, "GET", "/api/publicNotes/A/mais%20assustadora", None).await;
        assert_eq!(feed.as_array().unwrap().len(), 2);
        assert_eq!(feed[0]["user"], "caio");
        assert!(feed[0]["date"].is_i64());

        let (status, _) = send(
            &app,
            "POST",
            "/api/publicNotes",
            Some(json!({"house": "A", "category": "mais assustadora", "user": "caio"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ranking_requires_numeric_score() {
        let (app, _dir) = setup();
        let (status, _) = send(&app, "POST", "/api/ranking", Some(json!({"user": "ana", "score": 3}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "POST", "/api/ranking", Some(json!({"user": "ana", "score": "3"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, ranking) = send(&app, "GET", "/api/ranking", None).await;
        assert_eq!(ranking, json!({"ana": 3.0}));
    }

    #[tokio::test]
    async fn leaderboard_combines_stores() {
        let (app, _dir) = setup();
        send(&app, "POST", "/api/progress/ana", Some(json!({"houses": ["A", "B"]}))).await;
        send(&app, "POST", "/api/votes", Some(json!({"user": "bob", "house": "B", "cat": "mais criativa"}))).await;

        let (status, board) = send(&app, "GET", "/api/leaderboard?limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(board["topHouses"], json!([["B", 1], ["A", 0]]));
        assert_eq!(board["userRanking"], json!([["ana", 2], ["bob", 0]]));
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (app, _dir) = setup();
        let request = Request::builder()
            .method("POST")
            .uri("/api/votes")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
