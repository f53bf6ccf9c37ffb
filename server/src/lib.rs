use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use bookdex::persist::{load_documents, load_index, DocumentTexts, IndexPaths};
use bookdex::tokenizer::split_words;
use bookdex::{Index, Pipeline, QueryOverrides, SearchHit};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<usize>,
    #[serde(rename = "bool")]
    pub mode: Option<String>,
    pub expand: Option<bool>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Serialize)]
pub struct SearchResult {
    pub doc_ref: String,
    pub score: f64,
    pub title: Option<String>,
    pub teaser: Option<String>,
    pub matched_fields: Vec<String>,
}

/// A frozen index together with the raw text used for teasers.
pub struct Loaded {
    pub index: Index,
    pub texts: DocumentTexts,
}

impl Loaded {
    pub fn load(index_dir: &std::path::Path, expected: Option<&Pipeline>) -> Result<Self> {
        let paths = IndexPaths::new(index_dir);
        let index = load_index(&paths, expected)?;
        let texts = match load_documents(&paths) {
            Ok(texts) => texts,
            Err(e) => {
                tracing::warn!(error = %e, "no document texts, teasers disabled");
                DocumentTexts::new()
            }
        };
        Ok(Self { index, texts })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub index_dir: PathBuf,
    /// Swapped wholesale on reload; readers clone the inner `Arc` and drop the lock.
    pub loaded: Arc<RwLock<Arc<Loaded>>>,
    pub expected_pipeline: Option<Pipeline>,
    pub admin_token: Option<String>,
}

impl AppState {
    fn snapshot(&self) -> Arc<Loaded> {
        self.loaded.read().clone()
    }
}

pub fn build_app(index_dir: String, expected_pipeline: Option<Pipeline>) -> Result<Router> {
    // Load index at startup
    let index_dir = PathBuf::from(index_dir);
    let loaded = Loaded::load(&index_dir, expected_pipeline.as_ref())?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    let app_state = AppState {
        index_dir,
        loaded: Arc::new(RwLock::new(Arc::new(loaded))),
        expected_pipeline,
        admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Ok(router(app_state).layer(cors))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_ref", get(doc_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let loaded = state.snapshot();
    let bad_request = |e: bookdex::Error| (StatusCode::BAD_REQUEST, e.to_string());

    let overrides = QueryOverrides {
        mode: params.mode.as_deref().map(str::parse).transpose().map_err(bad_request)?,
        expand: params.expand,
        fields: None,
        limit: params.k.map(|k| k.min(MAX_K)),
    };
    let outcome = loaded.index.query(&params.q, Some(&overrides)).map_err(bad_request)?;

    let teaser_words = loaded.index.config().results_options.teaser_word_count;
    let results = outcome
        .hits
        .into_iter()
        .map(|hit| {
            let fields = loaded.texts.get(&hit.doc_ref);
            SearchResult {
                title: fields.and_then(|f| f.get("title")).cloned(),
                teaser: fields.and_then(|f| build_teaser(&hit, f, loaded.index.pipeline(), teaser_words)),
                matched_fields: hit.matched.keys().cloned().collect(),
                doc_ref: hit.doc_ref,
                score: hit.score,
            }
        })
        .collect();

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits: outcome.total_hits, results }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_ref): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let loaded = state.snapshot();
    match loaded.texts.get(&doc_ref) {
        Some(fields) => Ok(Json(serde_json::json!({ "doc_ref": doc_ref, "fields": fields }))),
        None if loaded.index.contains(&doc_ref) => Ok(Json(serde_json::json!({ "doc_ref": doc_ref, "fields": {} }))),
        None => Err((StatusCode::NOT_FOUND, format!("document {doc_ref} not found"))),
    }
}

/// Load a rebuilt index from disk and swap it in. In-flight searches finish
/// against the snapshot they started with.
async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let index_dir = state.index_dir.clone();
    let expected = state.expected_pipeline.clone();
    let loaded = tokio::task::spawn_blocking(move || Loaded::load(&index_dir, expected.as_ref()))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    let documents = loaded.index.document_count();
    *state.loaded.write() = Arc::new(loaded);
    tracing::info!(documents, "index reloaded");
    Ok(Json(serde_json::json!({ "documents": documents })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

/// Up to `word_count` words around the first matched word, matches wrapped in `<em>`.
///
/// Fields are tried in the order of `hit.matched`; when none of them has text a
/// lead-in from `body` is returned without highlighting.
pub fn build_teaser(
    hit: &SearchHit,
    fields: &BTreeMap<String, String>,
    pipeline: &Pipeline,
    word_count: usize,
) -> Option<String> {
    if word_count == 0 {
        return None;
    }
    for (field, tokens) in &hit.matched {
        let Some(text) = fields.get(field) else { continue };
        let words = split_words(text);
        let hits: BTreeSet<usize> = pipeline
            .analyze(text)
            .into_iter()
            .filter(|t| tokens.contains(&t.text))
            .map(|t| t.position)
            .collect();
        let Some(&first) = hits.iter().next() else { continue };
        let start = first.saturating_sub(word_count / 2).min(words.len().saturating_sub(word_count));
        let end = (start + word_count).min(words.len());
        let teaser = (start..end)
            .map(|i| {
                let word = escape_html(words[i]);
                if hits.contains(&i) { format!("<em>{word}</em>") } else { word }
            })
            .collect::<Vec<_>>()
            .join(" ");
        return Some(teaser);
    }
    let body = fields.get("body")?;
    let lead: Vec<String> = split_words(body).into_iter().take(word_count).map(escape_html).collect();
    (!lead.is_empty()).then(|| lead.join(" "))
}

fn escape_html(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for ch in word.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
