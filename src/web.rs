use crate::semantic::{SearchError, SearchResult, SearchService};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;

const DEFAULT_TOP_K: usize = 10;

#[derive(Clone)]
struct SharedState {
    service: Arc<SearchService>,
}

pub fn router(service: Arc<SearchService>) -> Router {
    let shared_state = Arc::new(SharedState { service });

    Router::new()
        .route("/search", get(search))
        .route("/health", get(health))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

/// Serve the search API on `bind` until Ctrl+C or SIGTERM.
pub async fn serve(service: Arc<SearchService>, bind: SocketAddr) -> anyhow::Result<()> {
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("listening on {bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::warn!("received Ctrl+C, shutting down"),
        _ = terminate => log::warn!("received SIGTERM, shutting down"),
    }
}

#[derive(Debug)]
enum HttpError {
    Validation(String),
    Search(SearchError),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self {
            HttpError::Validation(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": message})),
            ),
            HttpError::Search(err) => {
                log::error!("search failed: {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": err.to_string()})),
                )
            }
        }
        .into_response()
    }
}

impl From<SearchError> for HttpError {
    fn from(err: SearchError) -> Self {
        Self::Search(err)
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    /// Free-text query, at least one character
    pub q: Option<String>,

    /// Maximum number of results
    pub top_k: Option<usize>,
}

impl SearchParams {
    fn validate(self) -> Result<(String, usize), HttpError> {
        let q = match self.q {
            Some(q) if !q.is_empty() => q,
            Some(_) => return Err(HttpError::Validation("q must not be empty".to_string())),
            None => return Err(HttpError::Validation("q is required".to_string())),
        };

        let top_k = self.top_k.unwrap_or(DEFAULT_TOP_K);
        if top_k == 0 {
            return Err(HttpError::Validation(
                "top_k must be a positive integer".to_string(),
            ));
        }

        Ok((q, top_k))
    }
}

async fn search(
    State(state): State<Arc<SharedState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<SearchResult>>, HttpError> {
    let Query(params) = params?;
    log::debug!("params: {params:?}");

    let (q, top_k) = params.validate()?;
    let service = state.service.clone();

    tokio::task::block_in_place(move || {
        service
            .search(&q, top_k)
            .map(Into::into)
            .map_err(Into::into)
    })
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthResponse {
    pub ready: bool,
    pub indexed: usize,
    pub model: String,
}

async fn health(State(state): State<Arc<SharedState>>) -> Json<HealthResponse> {
    let service = &state.service;

    HealthResponse {
        ready: service.is_ready(),
        indexed: service.indexed_count(),
        model: service.model_name().to_string(),
    }
    .into()
}
