//! HTTP API: question answering, the document catalog, and a health probe.
//!
//! Three JSON endpoints over axum, permissive CORS so browser frontends on
//! other origins can call them directly:
//!
//! - `POST /query`      ask a question, get an answer with sources
//! - `GET  /documents`  list indexed documents
//! - `GET  /health`     liveness probe

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::catalog;
use crate::index::VectorIndex;
use crate::query::QueryEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: QueryEngine,
    pub index: Arc<dyn VectorIndex>,
}

/// Error surfaced to HTTP clients as `{"error": "..."}`.
pub struct AppError(anyhow::Error);

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": self.0.to_string()})),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/query", post(query))
        .route("/documents", get(documents))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(bind, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(default)]
    question: Option<String>,
}

async fn query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    // Body parse failures get the same structured shape as every other
    // error, not the extractor's plain-text rejection.
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": rejection.body_text()})),
            )
                .into_response());
        }
    };

    let question = match request.question.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Missing question field"})),
            )
                .into_response());
        }
    };

    let answer = state.engine.ask(&question).await?;
    Ok(Json(answer).into_response())
}

async fn documents(State(state): State<AppState>) -> Result<Response, AppError> {
    let documents = catalog::list_documents(state.index.as_ref()).await?;
    let count = documents.len();

    let mut body = json!({
        "documents": documents,
        "count": count,
    });
    if count == 0 {
        body["message"] = json!("No documents indexed yet");
    }

    Ok(Json(body).into_response())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
