use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::store::{PgtStore, StoreError};

#[derive(Clone)]
pub struct CallbackState {
    store: Arc<dyn PgtStore>,
}

/// Query parameters CAS sends to the callback.
#[derive(Debug, Default, Deserialize)]
struct ReceiveParams {
    #[serde(rename = "pgtId")]
    pgt_id: Option<String>,
    #[serde(rename = "pgtIou")]
    pgt_iou: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrieveParams {
    #[serde(rename = "pgtIou")]
    pgt_iou: Option<String>,
}

/// Build the callback router around `store`.
///
/// - `GET|POST /receive_pgt?pgtId=..&pgtIou=..` stores a PGT delivered by CAS
/// - `GET /retrieve_pgt?pgtIou=..` hands the PGT out once
pub fn build_app(store: Arc<dyn PgtStore>) -> Router {
    let state = CallbackState { store };

    Router::new()
        .route("/health", get(health))
        .route("/receive_pgt", get(receive_pgt).post(receive_pgt))
        .route("/retrieve_pgt", get(retrieve_pgt))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn receive_pgt(State(state): State<CallbackState>, Query(params): Query<ReceiveParams>) -> Response {
    match (present(params.pgt_id), present(params.pgt_iou)) {
        // CAS probes the callback URL with no parameters before trusting it.
        (None, None) => (
            StatusCode::OK,
            "No pgtId or pgtIou supplied; nothing was stored. This endpoint receives proxy-granting tickets from CAS.",
        )
            .into_response(),
        (None, Some(_)) => (StatusCode::BAD_REQUEST, "pgtId is a required parameter.").into_response(),
        (Some(_), None) => (StatusCode::BAD_REQUEST, "pgtIou is a required parameter.").into_response(),
        (Some(pgt), Some(pgt_iou)) => {
            let store = Arc::clone(&state.store);
            let key = pgt_iou.clone();
            match blocking(move || store.put(&key, &pgt)).await {
                Ok(()) => {
                    tracing::info!(pgt_iou = %pgt_iou, "stored proxy-granting ticket");
                    (StatusCode::OK, "PGT received. Thank you!").into_response()
                }
                Err(err) => store_failure(err),
            }
        }
    }
}

async fn retrieve_pgt(State(state): State<CallbackState>, Query(params): Query<RetrieveParams>) -> Response {
    let Some(pgt_iou) = present(params.pgt_iou) else {
        return (StatusCode::BAD_REQUEST, "pgtIou is a required parameter.").into_response();
    };

    let store = Arc::clone(&state.store);
    let key = pgt_iou.clone();
    match blocking(move || store.pop(&key)).await {
        Ok(Some(pgt)) => {
            tracing::debug!(pgt_iou = %pgt_iou, "handed out proxy-granting ticket");
            (StatusCode::OK, pgt).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            format!("pgtIou={pgt_iou} does not exist. It may already have been retrieved."),
        )
            .into_response(),
        Err(err) => store_failure(err),
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Store operations may take a file lock; keep them off the async workers.
async fn blocking<T, F>(op: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|err| StoreError::Unavailable(err.to_string()))?
}

fn store_failure(err: StoreError) -> Response {
    tracing::error!(error = %err, "pgt store operation failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "The PGT store is unavailable.").into_response()
}
