use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use tracing::info;

use courier_core::api::SigchainResponse;
use courier_core::constants::MAX_MESSAGE_SIZE;
use courier_core::{path, Id};

use courier_store::{DocumentsOpts, StoreError};

use crate::access::{AccessAction, AccessResource};
use crate::api::AppState;
use crate::auth::authorize;
use crate::error::ServerError;

// Statements live at /sigchain/{kid}-{seq}; the zero-padded sequence keeps
// string order equal to statement order.
pub(crate) fn statement_path(kid: &Id, seq: u64) -> String {
    path::join(&["sigchain", &format!("{}-{:09}", kid, seq)])
}

pub(crate) fn statement_prefix(kid: &Id) -> String {
    format!("{}-", kid)
}

fn parse_kid(s: &str) -> Result<Id, ServerError> {
    s.parse()
        .map_err(|_| ServerError::BadRequest("invalid kid".to_string()))
}

fn parse_seq(s: &str) -> Result<u64, ServerError> {
    match s.parse::<u64>() {
        Ok(seq) if seq >= 1 => Ok(seq),
        _ => Err(ServerError::BadRequest("invalid seq".to_string())),
    }
}

pub(crate) async fn get_sigchain(
    State(state): State<AppState>,
    Path(kid): Path<String>,
) -> Result<Json<SigchainResponse>, ServerError> {
    let kid = parse_kid(&kid)?;

    let docs = state
        .store
        .documents(
            "/sigchain",
            &DocumentsOpts {
                prefix: Some(statement_prefix(&kid)),
                ..Default::default()
            },
        )
        .await?;
    if docs.is_empty() {
        return Err(ServerError::NotFound("sigchain not found".to_string()));
    }

    let mut statements = Vec::with_capacity(docs.len());
    for doc in docs {
        let st: serde_json::Value = serde_json::from_slice(&doc.data)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        statements.push(st);
    }

    Ok(Json(SigchainResponse { kid, statements }))
}

pub(crate) async fn get_statement(
    State(state): State<AppState>,
    Path((kid, seq)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let kid = parse_kid(&kid)?;
    let seq = parse_seq(&seq)?;

    let doc = state
        .store
        .get(&statement_path(&kid, seq))
        .await?
        .ok_or_else(|| ServerError::NotFound("statement not found".to_string()))?;
    let st: serde_json::Value =
        serde_json::from_slice(&doc.data).map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(Json(st))
}

pub(crate) async fn put_statement(
    State(state): State<AppState>,
    Path((kid, seq)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServerError> {
    let auth = authorize(&state, "PUT", &uri, &headers, Some(&body)).await?;

    let kid = parse_kid(&kid)?;
    let seq = parse_seq(&seq)?;
    if auth.kid != kid {
        return Err(ServerError::Forbidden("invalid kid".to_string()));
    }
    state.check_access(
        &auth,
        "PUT",
        uri.path(),
        AccessResource::Sigchain,
        AccessAction::Put,
    )?;

    if body.is_empty() {
        return Err(ServerError::BadRequest("missing body".to_string()));
    }
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(ServerError::BadRequest(
            "statement too large (greater than 16KiB)".to_string(),
        ));
    }
    if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
        return Err(ServerError::BadRequest("invalid statement".to_string()));
    }

    let doc_path = statement_path(&kid, seq);
    info!(path = %doc_path, "save statement");
    match state.store.create(&doc_path, &body).await {
        Ok(()) => Ok(Json(serde_json::json!({}))),
        Err(StoreError::AlreadyExists(_)) => Err(ServerError::BadRequest(
            "statement already exists".to_string(),
        )),
        Err(err) => Err(err.into()),
    }
}
