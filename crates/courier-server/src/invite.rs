use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use courier_core::api::{InviteRequest, InviteResponse};
use courier_core::{invite, path, Id};

use crate::access::{AccessAction, AccessResource};
use crate::api::AppState;
use crate::auth::authorize;
use crate::error::ServerError;

/// Invite mappings live for an hour.
const INVITE_TTL_SECS: i64 = 3600;

#[derive(Serialize, Deserialize)]
struct InviteEnvelope {
    sender: Id,
    recipient: Id,
    expire_at: i64,
}

// Codes are keyed by hash so they never appear in stored paths.
fn invite_path(code: &str) -> String {
    let digest = blake3::hash(code.as_bytes());
    path::join(&["invites", digest.to_hex().as_str()])
}

pub(crate) async fn put_invite(
    State(state): State<AppState>,
    Path((kid, rid)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServerError> {
    let auth = authorize(&state, "PUT", &uri, &headers, Some(&body)).await?;

    let kid: Id = kid
        .parse()
        .map_err(|_| ServerError::BadRequest("invalid kid".to_string()))?;
    let rid: Id = rid
        .parse()
        .map_err(|_| ServerError::BadRequest("invalid recipient id".to_string()))?;
    if auth.kid != kid {
        return Err(ServerError::Forbidden("invalid kid".to_string()));
    }
    state.check_access(
        &auth,
        "PUT",
        uri.path(),
        AccessResource::Invite,
        AccessAction::Put,
    )?;

    let req: InviteRequest = serde_json::from_slice(&body)
        .map_err(|_| ServerError::BadRequest("invalid invite code".to_string()))?;
    let code = invite::parse(&req.code)
        .map_err(|_| ServerError::BadRequest("invalid invite code".to_string()))?;

    let doc_path = invite_path(&code);
    let now_ms = state.now().timestamp_millis();

    // A live entry for the same code is never overwritten.
    if let Some(doc) = state.store.get(&doc_path).await? {
        let existing: InviteEnvelope = serde_json::from_slice(&doc.data)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        if existing.expire_at > now_ms {
            return Err(ServerError::BadRequest("invite code collision".to_string()));
        }
    }

    let envelope = InviteEnvelope {
        sender: kid,
        recipient: rid,
        expire_at: now_ms + INVITE_TTL_SECS * 1000,
    };
    let data =
        serde_json::to_vec(&envelope).map_err(|e| ServerError::Internal(e.to_string()))?;
    state.store.set(&doc_path, &data).await?;

    info!(sender = %kid, recipient = %rid, "invite published");
    Ok(Json(serde_json::json!({})))
}

pub(crate) async fn get_invite(
    State(state): State<AppState>,
    Path(code): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<InviteResponse>, ServerError> {
    let auth = authorize(&state, "GET", &uri, &headers, None).await?;
    state.check_access(
        &auth,
        "GET",
        uri.path(),
        AccessResource::Invite,
        AccessAction::Get,
    )?;

    let code = invite::parse(&code)
        .map_err(|_| ServerError::BadRequest("invalid invite code".to_string()))?;

    let doc_path = invite_path(&code);
    let Some(doc) = state.store.get(&doc_path).await? else {
        return Err(ServerError::NotFound("invite not found".to_string()));
    };
    let envelope: InviteEnvelope =
        serde_json::from_slice(&doc.data).map_err(|e| ServerError::Internal(e.to_string()))?;

    if state.now().timestamp_millis() >= envelope.expire_at {
        state.store.delete(&doc_path).await?;
        return Err(ServerError::NotFound("invite not found".to_string()));
    }

    Ok(Json(InviteResponse {
        sender: envelope.sender,
        recipient: envelope.recipient,
    }))
}
