use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use courier_core::api::b64;
use courier_core::constants::MAX_DISCO_SIZE;
use courier_core::{path, Id};

use crate::access::{AccessAction, AccessResource};
use crate::api::{query_param, AppState};
use crate::auth::authorize;
use crate::error::ServerError;

// Disco records carry sealed SDP between a pair of identities. The server
// never sees plaintext; it only enforces ownership and the TTL. Expired
// records are treated as absent and deleted lazily on read.

#[derive(Serialize, Deserialize)]
struct DiscoEnvelope {
    #[serde(with = "b64")]
    data: Vec<u8>,
    expire_at: i64,
}

fn disco_path(sender: &Id, recipient: &Id, typ: &str) -> String {
    path::join(&["disco", &sender.to_string(), &recipient.to_string(), typ])
}

fn parse_typ(typ: &str) -> Result<&str, ServerError> {
    match typ {
        "offer" | "answer" => Ok(typ),
        _ => Err(ServerError::BadRequest("invalid disco type".to_string())),
    }
}

fn parse_id(s: &str, what: &str) -> Result<Id, ServerError> {
    s.parse()
        .map_err(|_| ServerError::BadRequest(format!("invalid {}", what)))
}

pub(crate) async fn put_disco(
    State(state): State<AppState>,
    Path((kid, rid, typ)): Path<(String, String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServerError> {
    let auth = authorize(&state, "PUT", &uri, &headers, Some(&body)).await?;

    let kid = parse_id(&kid, "kid")?;
    let rid = parse_id(&rid, "recipient id")?;
    let typ = parse_typ(&typ)?;
    if auth.kid != kid {
        return Err(ServerError::Forbidden("invalid kid".to_string()));
    }
    state.check_access(
        &auth,
        "PUT",
        uri.path(),
        AccessResource::Disco,
        AccessAction::Put,
    )?;

    let expire_secs = query_param(&uri, "expire")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    if expire_secs == 0 {
        return Err(ServerError::BadRequest("no expire specified".to_string()));
    }

    if body.is_empty() {
        return Err(ServerError::BadRequest("missing body".to_string()));
    }
    if body.len() > MAX_DISCO_SIZE {
        return Err(ServerError::BadRequest(
            "disco too large (greater than 32KiB)".to_string(),
        ));
    }

    let envelope = DiscoEnvelope {
        data: body.to_vec(),
        expire_at: state.now().timestamp_millis() + (expire_secs as i64) * 1000,
    };
    let data =
        serde_json::to_vec(&envelope).map_err(|e| ServerError::Internal(e.to_string()))?;

    let doc_path = disco_path(&kid, &rid, typ);
    info!(path = %doc_path, expire_secs, "save disco");
    state.store.set(&doc_path, &data).await?;

    Ok(Json(serde_json::json!({})))
}

pub(crate) async fn get_disco(
    State(state): State<AppState>,
    Path((kid, rid, typ)): Path<(String, String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Vec<u8>, ServerError> {
    let auth = authorize(&state, "GET", &uri, &headers, None).await?;

    let kid = parse_id(&kid, "kid")?;
    let rid = parse_id(&rid, "recipient id")?;
    let typ = parse_typ(&typ)?;
    // Disco records are fetched by their recipient.
    if auth.kid != rid {
        return Err(ServerError::Forbidden("invalid kid".to_string()));
    }
    state.check_access(
        &auth,
        "GET",
        uri.path(),
        AccessResource::Disco,
        AccessAction::Get,
    )?;

    let doc_path = disco_path(&kid, &rid, typ);
    let Some(doc) = state.store.get(&doc_path).await? else {
        return Err(ServerError::NotFound("disco not found".to_string()));
    };
    let envelope: DiscoEnvelope =
        serde_json::from_slice(&doc.data).map_err(|e| ServerError::Internal(e.to_string()))?;

    if state.now().timestamp_millis() >= envelope.expire_at {
        state.store.delete(&doc_path).await?;
        return Err(ServerError::NotFound("disco not found".to_string()));
    }

    Ok(envelope.data)
}

pub(crate) async fn delete_disco(
    State(state): State<AppState>,
    Path((kid, rid)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ServerError> {
    let auth = authorize(&state, "DELETE", &uri, &headers, None).await?;

    let kid = parse_id(&kid, "kid")?;
    let rid = parse_id(&rid, "recipient id")?;
    if auth.kid != kid {
        return Err(ServerError::Forbidden("invalid kid".to_string()));
    }
    state.check_access(
        &auth,
        "DELETE",
        uri.path(),
        AccessResource::Disco,
        AccessAction::Delete,
    )?;

    state.store.delete(&disco_path(&kid, &rid, "offer")).await?;
    state.store.delete(&disco_path(&kid, &rid, "answer")).await?;

    Ok(Json(serde_json::json!({})))
}
