use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{OriginalUri, Path, State};
use axum::http::HeaderMap;
use axum::Json;
use tracing::info;

use courier_core::api::{Direction, Message, MessageResponse, MessagesResponse, Metadata};
use courier_core::constants::{MAX_CHANNEL_LEN, MAX_MESSAGE_SIZE};
use courier_core::rand_id::message_id;
use courier_core::{path, Id};

use crate::access::{AccessAction, AccessResource};
use crate::api::{query_param, AppState};
use crate::auth::authorize;
use crate::error::ServerError;

// TODO: Message expiry

const MSG_CHANGES: &str = "msg-changes";

fn message_path(sender: &Id, recipient: &Id, channel: &str, id: &str) -> String {
    path::join(&[
        "messages",
        &format!("{}-{}-{}-{}", sender, recipient, channel, id),
    ])
}

fn feed_name(sender: &Id, recipient: &Id, channel: &str) -> String {
    format!("{}-{}-{}-{}", MSG_CHANGES, sender, recipient, channel)
}

fn channel_param(uri: &axum::http::Uri) -> Result<String, ServerError> {
    let channel = query_param(uri, "channel").unwrap_or_else(|| "default".to_string());
    if channel.is_empty() {
        return Ok("default".to_string());
    }
    if channel.len() > MAX_CHANNEL_LEN {
        return Err(ServerError::BadRequest("channel name too long".to_string()));
    }
    Ok(channel)
}

fn parse_id(s: &str, what: &str) -> Result<Id, ServerError> {
    s.parse()
        .map_err(|_| ServerError::BadRequest(format!("invalid {}", what)))
}

pub(crate) async fn post_message(
    State(state): State<AppState>,
    Path((kid, rid)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ServerError> {
    let auth = authorize(&state, "POST", &uri, &headers, Some(&body)).await?;

    let kid = parse_id(&kid, "kid")?;
    let rid = parse_id(&rid, "recipient id")?;
    if auth.kid != kid {
        return Err(ServerError::Forbidden("invalid kid".to_string()));
    }
    state.check_access(
        &auth,
        "POST",
        uri.path(),
        AccessResource::Message,
        AccessAction::Put,
    )?;

    let channel = channel_param(&uri)?;

    if body.is_empty() {
        return Err(ServerError::BadRequest("missing body".to_string()));
    }
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(ServerError::BadRequest(
            "message too large (greater than 16KiB)".to_string(),
        ));
    }

    let id = message_id();
    let msg = Message {
        id: id.clone(),
        data: body.to_vec(),
        path: None,
    };
    let msg_bytes =
        serde_json::to_vec(&msg).map_err(|e| ServerError::Internal(e.to_string()))?;

    let doc_path = message_path(&kid, &rid, &channel, &id);
    info!(path = %doc_path, "save message");
    state.store.create(&doc_path, &msg_bytes).await?;

    let mirror_path = message_path(&rid, &kid, &channel, &id);
    if kid != rid {
        info!(path = %mirror_path, "save message (recipient)");
        state.store.create(&mirror_path, &msg_bytes).await?;
    }

    state
        .changes
        .add(&feed_name(&kid, &rid, &channel), &doc_path)
        .await?;
    if kid != rid {
        state
            .changes
            .add(&feed_name(&rid, &kid, &channel), &mirror_path)
            .await?;
    }

    Ok(Json(MessageResponse { id }))
}

pub(crate) async fn list_messages(
    State(state): State<AppState>,
    Path((kid, rid)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<MessagesResponse>, ServerError> {
    let auth = authorize(&state, "GET", &uri, &headers, None).await?;

    let kid = parse_id(&kid, "kid")?;
    let rid = parse_id(&rid, "recipient id")?;
    if auth.kid != kid {
        return Err(ServerError::Forbidden("invalid kid".to_string()));
    }
    state.check_access(
        &auth,
        "GET",
        uri.path(),
        AccessResource::Message,
        AccessAction::Get,
    )?;

    let channel = channel_param(&uri)?;

    let version = match query_param(&uri, "version") {
        None => 0,
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| ServerError::BadRequest("invalid version".to_string()))?,
    };
    let direction = match query_param(&uri, "direction") {
        None => Direction::Asc,
        Some(d) => Direction::from_param(&d)
            .ok_or_else(|| ServerError::BadRequest("invalid direction".to_string()))?,
    };
    let limit = match query_param(&uri, "limit") {
        None => 1000,
        Some(l) => {
            let l = l
                .parse::<usize>()
                .map_err(|_| ServerError::BadRequest("invalid limit".to_string()))?;
            if l == 0 || l > 1000 {
                return Err(ServerError::BadRequest("invalid limit".to_string()));
            }
            l
        }
    };
    let include_md = query_param(&uri, "include")
        .map(|inc| inc.split(',').any(|f| f == "md"))
        .unwrap_or(false);

    let feed = feed_name(&kid, &rid, &channel);
    if version == 0 && !state.changes.exists(&feed).await? {
        return Err(ServerError::NotFound("messages not found".to_string()));
    }

    let (changes, next) = state.changes.list(&feed, version, direction, limit).await?;

    let mut messages = Vec::with_capacity(changes.len());
    let mut metadata = BTreeMap::new();
    for change in changes {
        let Some(doc) = state.store.get(&change.path).await? else {
            continue;
        };
        let mut msg: Message = serde_json::from_slice(&doc.data)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        msg.path = Some(doc.path.clone());
        let metadata_value = Metadata {
            created_at: doc.created_at_millis(),
            updated_at: doc.updated_at_millis(),
        };
        metadata.insert(doc.path, metadata_value);
        messages.push(msg);
    }

    Ok(Json(MessagesResponse {
        kid,
        messages,
        version: next.to_string(),
        metadata: include_md.then_some(metadata),
    }))
}
