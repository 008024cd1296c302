use std::collections::HashMap;

use axum::http::{HeaderMap, Uri};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::Signature;
use tokio::sync::Mutex;
use tracing::debug;

use courier_core::auth::{body_hash, canonical_url, signing_string};
use courier_core::identity::verify_signature;
use courier_core::Id;

use crate::api::AppState;
use crate::error::ServerError;

// Replay detection: a bounded TTL set of observed nonces. Entries expire
// after 2x the allowed clock skew; eviction is lazy on insert.
pub struct NonceCache {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
}

impl NonceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns false when the nonce was already seen within its TTL.
    pub async fn check_and_insert(&self, nonce: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, observed| now - *observed < self.ttl);
        if entries.contains_key(nonce) {
            return false;
        }
        entries.insert(nonce.to_string(), now);
        true
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, observed| now - *observed < self.ttl);
    }
}

#[derive(Debug, Clone)]
pub struct AuthResult {
    pub kid: Id,
    pub nonce: String,
    pub ts: DateTime<Utc>,
}

/// Verify a signed request: parse the Authorization header, check the
/// signature over `METHOD\nCANONICAL_URL`, the timestamp skew, the nonce,
/// and (for requests with one) the body hash.
pub async fn authorize(
    state: &AppState,
    method: &str,
    uri: &Uri,
    headers: &HeaderMap,
    body: Option<&[u8]>,
) -> Result<AuthResult, ServerError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::Unauthorized("missing Authorization header".to_string()))?;

    let (kid, sig_b64) = auth
        .split_once(':')
        .ok_or_else(|| ServerError::Forbidden("invalid auth".to_string()))?;
    let kid: Id = kid
        .parse()
        .map_err(|_| ServerError::Forbidden("invalid auth".to_string()))?;
    let sig_bytes = STANDARD
        .decode(sig_b64)
        .map_err(|_| ServerError::Forbidden("invalid auth".to_string()))?;
    let signature = Signature::from_slice(&sig_bytes)
        .map_err(|_| ServerError::Forbidden("invalid auth".to_string()))?;

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let url = canonical_url(&state.base_url, path_and_query)
        .map_err(|_| ServerError::Forbidden("invalid auth".to_string()))?;

    let msg = signing_string(method, &url);
    verify_signature(&kid, msg.as_bytes(), &signature)
        .map_err(|_| ServerError::Forbidden("verify failed".to_string()))?;

    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    let ts = params
        .get("ts")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| ServerError::Forbidden("invalid auth".to_string()))?;
    let now = state.now();
    if (now - ts).abs() > state.max_skew {
        return Err(ServerError::Forbidden("timestamp out of range".to_string()));
    }

    let nonce = params
        .get("nonce")
        .filter(|n| n.len() >= 32)
        .ok_or_else(|| ServerError::Forbidden("invalid auth".to_string()))?;
    if !state.nonces.check_and_insert(nonce, now).await {
        return Err(ServerError::Forbidden("nonce collision".to_string()));
    }

    if let Some(body) = body {
        if !body.is_empty() {
            let expected = body_hash(body);
            match params.get("bhash") {
                Some(bhash) if *bhash == expected => {}
                _ => return Err(ServerError::Forbidden("verify failed".to_string())),
            }
        }
    }

    debug!(kid = %kid, "authorized");
    Ok(AuthResult {
        kid,
        nonce: nonce.clone(),
        ts,
    })
}
