use axum::body::Body;
use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, Request};
use axum::{Json, Router};
use async_trait::async_trait;
use subtle::ConstantTimeEq;
use tower::ServiceExt;
use tracing::{info, warn};

use courier_core::Id;

use crate::api::AppState;
use crate::auth::authorize;
use crate::error::ServerError;

// Server-side tasks are in-process and non-durable: a task is an internal
// HTTP request dispatched back into the router, authorised with the
// internal bearer token rather than a signed request.
#[async_trait]
pub trait Tasks: Send + Sync {
    async fn create_task(&self, method: &str, path: &str, auth: &str) -> Result<(), ServerError>;
}

pub struct LocalTasks {
    router: Router,
}

impl LocalTasks {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Tasks for LocalTasks {
    async fn create_task(&self, method: &str, path: &str, auth: &str) -> Result<(), ServerError> {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("Authorization", auth)
            .body(Body::empty())
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .map_err(|_| ServerError::Internal("task dispatch failed".to_string()))?;

        if !resp.status().is_success() {
            warn!(path = %path, status = %resp.status(), "task failed");
            return Err(ServerError::Internal(format!(
                "task {} failed: {}",
                path,
                resp.status()
            )));
        }
        Ok(())
    }
}

pub(crate) async fn check(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ServerError> {
    let auth = authorize(&state, "GET", &uri, &headers, None).await?;

    let tasks = state
        .tasks
        .get()
        .cloned()
        .ok_or_else(|| ServerError::Internal("tasks not configured".to_string()))?;

    tasks
        .create_task(
            "POST",
            &format!("/task/check/{}", auth.kid),
            &state.internal_auth,
        )
        .await?;

    Ok(Json(serde_json::json!({})))
}

pub(crate) async fn task_check(
    State(state): State<AppState>,
    Path(kid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ServerError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::Forbidden("no auth token specified".to_string()))?;
    if auth.as_bytes().ct_eq(state.internal_auth.as_bytes()).unwrap_u8() != 1 {
        return Err(ServerError::Forbidden("invalid auth token".to_string()));
    }

    let kid: Id = kid
        .parse()
        .map_err(|_| ServerError::BadRequest("invalid kid".to_string()))?;

    info!(kid = %kid, "check task");
    state.users.check(&kid, state.now()).await?;

    Ok(Json(serde_json::json!({})))
}
