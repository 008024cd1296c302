use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use tracing::info;

use courier_core::{path, Id};
use courier_store::{DocumentStore, DocumentsOpts};

use crate::api::AppState;
use crate::error::ServerError;
use crate::sigchain::statement_prefix;

// Serves and refreshes the per-identity profile document. Full identity
// verification (social proofs etc.) is an external subsystem; the server's
// part is storing the result and re-deriving the summary from the sigchain
// when the check task runs.
pub struct UserStore {
    store: Arc<dyn DocumentStore>,
}

impl UserStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn user_path(kid: &Id) -> String {
        path::join(&["user", &kid.to_string()])
    }

    pub async fn get(&self, kid: &Id) -> Result<Option<serde_json::Value>, ServerError> {
        match self.store.get(&Self::user_path(kid)).await? {
            Some(doc) => {
                let value = serde_json::from_slice(&doc.data)
                    .map_err(|e| ServerError::Internal(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Re-derive the profile document from the identity's sigchain.
    pub async fn check(&self, kid: &Id, now: DateTime<Utc>) -> Result<(), ServerError> {
        let statements = self
            .store
            .documents(
                "/sigchain",
                &DocumentsOpts {
                    prefix: Some(statement_prefix(kid)),
                    path_only: true,
                    ..Default::default()
                },
            )
            .await?;

        let profile = serde_json::json!({
            "kid": kid.to_string(),
            "statements": statements.len(),
            "checked_at": now.timestamp_millis(),
        });
        let data =
            serde_json::to_vec(&profile).map_err(|e| ServerError::Internal(e.to_string()))?;
        self.store.set(&Self::user_path(kid), &data).await?;

        info!(kid = %kid, statements = statements.len(), "user checked");
        Ok(())
    }
}

pub(crate) async fn get_user(
    State(state): State<AppState>,
    Path(kid): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let kid: Id = kid
        .parse()
        .map_err(|_| ServerError::BadRequest("invalid kid".to_string()))?;

    match state.users.get(&kid).await? {
        Some(user) => Ok(Json(user)),
        None => Err(ServerError::NotFound("user not found".to_string())),
    }
}
