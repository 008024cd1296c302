use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, Uri};
use axum::routing::{delete, get, post, put};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use url::form_urlencoded;

use courier_store::{ChangeLog, DocumentStore, NowFn};

use crate::access::{self, AccessAction, AccessContext, AccessFn, AccessResource};
use crate::auth::{AuthResult, NonceCache};
use crate::error::ServerError;
use crate::tasks::{LocalTasks, Tasks};
use crate::user::UserStore;
use crate::{disco, invite, messages, sigchain, tasks, user};

/// Maximum allowed clock skew between a signed request and the server.
pub const MAX_SKEW_SECS: i64 = 60;

/// Everything a handler needs. One instance per server; tests build fully
/// isolated copies, nothing is process-global.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub changes: Arc<ChangeLog>,
    pub nonces: Arc<NonceCache>,
    pub users: Arc<UserStore>,
    pub internal_auth: String,
    pub base_url: String,
    pub max_skew: Duration,
    access_fn: Arc<StdMutex<AccessFn>>,
    now_fn: Arc<StdMutex<NowFn>>,
    pub(crate) tasks: Arc<OnceLock<Arc<dyn Tasks>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, base_url: String, internal_auth: String) -> Self {
        let changes = Arc::new(ChangeLog::new(store.clone()));
        let users = Arc::new(UserStore::new(store.clone()));
        Self {
            store,
            changes,
            nonces: Arc::new(NonceCache::new(Duration::seconds(2 * MAX_SKEW_SECS))),
            users,
            internal_auth,
            base_url,
            max_skew: Duration::seconds(MAX_SKEW_SECS),
            access_fn: Arc::new(StdMutex::new(access::allow_all())),
            now_fn: Arc::new(StdMutex::new(Arc::new(Utc::now))),
            tasks: Arc::new(OnceLock::new()),
        }
    }

    /// Inject a clock for tests; also rewires the store and change log.
    pub fn set_time_now(&self, now_fn: NowFn) {
        self.store.set_time_now(now_fn.clone());
        self.changes.set_time_now(now_fn.clone());
        let mut guard = self.now_fn.lock().expect("clock lock");
        *guard = now_fn;
    }

    pub fn set_access_fn(&self, access_fn: AccessFn) {
        let mut guard = self.access_fn.lock().expect("access lock");
        *guard = access_fn;
    }

    pub fn now(&self) -> DateTime<Utc> {
        let now_fn = self.now_fn.lock().expect("clock lock");
        now_fn()
    }

    pub(crate) fn check_access(
        &self,
        auth: &AuthResult,
        method: &str,
        path: &str,
        resource: AccessResource,
        action: AccessAction,
    ) -> Result<(), ServerError> {
        let ctx = AccessContext {
            kid: auth.kid,
            method: method.to_string(),
            path: path.to_string(),
        };
        let access_fn = self.access_fn.lock().expect("access lock");
        match access_fn(&ctx, resource, action) {
            access::Access::Allow => Ok(()),
            access::Access::Deny { code, message } => {
                Err(ServerError::AccessDenied { code, message })
            }
        }
    }
}

/// First value for `name` in the request query, percent-decoded.
pub(crate) fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

async fn not_found() -> ServerError {
    ServerError::NotFound("not found".to_string())
}

async fn method_not_allowed() -> ServerError {
    ServerError::MethodNotAllowed
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let router = Router::new()
        .route("/sigchain/{kid}", get(sigchain::get_sigchain))
        .route(
            "/sigchain/{kid}/{seq}",
            get(sigchain::get_statement).put(sigchain::put_statement),
        )
        .route("/user/{kid}", get(user::get_user))
        .route(
            "/msgs/{kid}/{rid}",
            post(messages::post_message).get(messages::list_messages),
        )
        .route(
            "/disco/{kid}/{rid}/{typ}",
            put(disco::put_disco).get(disco::get_disco),
        )
        .route("/disco/{kid}/{rid}", delete(disco::delete_disco))
        .route("/invite/{kid}/{rid}", put(invite::put_invite))
        .route("/invite/{code}", get(invite::get_invite))
        .route("/check", get(tasks::check))
        .route("/task/check/{kid}", post(tasks::task_check))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Tasks dispatch back into this router in-process.
    let _ = state.tasks.set(Arc::new(LocalTasks::new(router.clone())));

    router
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "starting exchange server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        let uri: Uri = "/msgs/a/b?channel=default&limit=5".parse().unwrap();
        assert_eq!(query_param(&uri, "channel").as_deref(), Some("default"));
        assert_eq!(query_param(&uri, "limit").as_deref(), Some("5"));
        assert_eq!(query_param(&uri, "missing"), None);
    }

    #[test]
    fn test_query_param_decodes() {
        let uri: Uri = "/invite?code=a+b%20c".parse().unwrap();
        assert_eq!(query_param(&uri, "code").as_deref(), Some("a b c"));
    }
}
