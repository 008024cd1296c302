// The exchange server: an authenticated, replay-resistant HTTP service
// brokering per-pair message streams, sigchain statements, and ephemeral
// disco/invite records for peer rendezvous.

pub mod access;
pub mod api;
pub mod auth;
pub mod config;
pub mod tasks;

mod disco;
mod error;
mod invite;
mod messages;
mod sigchain;
mod user;

pub use access::{Access, AccessAction, AccessContext, AccessFn, AccessResource};
pub use api::{build_router, serve, AppState};
pub use auth::NonceCache;
pub use config::ServerConfig;
pub use error::ServerError;
pub use user::UserStore;
