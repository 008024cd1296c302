// Shared building blocks for the Courier substrate: public-key identities,
// pairwise box encryption, hierarchical paths, request signing, the invite
// wordlist codec, and the wire types spoken between client and server.

pub mod api;
pub mod auth;
pub mod constants;
pub mod crypto;
pub mod identity;
pub mod invite;
pub mod keystore;
pub mod path;
pub mod rand_id;

mod error;

pub use error::{AuthError, CryptoError, IdError, InviteError, PathError};
pub use identity::{Id, Identity};
pub use keystore::Keystore;

/// Injectable clock, so tests can drive timestamps deterministically.
pub type NowFn = std::sync::Arc<dyn Fn() -> chrono::DateTime<chrono::Utc> + Send + Sync>;
