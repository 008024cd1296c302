/// Bech32 human-readable prefix for identity keys
pub const ID_HRP: &str = "cid";

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Ed25519 public key size in bytes
pub const PUBKEY_SIZE: usize = 32;

/// Length of an exchange-server message id (base62)
pub const MESSAGE_ID_LEN: usize = 22;

/// Length of a wormhole frame id (base62)
pub const FRAME_ID_LEN: usize = 16;

/// Length of a request auth nonce (base62)
pub const AUTH_NONCE_LEN: usize = 32;

/// Maximum exchange message size in bytes (16 KiB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;

/// Maximum disco record size in bytes (32 KiB)
pub const MAX_DISCO_SIZE: usize = 32 * 1024;

/// Maximum channel name length in bytes, kept for wire compatibility
pub const MAX_CHANNEL_LEN: usize = 16;

/// Words per invite code (2048-word list, ~66 bits)
pub const INVITE_WORDS: usize = 6;

/// Key derivation context (BLAKE3) for the pairwise box
pub const KDF_CONTEXT_BOX: &str = "courier-box-v1";
