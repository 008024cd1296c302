use rand::Rng;

use crate::constants::{AUTH_NONCE_LEN, FRAME_ID_LEN, MESSAGE_ID_LEN};

const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub fn rand_base62(len: usize) -> String {
    let mut rng = rand::rngs::OsRng;
    (0..len)
        .map(|_| BASE62[rng.gen_range(0..BASE62.len())] as char)
        .collect()
}

/// Exchange-server message id (22 chars base62).
pub fn message_id() -> String {
    rand_base62(MESSAGE_ID_LEN)
}

/// Wormhole frame id (16 chars base62).
pub fn frame_id() -> String {
    rand_base62(FRAME_ID_LEN)
}

/// Request auth nonce (32 chars base62).
pub fn auth_nonce() -> String {
    rand_base62(AUTH_NONCE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths() {
        assert_eq!(message_id().len(), 22);
        assert_eq!(frame_id().len(), 16);
        assert_eq!(auth_nonce().len(), 32);
    }

    #[test]
    fn test_alphabet() {
        let id = message_id();
        assert!(id.bytes().all(|b| BASE62.contains(&b)));
    }

    #[test]
    fn test_unique() {
        assert_ne!(message_id(), message_id());
    }
}
