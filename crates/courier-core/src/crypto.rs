use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use crate::constants::{KDF_CONTEXT_BOX, NONCE_SIZE};
use crate::error::CryptoError;

// Pairwise box: X25519 ECDH, BLAKE3 key derivation, XChaCha20-Poly1305 with
// the 24-byte nonce prepended. The derived key is symmetric in the pair, so
// either side can open what the other sealed.

fn pair_key(secret: &StaticSecret, peer_public: &[u8; 32]) -> [u8; 32] {
    let shared = secret.diffie_hellman(&X25519Public::from(*peer_public));
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_BOX);
    hasher.update(shared.as_bytes());
    let hash = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&hash.as_bytes()[..32]);
    key
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Seal `plaintext` to `recipient_public` (X25519) from `sender_secret`.
/// Returns nonce || ciphertext.
pub fn box_seal(
    plaintext: &[u8],
    recipient_public: &[u8; 32],
    sender_secret: &StaticSecret,
) -> Result<Vec<u8>, CryptoError> {
    let key = pair_key(sender_secret, recipient_public);
    let cipher = XChaCha20Poly1305::new(&key.into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Open a box sealed by `sender_public` for the holder of `recipient_secret`.
pub fn box_open(
    data: &[u8],
    sender_public: &[u8; 32],
    recipient_secret: &StaticSecret,
) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let key = pair_key(recipient_secret, sender_public);
    let cipher = XChaCha20Poly1305::new(&key.into());
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    #[test]
    fn test_box_roundtrip() {
        let alice = Identity::generate();
        let bob = Identity::generate();

        let sealed = box_seal(
            b"offer sdp",
            &bob.id().to_x25519().unwrap(),
            &alice.x25519_secret(),
        )
        .unwrap();

        let opened = box_open(
            &sealed,
            &alice.id().to_x25519().unwrap(),
            &bob.x25519_secret(),
        )
        .unwrap();
        assert_eq!(opened, b"offer sdp");
    }

    #[test]
    fn test_box_is_pairwise_symmetric() {
        // The sealer can open its own box with the peer public key.
        let alice = Identity::generate();
        let bob = Identity::generate();

        let sealed = box_seal(
            b"both ways",
            &bob.id().to_x25519().unwrap(),
            &alice.x25519_secret(),
        )
        .unwrap();

        let opened = box_open(
            &sealed,
            &bob.id().to_x25519().unwrap(),
            &alice.x25519_secret(),
        )
        .unwrap();
        assert_eq!(opened, b"both ways");
    }

    #[test]
    fn test_box_wrong_key_fails() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let eve = Identity::generate();

        let sealed = box_seal(
            b"secret",
            &bob.id().to_x25519().unwrap(),
            &alice.x25519_secret(),
        )
        .unwrap();

        assert!(box_open(
            &sealed,
            &alice.id().to_x25519().unwrap(),
            &eve.x25519_secret(),
        )
        .is_err());
    }

    #[test]
    fn test_box_tampered_fails() {
        let alice = Identity::generate();
        let bob = Identity::generate();

        let mut sealed = box_seal(
            b"secret",
            &bob.id().to_x25519().unwrap(),
            &alice.x25519_secret(),
        )
        .unwrap();
        let len = sealed.len();
        sealed[len - 1] ^= 0xFF;

        assert!(box_open(
            &sealed,
            &alice.id().to_x25519().unwrap(),
            &bob.x25519_secret(),
        )
        .is_err());
    }

    #[test]
    fn test_box_truncated_fails() {
        let alice = Identity::generate();
        assert!(box_open(&[0u8; 5], &[0u8; 32], &alice.x25519_secret()).is_err());
    }
}
