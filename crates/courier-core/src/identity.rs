use std::fmt;
use std::str::FromStr;

use bech32::{Bech32, Hrp};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::StaticSecret;

use crate::constants::{ID_HRP, PUBKEY_SIZE};
use crate::error::IdError;

// A public-key identity: the Ed25519 public key is the principal, rendered
// bech32 with the "cid" prefix. No accounts, no registration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; PUBKEY_SIZE]);

impl Id {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdError> {
        if bytes.len() != PUBKEY_SIZE {
            return Err(IdError::InvalidLength);
        }
        let mut arr = [0u8; PUBKEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; PUBKEY_SIZE] {
        &self.0
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, IdError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| IdError::InvalidEncoding)
    }

    /// X25519 public key for the box construction (Montgomery form of the
    /// Ed25519 point).
    pub fn to_x25519(&self) -> Result<[u8; 32], IdError> {
        let vk = self.verifying_key()?;
        Ok(vk.to_montgomery().to_bytes())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hrp = Hrp::parse(ID_HRP).expect("static hrp");
        let encoded = bech32::encode::<Bech32>(hrp, &self.0).expect("bech32 encode");
        write!(f, "{}", encoded)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hrp, data) = bech32::decode(s).map_err(|_| IdError::InvalidEncoding)?;
        if hrp != Hrp::parse(ID_HRP).expect("static hrp") {
            return Err(IdError::InvalidPrefix);
        }
        Self::from_bytes(&data)
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// Ed25519 signing identity. The same key signs requests and, via its X25519
// form, seals disco records to peers.
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    pub fn id(&self) -> Id {
        Id(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// X25519 scalar derived from the Ed25519 signing key; the counterpart
    /// of [`Id::to_x25519`].
    pub fn x25519_secret(&self) -> StaticSecret {
        StaticSecret::from(self.signing_key.to_scalar().to_bytes())
    }
}

pub fn verify_signature(id: &Id, message: &[u8], signature: &Signature) -> Result<(), IdError> {
    let vk = id.verifying_key()?;
    vk.verify(message, signature).map_err(|_| IdError::VerifyFailed)
}
