use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdError {
    #[error("invalid id")]
    InvalidEncoding,

    #[error("invalid id prefix")]
    InvalidPrefix,

    #[error("invalid id length")]
    InvalidLength,

    #[error("verify failed")]
    VerifyFailed,
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("invalid path segment: {0}")]
    InvalidSegment(String),
}

#[derive(Error, Debug)]
pub enum InviteError {
    #[error("invalid invite code")]
    InvalidFormat,

    #[error("unknown invite word: {0}")]
    UnknownWord(String),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}
