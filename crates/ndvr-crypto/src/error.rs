//! Error types for ndvr-crypto

use thiserror::Error;

/// Errors that can occur while handling keys and certificates
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    #[error("Trust material I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
