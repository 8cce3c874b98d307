//! Error types for NDVR

use std::time::Duration;

use thiserror::Error;

use crate::name::Name;

/// Errors raised while parsing names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Name must start with '/': {0}")]
    MissingLeadingSlash(String),

    #[error("Invalid percent escape in component: {0}")]
    InvalidEscape(String),

    #[error("Identity must not be empty")]
    EmptyIdentity,
}

/// Malformed routing object name or payload
///
/// Always dropped by the receiver, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Name {name} is not under sync prefix {prefix}")]
    WrongPrefix { name: Name, prefix: Name },

    #[error("Name {0} has no origin component")]
    MissingOrigin(Name),

    #[error("Name {0} does not end in a sequence number")]
    BadSequence(Name),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unsupported payload version {0}")]
    UnsupportedVersion(u8),

    #[error("Payload does not match its name: {0}")]
    NameMismatch(String),
}

/// A routing object could not be serialized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Encoding failed: {0}")]
pub struct EncodeError(pub String);

/// Outcome of a fetch that did not return data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// No answer within the timeout; the peer is unreachable this round
    #[error("Fetch of {name} timed out after {timeout:?}")]
    Timeout { name: Name, timeout: Duration },

    /// The substrate itself is not usable
    #[error("Substrate unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the forwarding substrate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstrateError {
    #[error("Face {0} is not attached to the substrate")]
    UnknownFace(String),
}

/// Invalid router configuration; prevents the router from starting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Round count must be at least 1")]
    ZeroRounds,

    #[error("Round duration must be non-zero")]
    ZeroRoundDuration,

    #[error("Fetch timeout {fetch_timeout:?} must be non-zero and shorter than the round duration {round_duration:?}")]
    FetchTimeout {
        fetch_timeout: Duration,
        round_duration: Duration,
    },

    #[error("Network domain must not be empty")]
    EmptyNetwork,

    #[error("Invalid name: {0}")]
    InvalidName(#[from] NameError),

    #[error("Sync marker must be a single non-empty component: {0:?}")]
    InvalidSyncMarker(String),

    #[error("Missing trust material: {0}")]
    MissingTrust(String),

    #[error("Trust material does not match router {identity}: {reason}")]
    TrustMismatch { identity: String, reason: String },
}
