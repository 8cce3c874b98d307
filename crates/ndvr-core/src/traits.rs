//! Collaborator traits for NDVR
//!
//! - [`ForwardingSubstrate`]: named-object delivery between routers
//! - [`Clock`]: Time abstraction for testability

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{FetchError, SubstrateError};
use crate::name::Name;

/// Named-object forwarding layer shared by routers
///
/// Delivery is best effort: objects may be lost or duplicated, and there is
/// no ordering across distinct names.
#[async_trait]
pub trait ForwardingSubstrate: Send + Sync {
    /// Make an object fetchable under `name`
    async fn advertise(&self, name: Name, payload: Vec<u8>) -> Result<(), SubstrateError>;

    /// Fetch an object
    ///
    /// `name` may be a prefix, in which case the newest matching object of
    /// a reachable neighbour is returned.
    async fn fetch(&self, name: &Name, timeout: Duration) -> Result<Vec<u8>, FetchError>;

    /// Flood a discovery request under `prefix`
    ///
    /// Returns the newest object name each reachable neighbour holds under
    /// the prefix. An empty result means nobody answered.
    async fn discover(&self, prefix: &Name, timeout: Duration) -> Result<Vec<Name>, FetchError>;
}

/// Time abstraction for testability
///
/// This trait allows tests to control time, enabling deterministic
/// testing of time-dependent behavior.
pub trait Clock: Send + Sync {
    /// Get the current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;

    /// Sleep for a duration (async)
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Real clock implementation backed by tokio's timer
///
/// Honours `tokio::time::pause`, so tests with paused time run instantly.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
