//! Routing error types

use ndvr_core::RouterIdentity;
use thiserror::Error;

/// Errors raised by routing table operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// A neighbour advertised routes on behalf of the table owner
    #[error("Router {0} cannot merge its own advertisement")]
    SelfAdvertisement(RouterIdentity),
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
