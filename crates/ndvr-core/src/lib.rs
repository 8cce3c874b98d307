//! # NDVR Core
//!
//! Core names, identities, codec and collaborator traits for NDVR, the
//! distance-vector routing protocol that synchronizes reachability state
//! between routers as signed, named content objects.
//!
//! ## Key Types
//!
//! - [`Name`]: Hierarchical content name with percent-escaped URI form
//! - [`RouterIdentity`]: A router's name within the trust domain
//! - [`RoutingEntry`]: Reachability of one destination
//! - [`NameCodec`]: Maps routing state to object names and payloads
//!
//! ## Key Traits
//!
//! - [`ForwardingSubstrate`]: Best-effort named-object delivery
//! - [`Clock`]: Time abstraction for testability
//!
//! [`MemoryMesh`] is an in-memory substrate used by tests and the
//! simulation.

pub mod codec;
pub mod error;
pub mod identity;
pub mod mock_substrate;
pub mod name;
pub mod routing;
pub mod traits;

// Re-export main types
pub use codec::*;
pub use error::*;
pub use identity::*;
pub use mock_substrate::*;
pub use name::*;
pub use routing::*;
pub use traits::*;
