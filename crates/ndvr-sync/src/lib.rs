//! # NDVR Sync
//!
//! Round-based exchange of signed routing state between NDVR routers.
//!
//! ## Core Components
//!
//! - [`RouterConfig`]: Validated, serde-loadable router settings
//! - [`SyncEngine`]: Per-router state machine that publishes, fetches,
//!   verifies and merges routing objects
//! - [`RoundScheduler`]: Turns a round count into timed round signals
//! - [`NdvrRouter`]: Runs a scheduler and an engine to completion
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ndvr_core::{MemoryMesh, Name, RouterIdentity, SystemClock};
//! use ndvr_crypto::RootAuthority;
//! use ndvr_sync::{NdvrRouter, RouterConfig};
//!
//! let network = Name::parse("/ndn")?;
//! let root = RootAuthority::generate(network.clone())?;
//! let mesh = MemoryMesh::new();
//!
//! let identity = RouterIdentity::from_ordinal(0);
//! let router = NdvrRouter::new(
//!     RouterConfig::new(network, identity.clone()),
//!     root.issue(&identity)?,
//!     root.anchor().clone(),
//!     Arc::new(mesh.attach(identity)),
//!     Arc::new(SystemClock),
//! )?;
//! let report = router.run().await;
//! ```

pub mod config;
pub mod engine;
pub mod router;
pub mod scheduler;

// Re-export main types
pub use config::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_FRESHNESS, DEFAULT_ROUND_DURATION, DEFAULT_ROUNDS, RouterConfig,
};
pub use engine::{MergeOutcome, SyncEngine, SyncError, SyncState, SyncStats};
pub use router::{NdvrRouter, RouterReport, load_trust_anchor};
pub use scheduler::{RoundScheduler, RoundSignal};
