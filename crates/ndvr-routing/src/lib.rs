//! # NDVR Routing
//!
//! Distance-vector routing state for NDVR routers.
//!
//! Each router owns one [`RoutingTable`]. Its self route (cost 0, next hop
//! `Local`) is created with the table and only its sequence ever changes.
//! Routes to other routers are learned by merging verified neighbour
//! advertisements with [`RoutingTable::merge`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use ndvr_core::RouterIdentity;
//! use ndvr_routing::RoutingTable;
//!
//! let mut table = RoutingTable::new(RouterIdentity::from_ordinal(0));
//! let changed = table.merge(&neighbor, decoded.entries.values(), round)?;
//! if !changed.is_empty() {
//!     // re-publish next round
//! }
//! ```

pub mod error;
pub mod table;

// Re-export main types
pub use error::{RoutingError, RoutingResult};
pub use table::RoutingTable;

// Re-export core routing types for convenience
pub use ndvr_core::{NextHop, RoutingEntry};
