//! Router context for multi-router logging
//!
//! A simulation runs many routers in one process. [`RouterContextGuard`]
//! records which router the current thread is working for, so spans opened
//! inside the scope can be attributed to it.

use std::cell::RefCell;

use ndvr_core::RouterIdentity;
use uuid::Uuid;

/// Router context stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterContextData {
    /// Full identity, e.g. `/%C1.Router/Router3`
    pub router_id: String,
    /// Last identity component, e.g. `Router3`
    pub short_id: String,
    /// Unique ID of this router instance
    pub instance_id: Uuid,
}

thread_local! {
    static ROUTER_CONTEXT: RefCell<Option<RouterContextData>> = const { RefCell::new(None) };
}

/// RAII guard for router context
///
/// Sets the context for the current thread and restores the previous one
/// when dropped. Do not hold it across `.await`; use a tracing span there.
pub struct RouterContextGuard {
    previous: Option<RouterContextData>,
}

impl RouterContextGuard {
    /// Enter the context of `identity` with a fresh instance ID
    pub fn new(identity: &RouterIdentity) -> Self {
        Self::with_instance_id(identity, Uuid::new_v4())
    }

    /// Enter the context of `identity` with a known instance ID
    pub fn with_instance_id(identity: &RouterIdentity, instance_id: Uuid) -> Self {
        let data = RouterContextData {
            router_id: identity.to_string(),
            short_id: identity.short_id(),
            instance_id,
        };
        let previous = ROUTER_CONTEXT.with(|ctx| ctx.borrow_mut().replace(data));
        Self { previous }
    }

    /// Get the current router context (if any)
    pub fn current() -> Option<RouterContextData> {
        ROUTER_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current router ID (if set)
    pub fn current_router_id() -> Option<String> {
        Self::current().map(|ctx| ctx.router_id)
    }
}

impl Drop for RouterContextGuard {
    fn drop(&mut self) {
        ROUTER_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block inside a router context
///
/// ```ignore
/// with_router_context!(&identity, {
///     tracing::info!("Loading trust anchor");
/// });
/// ```
#[macro_export]
macro_rules! with_router_context {
    ($identity:expr, $body:block) => {{
        let _guard = $crate::context::RouterContextGuard::new($identity);
        $body
    }};
}
