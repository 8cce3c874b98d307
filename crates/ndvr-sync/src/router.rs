//! NDVR router runtime
//!
//! [`NdvrRouter`] ties a validated [`RouterConfig`], trust material, a
//! forwarding substrate and a clock together and runs the configured number
//! of rounds.

use std::path::Path;
use std::sync::Arc;

use ndvr_core::{Clock, ConfigurationError, ForwardingSubstrate, RouterIdentity};
use ndvr_crypto::{SigningContext, TrustAnchor, TrustVerifier, Verdict};
use ndvr_routing::RoutingTable;
use tracing::{Instrument, info, info_span, warn};

use crate::config::RouterConfig;
use crate::engine::{SyncEngine, SyncError, SyncStats};
use crate::scheduler::{RoundScheduler, RoundSignal};

/// Final state of a router after its last round
#[derive(Debug, Clone)]
pub struct RouterReport {
    pub identity: RouterIdentity,
    pub table: RoutingTable,
    pub stats: SyncStats,
}

/// Read the network's trust anchor from disk at startup
///
/// A missing or unreadable anchor stops the router from starting.
pub fn load_trust_anchor(path: impl AsRef<Path>) -> Result<TrustAnchor, ConfigurationError> {
    let path = path.as_ref();
    TrustAnchor::load_from(path)
        .map_err(|e| ConfigurationError::MissingTrust(format!("{}: {}", path.display(), e)))
}

/// One NDVR router
pub struct NdvrRouter<S, C> {
    engine: SyncEngine<S, C>,
    scheduler: RoundScheduler<C>,
}

impl<S, C> NdvrRouter<S, C>
where
    S: ForwardingSubstrate + 'static,
    C: Clock,
{
    /// Build a router from its configuration and trust material
    ///
    /// Fails when the configuration is invalid, when the anchor is not for
    /// the configured network, or when the signing context is not for the
    /// configured identity or does not chain to the anchor.
    pub fn new(
        config: RouterConfig,
        signing: SigningContext,
        anchor: TrustAnchor,
        substrate: Arc<S>,
        clock: Arc<C>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        if anchor.domain() != &config.network {
            return Err(ConfigurationError::TrustMismatch {
                identity: config.identity.to_string(),
                reason: format!(
                    "anchor is for {}, network is {}",
                    anchor.domain(),
                    config.network
                ),
            });
        }
        if signing.identity() != &config.identity {
            return Err(ConfigurationError::TrustMismatch {
                identity: config.identity.to_string(),
                reason: format!("signing context is for {}", signing.identity()),
            });
        }

        let verifier = TrustVerifier::new(anchor);
        let challenge = b"ndvr-self-check";
        match verifier.verify(
            challenge,
            &signing.sign(challenge),
            signing.chain(),
            &config.identity,
            clock.now_utc(),
        ) {
            Verdict::Accepted => {}
            verdict => {
                return Err(ConfigurationError::TrustMismatch {
                    identity: config.identity.to_string(),
                    reason: format!("{:?}", verdict),
                });
            }
        }

        let scheduler = RoundScheduler::new(config.rounds, config.round_duration, Arc::clone(&clock))
            .with_start_offset(config.start_offset);
        let engine = SyncEngine::new(config, signing, verifier, substrate, clock);

        Ok(Self { engine, scheduler })
    }

    /// This router's identity
    pub fn identity(&self) -> &RouterIdentity {
        self.engine.identity()
    }

    /// The underlying engine
    pub fn engine(&self) -> &SyncEngine<S, C> {
        &self.engine
    }

    /// Run every round, then report the final table
    pub async fn run(mut self) -> RouterReport {
        let span = info_span!("router", id = %self.engine.identity());
        async move {
            info!(rounds = self.scheduler.rounds(), "Router starting");
            loop {
                match self.scheduler.next().await {
                    RoundSignal::Start(round) => match self.engine.run_round().await {
                        Ok(_) => {}
                        Err(SyncError::Stopped) => break,
                        Err(e) => warn!(round, error = %e, "Round failed"),
                    },
                    RoundSignal::Terminate => break,
                }
            }
            self.engine.stop();

            let report = RouterReport {
                identity: self.engine.identity().clone(),
                table: self.engine.table().clone(),
                stats: self.engine.stats().clone(),
            };
            info!(
                destinations = report.table.len(),
                rounds = report.stats.rounds_completed,
                "Router finished"
            );
            report
        }
        .instrument(span)
        .await
    }
}
