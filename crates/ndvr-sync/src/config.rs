//! Router configuration

use std::time::Duration;

use ndvr_core::{ConfigurationError, DEFAULT_SYNC_MARKER, Name, RouterIdentity};
use serde::{Deserialize, Serialize};

/// Number of sync rounds when none is configured
pub const DEFAULT_ROUNDS: u64 = 5;

/// Round length when none is configured
pub const DEFAULT_ROUND_DURATION: Duration = Duration::from_secs(40);

/// Per-peer fetch timeout when none is configured
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(4);

/// Freshness hint attached to published objects when none is configured
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(40);

/// Configuration of one NDVR router
///
/// Names are written in URI form and durations in milliseconds when the
/// configuration is serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Network domain, e.g. `/ndn`
    #[serde(with = "uri")]
    pub network: Name,
    /// This router's identity relative to the domain
    #[serde(with = "identity_uri")]
    pub identity: RouterIdentity,
    /// Number of rounds before the router stops
    #[serde(default = "default_rounds")]
    pub rounds: u64,
    /// Length of one round
    #[serde(default = "default_round_duration", with = "millis")]
    pub round_duration: Duration,
    /// Per-peer fetch bound inside a round
    #[serde(default = "default_fetch_timeout", with = "millis")]
    pub fetch_timeout: Duration,
    /// Delay before the first round
    #[serde(default, with = "millis")]
    pub start_offset: Duration,
    /// Freshness hint attached to published objects
    #[serde(default = "default_freshness", with = "millis")]
    pub freshness: Duration,
    /// Component following the domain in object names
    #[serde(default = "default_sync_marker")]
    pub sync_marker: String,
    /// Evict learned routes not refreshed within this many rounds
    #[serde(default)]
    pub stale_after_rounds: Option<u64>,
}

impl RouterConfig {
    /// Create a configuration with defaults for everything but the names
    pub fn new(network: Name, identity: RouterIdentity) -> Self {
        Self {
            network,
            identity,
            rounds: DEFAULT_ROUNDS,
            round_duration: DEFAULT_ROUND_DURATION,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            start_offset: Duration::ZERO,
            freshness: DEFAULT_FRESHNESS,
            sync_marker: DEFAULT_SYNC_MARKER.to_string(),
            stale_after_rounds: None,
        }
    }

    /// Set the number of rounds
    pub fn with_rounds(mut self, rounds: u64) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set the round duration
    pub fn with_round_duration(mut self, duration: Duration) -> Self {
        self.round_duration = duration;
        self
    }

    /// Set the per-peer fetch timeout
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the delay before the first round
    pub fn with_start_offset(mut self, offset: Duration) -> Self {
        self.start_offset = offset;
        self
    }

    /// Set the freshness hint
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    /// Enable eviction of routes older than `rounds` rounds
    pub fn with_stale_after_rounds(mut self, rounds: u64) -> Self {
        self.stale_after_rounds = Some(rounds);
        self
    }

    /// Check the configuration can drive a router
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.network.is_empty() {
            return Err(ConfigurationError::EmptyNetwork);
        }
        if self.rounds == 0 {
            return Err(ConfigurationError::ZeroRounds);
        }
        if self.round_duration.is_zero() {
            return Err(ConfigurationError::ZeroRoundDuration);
        }
        if self.fetch_timeout.is_zero() || self.fetch_timeout >= self.round_duration {
            return Err(ConfigurationError::FetchTimeout {
                fetch_timeout: self.fetch_timeout,
                round_duration: self.round_duration,
            });
        }
        if self.sync_marker.is_empty() || self.sync_marker.contains('/') {
            return Err(ConfigurationError::InvalidSyncMarker(
                self.sync_marker.clone(),
            ));
        }
        Ok(())
    }
}

fn default_rounds() -> u64 {
    DEFAULT_ROUNDS
}

fn default_round_duration() -> Duration {
    DEFAULT_ROUND_DURATION
}

fn default_fetch_timeout() -> Duration {
    DEFAULT_FETCH_TIMEOUT
}

fn default_freshness() -> Duration {
    DEFAULT_FRESHNESS
}

fn default_sync_marker() -> String {
    DEFAULT_SYNC_MARKER.to_string()
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod uri {
    use ndvr_core::Name;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Name, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_uri())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Name, D::Error> {
        let text = String::deserialize(deserializer)?;
        Name::parse(&text).map_err(D::Error::custom)
    }
}

mod identity_uri {
    use ndvr_core::RouterIdentity;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &RouterIdentity, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.name().to_uri())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<RouterIdentity, D::Error> {
        let text = String::deserialize(deserializer)?;
        RouterIdentity::parse(&text).map_err(D::Error::custom)
    }
}
