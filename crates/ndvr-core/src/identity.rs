//! Router identities
//!
//! A [`RouterIdentity`] is a name relative to the network domain, such as
//! `/%C1.Router/Router3`. Prefixing it with the domain gives the name its
//! certificate is issued for.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::NameError;
use crate::name::{Name, NameComponent};

/// First component of identities derived from an ordinal
pub const ROUTER_ROLE_COMPONENT: &[u8] = b"\xC1.Router";

/// Unique name of a router within the trust domain
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouterIdentity(Name);

impl RouterIdentity {
    /// Create an identity from a non-empty name
    pub fn new(name: Name) -> Result<Self, NameError> {
        if name.is_empty() {
            return Err(NameError::EmptyIdentity);
        }
        Ok(Self(name))
    }

    /// Parse an identity from its URI form
    pub fn parse(uri: &str) -> Result<Self, NameError> {
        Self::new(Name::parse(uri)?)
    }

    /// Derive the identity of the router with the given ordinal
    ///
    /// Produces `/%C1.Router/Router<ordinal>`.
    pub fn from_ordinal(ordinal: u64) -> Self {
        Self(
            Name::root()
                .append(NameComponent::new(ROUTER_ROLE_COMPONENT))
                .append(NameComponent::new(format!("Router{}", ordinal))),
        )
    }

    /// The identity as a name
    pub fn name(&self) -> &Name {
        &self.0
    }

    /// The identity prefixed with the network domain
    pub fn qualified(&self, network: &Name) -> Name {
        network.clone().append_name(&self.0)
    }

    /// Short form for logging (the last component)
    pub fn short_id(&self) -> String {
        self.0
            .last()
            .map(|c| c.to_string())
            .unwrap_or_else(|| self.0.to_uri())
    }
}

impl Display for RouterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<Name> for RouterIdentity {
    type Error = NameError;

    fn try_from(name: Name) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ordinal() {
        let id = RouterIdentity::from_ordinal(3);
        assert_eq!(id.to_string(), "/%C1.Router/Router3");
        assert_eq!(id.short_id(), "Router3");
        assert_eq!(RouterIdentity::parse("/%C1.Router/Router3").unwrap(), id);
    }

    #[test]
    fn test_qualified() {
        let network = Name::parse("/ndn").unwrap();
        let id = RouterIdentity::from_ordinal(0);
        assert_eq!(id.qualified(&network).to_uri(), "/ndn/%C1.Router/Router0");
    }

    #[test]
    fn test_empty_identity_rejected() {
        assert_eq!(RouterIdentity::parse("/"), Err(NameError::EmptyIdentity));
    }

    #[test]
    fn test_ordering_is_by_name() {
        let a = RouterIdentity::parse("/r/A").unwrap();
        let b = RouterIdentity::parse("/r/B").unwrap();
        assert!(a < b);
    }
}
