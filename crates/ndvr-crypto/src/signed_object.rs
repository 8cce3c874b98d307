//! Signed routing objects
//!
//! A [`SignedRoutingObject`] is the unit routers exchange: a name, the
//! encoded routing payload, a freshness hint, the signer's certificate
//! chain and a signature over `(name, content, freshness)`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use ndvr_core::{Name, RouterIdentity};
use serde::{Deserialize, Serialize};

use crate::certificate::Certificate;
use crate::error::CryptoError;
use crate::trust::{SigningContext, TrustVerifier, Verdict};

/// Immutable, named, signed snapshot of a router's routing state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRoutingObject {
    pub name: Name,
    pub content: Vec<u8>,
    pub freshness_ms: u64,
    pub signer_chain: Vec<Certificate>,
    pub signature: Vec<u8>,
}

impl SignedRoutingObject {
    /// Sign `content` under `name`
    pub fn build(
        name: Name,
        content: Vec<u8>,
        freshness: Duration,
        ctx: &SigningContext,
    ) -> Result<Self, CryptoError> {
        let freshness_ms = u64::try_from(freshness.as_millis()).unwrap_or(u64::MAX);
        let signed = signed_portion(&name, &content, freshness_ms)?;
        Ok(Self {
            signature: ctx.sign(&signed),
            signer_chain: ctx.chain().to_vec(),
            name,
            content,
            freshness_ms,
        })
    }

    /// Verify the object as published by `claimed_origin`
    pub fn verify(
        &self,
        verifier: &TrustVerifier,
        claimed_origin: &RouterIdentity,
        now: DateTime<Utc>,
    ) -> Verdict {
        match signed_portion(&self.name, &self.content, self.freshness_ms) {
            Ok(signed) => verifier.verify(
                &signed,
                &self.signature,
                &self.signer_chain,
                claimed_origin,
                now,
            ),
            Err(_) => Verdict::RejectedSignature,
        }
    }

    /// How long caches may treat the object as fresh
    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }

    /// Wire encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        postcard::to_allocvec(self).map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    /// Parse the wire encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        postcard::from_bytes(bytes).map_err(|e| CryptoError::Deserialization(e.to_string()))
    }
}

fn signed_portion(name: &Name, content: &[u8], freshness_ms: u64) -> Result<Vec<u8>, CryptoError> {
    postcard::to_allocvec(&(name, content, freshness_ms))
        .map_err(|e| CryptoError::Serialization(e.to_string()))
}
