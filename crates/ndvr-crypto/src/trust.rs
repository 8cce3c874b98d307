//! Trust anchors, signing contexts and chain verification
//!
//! Every router signs its routing objects with a key certified, directly
//! or through intermediate certificates, by the network's [`TrustAnchor`].
//! [`TrustVerifier::verify`] is a pure function of the payload, signature,
//! certificate chain, anchor and current time. It performs no I/O.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey};
use ndvr_core::{Name, RouterIdentity};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::certificate::{Certificate, DEFAULT_VALIDITY};
use crate::error::CryptoError;

/// Why a certificate chain was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustRejection {
    #[error("Empty certificate chain")]
    EmptyChain,

    #[error("Leaf certificate is for {actual}, expected {expected}")]
    IdentityMismatch { expected: Name, actual: Name },

    #[error("Certificate subject {0} is outside the trust domain")]
    OutsideDomain(Name),

    #[error("Issuer {issuer} may not certify {subject}")]
    IssuerNotPrefix { subject: Name, issuer: Name },

    #[error("Certificate for {subject} names issuer {issuer}, next in chain is {next}")]
    BrokenLink { subject: Name, issuer: Name, next: Name },

    #[error("Certificate for {0} has an invalid issuer signature")]
    BadCertificateSignature(Name),

    #[error("Certificate for {0} is not valid at this time")]
    Expired(Name),

    #[error("Certificate for {0} carries a malformed key")]
    MalformedKey(Name),
}

/// Outcome of verifying a signed payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    RejectedTrustChain(TrustRejection),
    RejectedSignature,
}

impl Verdict {
    /// Check if the payload was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Root certificate of a network domain
///
/// Process-wide and read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    certificate: Certificate,
}

impl TrustAnchor {
    /// Wrap a self-signed certificate
    pub fn from_certificate(certificate: Certificate) -> Result<Self, CryptoError> {
        if certificate.subject != certificate.issuer {
            return Err(CryptoError::InvalidCertificate(format!(
                "anchor {} is not self-issued",
                certificate.subject
            )));
        }
        if !certificate.is_signed_by(&certificate.verifying_key()?) {
            return Err(CryptoError::InvalidCertificate(format!(
                "anchor {} has a bad self-signature",
                certificate.subject
            )));
        }
        Ok(Self { certificate })
    }

    /// The network domain this anchor roots
    pub fn domain(&self) -> &Name {
        &self.certificate.subject
    }

    /// The anchor certificate
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Encode as base64 text
    pub fn to_base64(&self) -> Result<String, CryptoError> {
        let bytes = postcard::to_allocvec(&self.certificate)
            .map_err(|e| CryptoError::Serialization(e.to_string()))?;
        Ok(STANDARD.encode(bytes))
    }

    /// Decode from base64 text
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| CryptoError::Deserialization(e.to_string()))?;
        let certificate: Certificate = postcard::from_bytes(&bytes)
            .map_err(|e| CryptoError::Deserialization(e.to_string()))?;
        Self::from_certificate(certificate)
    }

    /// Write the anchor certificate to a file
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), CryptoError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_base64()?)?;
        Ok(())
    }

    /// Read an anchor certificate from a file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        Self::from_base64(&std::fs::read_to_string(path)?)
    }
}

/// Key material binding a router identity to the trust anchor
///
/// The chain is ordered leaf first and stops before the anchor.
pub struct SigningContext {
    identity: RouterIdentity,
    key: SigningKey,
    chain: Vec<Certificate>,
}

impl SigningContext {
    /// Assemble a context, checking the leaf certifies `key`
    pub fn new(
        identity: RouterIdentity,
        key: SigningKey,
        chain: Vec<Certificate>,
    ) -> Result<Self, CryptoError> {
        let leaf = chain
            .first()
            .ok_or_else(|| CryptoError::InvalidCertificate("empty chain".to_string()))?;
        if leaf.public_key != key.verifying_key().to_bytes() {
            return Err(CryptoError::InvalidKey(format!(
                "leaf certificate {} does not certify the signing key",
                leaf.subject
            )));
        }
        Ok(Self {
            identity,
            key,
            chain,
        })
    }

    /// Sign a payload
    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        self.key.sign(payload).to_bytes().to_vec()
    }

    /// The identity this context signs for
    pub fn identity(&self) -> &RouterIdentity {
        &self.identity
    }

    /// The certificate chain, leaf first
    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }

    /// The leaf certificate
    pub fn certificate(&self) -> &Certificate {
        &self.chain[0]
    }
}

impl std::fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningContext")
            .field("identity", &self.identity)
            .field("key_id", &self.certificate().key_id())
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

/// Holder of the anchor's private key
///
/// Stands in for the external trust bootstrap: creates the anchor and
/// certifies each router's key before its first publication.
pub struct RootAuthority {
    anchor: TrustAnchor,
    key: SigningKey,
}

impl RootAuthority {
    /// Create an authority for `domain` with a fresh random key
    pub fn generate(domain: Name) -> Result<Self, CryptoError> {
        Self::from_seed(domain, random_seed())
    }

    /// Create an authority from a fixed key seed
    pub fn from_seed(domain: Name, seed: [u8; 32]) -> Result<Self, CryptoError> {
        let seed = Zeroizing::new(seed);
        let key = SigningKey::from_bytes(&seed);
        let certificate = Certificate::self_signed(domain, &key, Utc::now(), DEFAULT_VALIDITY)?;
        Ok(Self {
            anchor: TrustAnchor::from_certificate(certificate)?,
            key,
        })
    }

    /// The public anchor
    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    /// Certify a fresh key for `identity`
    pub fn issue(&self, identity: &RouterIdentity) -> Result<SigningContext, CryptoError> {
        self.issue_with_seed(identity, random_seed())
    }

    /// Certify the key derived from `seed` for `identity`
    pub fn issue_with_seed(
        &self,
        identity: &RouterIdentity,
        seed: [u8; 32],
    ) -> Result<SigningContext, CryptoError> {
        let seed = Zeroizing::new(seed);
        let key = SigningKey::from_bytes(&seed);
        let certificate = Certificate::issue(
            identity.qualified(self.anchor.domain()),
            &key.verifying_key(),
            self.anchor.domain().clone(),
            &self.key,
            Utc::now(),
            DEFAULT_VALIDITY,
        )?;
        SigningContext::new(identity.clone(), key, vec![certificate])
    }
}

fn random_seed() -> [u8; 32] {
    let mut seed = [0u8; 32];
    rand::rng().fill_bytes(&mut seed);
    seed
}

/// Validates signed payloads against a trust anchor
#[derive(Debug, Clone)]
pub struct TrustVerifier {
    anchor: TrustAnchor,
}

impl TrustVerifier {
    /// Create a verifier for the given anchor
    pub fn new(anchor: TrustAnchor) -> Self {
        Self { anchor }
    }

    /// The anchor in use
    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    /// Verify `signature` over `payload` as coming from `claimed_origin`
    ///
    /// Accepts only when the chain links to the anchor, every certificate is
    /// valid at `now` and lies under the trust domain, the leaf certifies
    /// `claimed_origin`, and the signature verifies with the leaf key.
    pub fn verify(
        &self,
        payload: &[u8],
        signature: &[u8],
        chain: &[Certificate],
        claimed_origin: &RouterIdentity,
        now: DateTime<Utc>,
    ) -> Verdict {
        match self.check_chain(chain, claimed_origin, now) {
            Ok(()) => {}
            Err(rejection) => return Verdict::RejectedTrustChain(rejection),
        }

        let Ok(leaf_key) = chain[0].verifying_key() else {
            return Verdict::RejectedTrustChain(TrustRejection::MalformedKey(
                chain[0].subject.clone(),
            ));
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return Verdict::RejectedSignature;
        };
        if leaf_key.verify_strict(payload, &signature).is_ok() {
            Verdict::Accepted
        } else {
            Verdict::RejectedSignature
        }
    }

    fn check_chain(
        &self,
        chain: &[Certificate],
        claimed_origin: &RouterIdentity,
        now: DateTime<Utc>,
    ) -> Result<(), TrustRejection> {
        let domain = self.anchor.domain();
        let leaf = chain.first().ok_or(TrustRejection::EmptyChain)?;

        let expected = claimed_origin.qualified(domain);
        if leaf.subject != expected {
            return Err(TrustRejection::IdentityMismatch {
                expected,
                actual: leaf.subject.clone(),
            });
        }

        if !self.anchor.certificate().is_valid_at(now) {
            return Err(TrustRejection::Expired(domain.clone()));
        }

        for (i, cert) in chain.iter().enumerate() {
            if !domain.is_prefix_of(&cert.subject) || &cert.subject == domain {
                return Err(TrustRejection::OutsideDomain(cert.subject.clone()));
            }
            if !cert.issuer.is_prefix_of(&cert.subject) || cert.issuer == cert.subject {
                return Err(TrustRejection::IssuerNotPrefix {
                    subject: cert.subject.clone(),
                    issuer: cert.issuer.clone(),
                });
            }
            if !cert.is_valid_at(now) {
                return Err(TrustRejection::Expired(cert.subject.clone()));
            }

            let issuer_cert = chain.get(i + 1).unwrap_or(self.anchor.certificate());
            if cert.issuer != issuer_cert.subject {
                return Err(TrustRejection::BrokenLink {
                    subject: cert.subject.clone(),
                    issuer: cert.issuer.clone(),
                    next: issuer_cert.subject.clone(),
                });
            }
            let issuer_key = issuer_cert
                .verifying_key()
                .map_err(|_| TrustRejection::MalformedKey(issuer_cert.subject.clone()))?;
            if !cert.is_signed_by(&issuer_key) {
                return Err(TrustRejection::BadCertificateSignature(cert.subject.clone()));
            }
        }
        Ok(())
    }
}
