//! Ed25519 name certificates
//!
//! A [`Certificate`] binds a subject name to a public key and is signed by
//! the key of its issuer. The signed portion is the postcard encoding of
//! every field except the signature itself.

use std::time::Duration;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use ndvr_core::Name;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Default certificate lifetime (one year)
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A signed binding of a name to a public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub subject: Name,
    pub issuer: Name,
    pub public_key: [u8; 32],
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub signature: Vec<u8>,
}

#[derive(Serialize)]
struct CertificateBody<'a> {
    subject: &'a Name,
    issuer: &'a Name,
    public_key: &'a [u8; 32],
    not_before: &'a DateTime<Utc>,
    not_after: &'a DateTime<Utc>,
}

impl Certificate {
    /// Issue a certificate for `subject`, signed by `issuer_key`
    pub fn issue(
        subject: Name,
        subject_key: &VerifyingKey,
        issuer: Name,
        issuer_key: &SigningKey,
        not_before: DateTime<Utc>,
        validity: Duration,
    ) -> Result<Self, CryptoError> {
        let validity = chrono::Duration::from_std(validity)
            .map_err(|e| CryptoError::InvalidCertificate(e.to_string()))?;
        let mut cert = Self {
            subject,
            issuer,
            public_key: subject_key.to_bytes(),
            not_before,
            not_after: not_before + validity,
            signature: Vec::new(),
        };
        let body = cert.signed_portion()?;
        cert.signature = issuer_key.sign(&body).to_bytes().to_vec();
        Ok(cert)
    }

    /// Issue a self-signed certificate
    pub fn self_signed(
        subject: Name,
        key: &SigningKey,
        not_before: DateTime<Utc>,
        validity: Duration,
    ) -> Result<Self, CryptoError> {
        Self::issue(
            subject.clone(),
            &key.verifying_key(),
            subject,
            key,
            not_before,
            validity,
        )
    }

    /// Bytes covered by the issuer's signature
    pub fn signed_portion(&self) -> Result<Vec<u8>, CryptoError> {
        postcard::to_allocvec(&CertificateBody {
            subject: &self.subject,
            issuer: &self.issuer,
            public_key: &self.public_key,
            not_before: &self.not_before,
            not_after: &self.not_after,
        })
        .map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    /// The certified public key
    pub fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_bytes(&self.public_key).map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Check the issuer's signature over this certificate
    pub fn is_signed_by(&self, issuer_key: &VerifyingKey) -> bool {
        let Ok(signature) = Signature::from_slice(&self.signature) else {
            return false;
        };
        match self.signed_portion() {
            Ok(body) => issuer_key.verify_strict(&body, &signature).is_ok(),
            Err(_) => false,
        }
    }

    /// Whether `now` falls inside the validity window
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.not_before <= now && now <= self.not_after
    }

    /// Short key fingerprint for logging
    pub fn key_id(&self) -> String {
        hex::encode(&self.public_key[..8])
    }
}
