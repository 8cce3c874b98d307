//! # NDVR Crypto
//!
//! Trust material and signed routing objects for NDVR.
//!
//! ## Key Types
//!
//! - [`TrustAnchor`]: Self-signed root certificate of the network domain
//! - [`SigningContext`]: A router's key and certificate chain
//! - [`TrustVerifier`]: Pure chain and signature check against the anchor
//! - [`SignedRoutingObject`]: The named, signed unit routers exchange
//! - [`RootAuthority`]: Bootstrap helper that creates the anchor and
//!   certifies router keys
//!
//! ## Example
//!
//! ```rust,ignore
//! use ndvr_core::{Name, RouterIdentity};
//! use ndvr_crypto::{RootAuthority, SignedRoutingObject, TrustVerifier};
//!
//! let root = RootAuthority::generate(Name::parse("/ndn")?)?;
//! let router = RouterIdentity::from_ordinal(0);
//! let ctx = root.issue(&router)?;
//!
//! let obj = SignedRoutingObject::build(name, payload, freshness, &ctx)?;
//! let verifier = TrustVerifier::new(root.anchor().clone());
//! assert!(obj.verify(&verifier, &router, chrono::Utc::now()).is_accepted());
//! ```

pub mod certificate;
pub mod error;
pub mod signed_object;
pub mod trust;

// Re-exports
pub use certificate::{Certificate, DEFAULT_VALIDITY};
pub use error::CryptoError;
pub use signed_object::SignedRoutingObject;
pub use trust::{RootAuthority, SigningContext, TrustAnchor, TrustRejection, TrustVerifier, Verdict};

// Re-export key types for convenience
pub use ed25519_dalek::{SigningKey, VerifyingKey};
