//! Trust anchor persistence and end-to-end signing

use std::time::Duration;

use chrono::Utc;
use ndvr_core::{Name, RouterIdentity};
use ndvr_crypto::{RootAuthority, SignedRoutingObject, TrustAnchor, TrustVerifier, Verdict};

#[test]
fn test_anchor_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config").join("trust.cert");

    let root = RootAuthority::generate(Name::parse("/ndn").unwrap()).unwrap();
    root.anchor().save_to(&path).unwrap();

    let loaded = TrustAnchor::load_from(&path).unwrap();
    assert_eq!(&loaded, root.anchor());
    assert_eq!(loaded.domain(), &Name::parse("/ndn").unwrap());
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(TrustAnchor::load_from(dir.path().join("missing.cert")).is_err());
}

#[test]
fn test_loaded_anchor_verifies_objects() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trust.cert");

    let root = RootAuthority::generate(Name::parse("/ndn").unwrap()).unwrap();
    root.anchor().save_to(&path).unwrap();

    let identity = RouterIdentity::from_ordinal(3);
    let ctx = root.issue(&identity).unwrap();
    let obj = SignedRoutingObject::build(
        Name::parse("/ndn/ndvrSync/%C1.Router/Router3/1").unwrap(),
        vec![1, 2, 3],
        Duration::from_secs(10),
        &ctx,
    )
    .unwrap();

    let verifier = TrustVerifier::new(TrustAnchor::load_from(&path).unwrap());
    assert_eq!(obj.verify(&verifier, &identity, Utc::now()), Verdict::Accepted);

    // A different network's anchor rejects the same object
    let other = RootAuthority::generate(Name::parse("/ndn").unwrap()).unwrap();
    let foreign = TrustVerifier::new(other.anchor().clone());
    assert!(!obj.verify(&foreign, &identity, Utc::now()).is_accepted());
}
