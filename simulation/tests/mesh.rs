//! Simulated routers over the shared mesh

use std::time::Duration;

use ndvr_core::ForwardingSubstrate;
use ndvr_crypto::{SignedRoutingObject, TrustVerifier, Verdict};
use ndvr_simulation::{SimConfig, Simulation, TopologyBuilder, router};
use ndvr_sync::load_trust_anchor;

fn config() -> SimConfig {
    SimConfig {
        rounds: 2,
        round_duration: Duration::from_secs(10),
        fetch_timeout: Duration::from_millis(200),
        ..SimConfig::default()
    }
}

#[tokio::test]
async fn test_exported_anchor_verifies_published_objects() {
    let mut sim = Simulation::new(TopologyBuilder::new(2).line(), config()).unwrap();
    sim.step_round().await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config").join("trust.cert");
    sim.anchor().save_to(&path).unwrap();
    let verifier = TrustVerifier::new(load_trust_anchor(&path).unwrap());

    // Pull router 0's latest object through a fresh face
    let face = sim.mesh().attach(router(9));
    sim.mesh().connect(&router(9), &router(0));
    let prefix = sim.engine(0).unwrap().codec().object_prefix(&router(0));
    let bytes = face.fetch(&prefix, Duration::from_millis(100)).await.unwrap();
    let object = SignedRoutingObject::from_bytes(&bytes).unwrap();

    assert_eq!(
        object.verify(&verifier, &router(0), chrono::Utc::now()),
        Verdict::Accepted
    );
}

#[tokio::test]
async fn test_lossy_mesh_still_converges() {
    let mut sim = Simulation::new(
        TopologyBuilder::new(4).line(),
        SimConfig {
            rounds: 20,
            loss: 0.2,
            seed: 42,
            ..config()
        },
    )
    .unwrap();
    sim.run().await.unwrap();

    assert!(sim.converged());
    assert!(sim.stats.mesh.dropped > 0);
    assert_eq!(sim.stats.trust_rejections, 0);
}
