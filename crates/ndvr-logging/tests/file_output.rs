//! File output through the full subscriber stack

use ndvr_core::RouterIdentity;
use ndvr_logging::{ConsoleFormat, FileConfig, NdvrSubscriberBuilder, RouterContextGuard};
use tracing::{info, info_span};

#[test]
fn test_jsonl_file_output() {
    let dir = tempfile::tempdir().unwrap();
    let file = FileConfig::for_run(dir.path(), 3);
    let (subscriber, guard) = NdvrSubscriberBuilder::new()
        .with_console(ConsoleFormat::Off)
        .with_file_output(file.clone())
        .build()
        .unwrap();

    let router = RouterIdentity::from_ordinal(2);
    tracing::subscriber::with_default(subscriber, || {
        let _context = RouterContextGuard::new(&router);
        let span = info_span!("router", id = %router);
        let _entered = span.enter();
        info!(round = 3, destinations = 4, "Round complete");
        tracing::debug!("Filtered out at info");
    });
    drop(guard);

    assert!(file.path().ends_with("ndvr-run3.log"));
    let text = std::fs::read_to_string(file.path()).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["message"], "Round complete");
    assert_eq!(lines[0]["destinations"], 4);
    assert_eq!(lines[0]["span"]["id"], "/%C1.Router/Router2");
    assert_eq!(lines[0]["router"], "Router2");
}

#[test]
fn test_rerun_truncates_log() {
    let dir = tempfile::tempdir().unwrap();
    let file = FileConfig::for_run(dir.path(), 0);

    for round in [1, 2] {
        let (subscriber, guard) = NdvrSubscriberBuilder::new()
            .with_console(ConsoleFormat::Off)
            .with_file_output(file.clone())
            .build()
            .unwrap();
        tracing::subscriber::with_default(subscriber, || info!(round, "Round complete"));
        drop(guard);
    }

    let text = std::fs::read_to_string(file.path()).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["round"], 2);
}
