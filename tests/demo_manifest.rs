//! The checked-in demo manifest under `demos/parquet/` must stay clean and
//! every marker in it must stay detectable.

use std::path::PathBuf;

use header_leak_guard::{verify, verify_detection, FsSource, ProbeConfig};

fn demo_manifest() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/parquet/leakcheck.yaml")
}

#[test]
fn test_demo_public_headers_do_not_leak() {
    let config = ProbeConfig::load(demo_manifest()).expect("load demo manifest");
    let report = verify(&config.aggregate, &FsSource, &config.registry, &config.options)
        .expect("demo headers preprocess");

    assert_eq!(report.results().len(), 2);
    report.assert_clean();
}

#[test]
fn test_demo_markers_are_detectable() {
    let config = ProbeConfig::load(demo_manifest()).expect("load demo manifest");
    let report = verify_detection(&config.aggregate, &FsSource, &config.registry, &config.options)
        .expect("demo headers resolve");

    assert_eq!(report.outcomes().len(), 8);
    assert!(report.passed(), "{:?}", report.diagnostics());
}
