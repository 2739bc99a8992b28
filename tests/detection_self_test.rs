//! Detection self-test against an on-disk header tree: every registered marker
//! must become visible when its dependency header is pulled into any public
//! header, and the check must not modify the tree.

mod common;

use common::*;
use header_leak_guard::{verify_detection, Define, FsSource, MutationStatus, ProbeConfig};

#[test]
fn test_every_marker_is_detectable_from_every_public_header() {
    let fixture = Fixture::clean();
    let config = fixture.standard_config();

    let report = verify_detection(&config.aggregate, &FsSource, &config.registry, &config.options)
        .expect("public headers resolve");

    assert_eq!(report.outcomes().len(), 2 * PUBLIC_HEADERS.len());
    for outcome in report.outcomes() {
        assert_eq!(
            outcome.status,
            MutationStatus::Detected,
            "{} not detected via {:?}",
            outcome.entry.name,
            outcome.injected_into
        );
    }
    assert!(report.passed());
}

#[test]
fn test_self_test_leaves_headers_untouched() {
    let fixture = Fixture::clean();
    let before: Vec<String> = PUBLIC_HEADERS
        .iter()
        .map(|h| fixture.read(&format!("include/{}", h)))
        .collect();
    let config = fixture.standard_config();

    verify_detection(&config.aggregate, &FsSource, &config.registry, &config.options).unwrap();

    let after: Vec<String> = PUBLIC_HEADERS
        .iter()
        .map(|h| fixture.read(&format!("include/{}", h)))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_marker_hidden_behind_a_config_macro_is_flagged_as_missed() {
    let fixture = Fixture::clean();
    fixture.write(
        "include/arrow/logging.h",
        "#pragma once\n#ifdef ARROW_EXTRA_LOGGING\n#define ARROW_LOG_INTERNAL 1\n#endif\n",
    );
    let path = fixture.write_manifest(&[
        (LOG_MARKER, LOG_DEPENDENCY, Some("parquet/util/logging.h")),
        ("ARROW_LOG_INTERNAL", "arrow logging", Some("arrow/logging.h")),
        ("ARROW_CHECK_INTERNAL", "arrow logging", None),
    ]);
    let config = ProbeConfig::load(path).unwrap();

    let report =
        verify_detection(&config.aggregate, &FsSource, &config.registry, &config.options).unwrap();

    assert!(!report.passed());
    assert_eq!(
        report.count(|s| *s == MutationStatus::Detected),
        PUBLIC_HEADERS.len()
    );
    assert_eq!(
        report.count(|s| *s == MutationStatus::Missed),
        PUBLIC_HEADERS.len()
    );
    assert_eq!(report.count(|s| *s == MutationStatus::Skipped), 1);

    let diagnostics = report.diagnostics();
    assert!(diagnostics
        .iter()
        .filter(|d| d.is_error())
        .all(|d| d.marker == "ARROW_LOG_INTERNAL"));
    assert!(diagnostics
        .iter()
        .any(|d| d.is_warning() && d.marker == "ARROW_CHECK_INTERNAL"));
}

#[test]
fn test_predefined_macro_restores_detection() {
    let fixture = Fixture::clean();
    fixture.write(
        "include/arrow/logging.h",
        "#pragma once\n#ifdef ARROW_EXTRA_LOGGING\n#define ARROW_LOG_INTERNAL 1\n#endif\n",
    );
    let path = fixture.write_manifest(&[(
        "ARROW_LOG_INTERNAL",
        "arrow logging",
        Some("arrow/logging.h"),
    )]);
    let mut config = ProbeConfig::load(path).unwrap();
    config.add_defines([Define::parse("ARROW_EXTRA_LOGGING").unwrap()]);

    let report =
        verify_detection(&config.aggregate, &FsSource, &config.registry, &config.options).unwrap();
    assert!(report.passed());
}
