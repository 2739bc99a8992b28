//! End-to-end leak checks against an on-disk header tree.
//!
//! Covers the four reference situations (clean tree, one leak, two leaks,
//! empty registry) plus repeatability and the separation between a leak and a
//! broken public header.

mod common;

use common::*;
use header_leak_guard::{
    run_all, verify, FsSource, LeakageProbe, ProbeConfig, ProbeError,
    EXIT_CLEAN, EXIT_VIOLATION,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn check(fixture: &Fixture) -> header_leak_guard::HarnessReport {
    let config = fixture.standard_config();
    verify(&config.aggregate, &FsSource, &config.registry, &config.options)
        .expect("public headers preprocess")
}

#[test]
fn test_clean_public_headers_pass() {
    let fixture = Fixture::clean();
    let report = check(&fixture);

    assert_eq!(report.results().len(), 2);
    assert!(report.results().iter().all(|r| !r.violated));
    assert!(report.passed());
    assert_eq!(report.exit_code(), EXIT_CLEAN);
    report.assert_clean();
}

#[test]
fn test_codec_leak_through_schema_is_reported_alone() {
    let fixture = Fixture::clean();
    fixture.inject_include("parquet/api/schema.h", "parquet/thrift_internal.h");

    let report = check(&fixture);
    let codec = &report.results()[0];
    let log = &report.results()[1];

    assert_eq!(codec.entry.name, CODEC_MARKER);
    assert!(codec.violated);
    assert!(codec.diagnostic.contains("`thrift`"));
    let origin = codec.origin.as_ref().expect("violation carries origin");
    assert_eq!(origin.defined_at.file, "thrift/Thrift.h");
    // reader.h is the first public header to include schema.h.
    assert_eq!(
        origin.include_chain,
        vec![
            "parquet/api/reader.h",
            "parquet/api/schema.h",
            "parquet/thrift_internal.h",
            "thrift/Thrift.h"
        ]
    );

    assert_eq!(log.entry.name, LOG_MARKER);
    assert!(!log.violated);

    assert!(!report.passed());
    assert_eq!(report.exit_code(), EXIT_VIOLATION);
    assert_eq!(report.violation_count(), 1);
}

#[test]
fn test_direct_include_in_first_public_header_points_at_it() {
    let fixture = Fixture::clean();
    fixture.inject_include("parquet/api/io.h", "thrift/Thrift.h");

    let report = check(&fixture);
    let codec = &report.results()[0];
    let origin = codec.origin.as_ref().unwrap();
    assert_eq!(origin.include_chain, vec!["parquet/api/io.h", "thrift/Thrift.h"]);

    let diagnostic = codec.to_diagnostic();
    assert_eq!(diagnostic.location.as_deref(), Some("thrift/Thrift.h:2"));
    assert_eq!(
        diagnostic.hint.as_deref(),
        Some("stop including `thrift/Thrift.h` from `parquet/api/io.h`, or move that include into a source file")
    );
}

#[test]
fn test_simultaneous_leaks_are_both_reported() {
    let fixture = Fixture::clean();
    fixture.inject_include("parquet/api/schema.h", "parquet/thrift_internal.h");
    fixture.inject_include("parquet/api/writer.h", "parquet/util/logging.h");

    let report = check(&fixture);

    assert_eq!(report.violation_count(), 2);
    assert!(!report.passed());

    let diagnostics = report.diagnostics();
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].marker, CODEC_MARKER);
    assert!(diagnostics[0].message.contains(CODEC_DEPENDENCY));
    assert_eq!(diagnostics[1].marker, LOG_MARKER);
    assert!(diagnostics[1].message.contains(LOG_DEPENDENCY));
    assert!(diagnostics[1]
        .hint
        .as_deref()
        .unwrap()
        .contains("parquet/util/logging.h"));
}

#[test]
fn test_empty_registry_is_a_trivial_pass() {
    let fixture = Fixture::clean();
    fixture.inject_include("parquet/api/schema.h", "parquet/thrift_internal.h");
    let config = ProbeConfig::load(fixture.write_manifest(&[])).unwrap();

    let report = verify(&config.aggregate, &FsSource, &config.registry, &config.options).unwrap();
    assert!(report.results().is_empty());
    assert!(report.passed());
}

#[test]
fn test_every_public_header_can_carry_a_leak() {
    for header in PUBLIC_HEADERS {
        let fixture = Fixture::clean();
        fixture.inject_include(header, "parquet/util/logging.h");

        let report = check(&fixture);
        assert!(
            report.results()[1].violated,
            "logging leak via {} went undetected",
            header
        );
        assert!(
            !report.results()[0].violated,
            "codec marker flagged although only logging leaked via {}",
            header
        );
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let fixture = Fixture::clean();
    fixture.inject_include("parquet/api/writer.h", "parquet/util/logging.h");
    let config = fixture.standard_config();

    let probe = LeakageProbe::compile(&config.aggregate, &FsSource, &config.options).unwrap();
    let first = run_all(&probe, &config.registry);
    let second = run_all(&probe, &config.registry);
    let recompiled = check(&fixture);

    assert_eq!(first, second);
    assert_eq!(first, recompiled);
    assert_eq!(first.to_json().unwrap(), recompiled.to_json().unwrap());
}

#[test]
fn test_undef_after_leak_hides_the_marker() {
    let fixture = Fixture::clean();
    fixture.inject_include("parquet/api/writer.h", "parquet/util/logging.h");
    fixture.write(
        "include/parquet/api/writer.h",
        &(fixture.read("include/parquet/api/writer.h") + "#undef DCHECK\n"),
    );

    let report = check(&fixture);
    assert!(report.passed());
}

#[test]
fn test_broken_public_header_is_a_build_error_not_a_violation() {
    let fixture = Fixture::clean();
    fixture.inject_include("parquet/api/io.h", "parquet/does_not_exist.h");
    let config = fixture.standard_config();

    let err = LeakageProbe::compile(&config.aggregate, &FsSource, &config.options).unwrap_err();
    assert!(matches!(
        err,
        ProbeError::HeaderNotFound { ref target, .. } if target == "parquet/does_not_exist.h"
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_only_the_included_dependency_is_flagged(
        leaking in prop::collection::vec(any::<bool>(), PUBLIC_HEADERS.len()),
        via_logging in any::<bool>(),
    ) {
        let fixture = Fixture::clean();
        let (dependency_header, leaked, clear) = if via_logging {
            ("parquet/util/logging.h", LOG_MARKER, CODEC_MARKER)
        } else {
            ("parquet/thrift_internal.h", CODEC_MARKER, LOG_MARKER)
        };
        for (header, _) in PUBLIC_HEADERS.iter().zip(&leaking).filter(|(_, leak)| **leak) {
            fixture.inject_include(header, dependency_header);
        }
        let any_leak = leaking.iter().any(|leak| *leak);

        let report = check(&fixture);
        let flagged = |marker: &str| {
            report
                .results()
                .iter()
                .any(|r| r.entry.name == marker && r.violated)
        };
        prop_assert_eq!(flagged(leaked), any_leak);
        prop_assert!(!flagged(clear));
        prop_assert_eq!(report.exit_code(), if any_leak { EXIT_VIOLATION } else { EXIT_CLEAN });
        prop_assert_eq!(&report, &check(&fixture));
    }
}
