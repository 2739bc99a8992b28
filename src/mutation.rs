//! Detection self-test
//!
//! A registry entry is only useful if its marker really shows up when the
//! dependency leaks. For every entry that names the dependency header defining
//! its marker, and for every public header, this injects
//! `#include "<dependency header>"` at the top of that public header (in memory
//! only) and checks that the probe now flags the entry.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::PublicHeaderAggregate;
use crate::diagnostic::{
    Diagnostic, SELF_TEST_BUILD_FAILED, SELF_TEST_MISSED, SELF_TEST_SKIPPED,
};
use crate::error::ProbeError;
use crate::preprocess::{locate_header, HeaderSource, InjectedSource, PreprocessOptions};
use crate::probe::LeakageProbe;
use crate::registry::{ForbiddenSymbolEntry, ForbiddenSymbolRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutationStatus {
    /// The injected dependency made the marker visible.
    Detected,
    /// The injected dependency did not make the marker visible.
    Missed,
    /// The entry declares no dependency header.
    Skipped,
    /// The mutated translation unit failed to build.
    BuildFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub entry: ForbiddenSymbolEntry,
    /// Public header the dependency was injected into; `None` when skipped.
    pub injected_into: Option<String>,
    #[serde(flatten)]
    pub status: MutationStatus,
}

impl MutationOutcome {
    pub fn to_diagnostic(&self) -> Option<Diagnostic> {
        let marker = &self.entry.name;
        let dependency = &self.entry.originating_dependency;
        let header = self.entry.header.as_deref().unwrap_or_default();
        let target = self.injected_into.as_deref().unwrap_or_default();
        let diag = match &self.status {
            MutationStatus::Detected => return None,
            MutationStatus::Missed => Diagnostic::error(
                SELF_TEST_MISSED,
                marker,
                format!(
                    "including `{}` from `{}` did not make marker `{}` visible; the entry cannot detect a leak of `{}`",
                    header, target, marker, dependency
                ),
            )
            .at(target)
            .with_hint("pick a marker the dependency header defines unconditionally"),
            MutationStatus::BuildFailed { reason } => Diagnostic::error(
                SELF_TEST_BUILD_FAILED,
                marker,
                format!("injecting `{}` into `{}` broke the build: {}", header, target, reason),
            )
            .at(target)
            .with_hint("check the entry's `header` path and the include directories"),
            MutationStatus::Skipped => Diagnostic::warn(
                SELF_TEST_SKIPPED,
                marker,
                format!(
                    "marker `{}` ({}) declares no dependency header; detection power not verified",
                    marker, dependency
                ),
            )
            .with_hint("add `header:` to the registry entry"),
        };
        Some(diag)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfTestReport {
    outcomes: Vec<MutationOutcome>,
}

impl SelfTestReport {
    pub fn outcomes(&self) -> &[MutationOutcome] {
        &self.outcomes
    }

    /// True when no injection went undetected or failed to build. Skipped entries only warn.
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|o| {
            matches!(
                o.status,
                MutationStatus::Detected | MutationStatus::Skipped
            )
        })
    }

    pub fn count(&self, pred: impl Fn(&MutationStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.outcomes
            .iter()
            .filter_map(MutationOutcome::to_diagnostic)
            .collect()
    }
}

/// Verify that every entry with a declared header is detected when that header
/// is injected into each public header in turn.
///
/// Fails only if the unmodified aggregate cannot be located; per-injection
/// build failures are recorded as outcomes so every entry is still tested.
pub fn verify_detection<S: HeaderSource + ?Sized>(
    aggregate: &PublicHeaderAggregate,
    source: &S,
    registry: &ForbiddenSymbolRegistry,
    options: &PreprocessOptions,
) -> Result<SelfTestReport, ProbeError> {
    let targets = aggregate
        .headers()
        .iter()
        .map(|header| {
            locate_header(source, aggregate.include_dirs(), header)
                .map(|path| (header.clone(), path))
                .ok_or_else(|| ProbeError::PublicHeaderNotFound {
                    header: header.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut outcomes = Vec::new();
    for entry in registry {
        let Some(dependency_header) = entry.header.as_deref() else {
            outcomes.push(MutationOutcome {
                entry: entry.clone(),
                injected_into: None,
                status: MutationStatus::Skipped,
            });
            continue;
        };

        for (public_header, path) in &targets {
            let overlay = InjectedSource::include(source, path, dependency_header);
            let status = match LeakageProbe::compile(aggregate, &overlay, options) {
                Ok(probe) if probe.check(entry).violated => MutationStatus::Detected,
                Ok(_) => MutationStatus::Missed,
                Err(e) => MutationStatus::BuildFailed {
                    reason: e.to_string(),
                },
            };
            debug!(
                "Self-test {} via {} into {}: {:?}",
                entry.name, dependency_header, public_header, status
            );
            outcomes.push(MutationOutcome {
                entry: entry.clone(),
                injected_into: Some(public_header.clone()),
                status,
            });
        }
    }

    let report = SelfTestReport { outcomes };
    info!(
        "Self-test: {} detected, {} missed, {} build failures, {} skipped",
        report.count(|s| matches!(s, MutationStatus::Detected)),
        report.count(|s| matches!(s, MutationStatus::Missed)),
        report.count(|s| matches!(s, MutationStatus::BuildFailed { .. })),
        report.count(|s| matches!(s, MutationStatus::Skipped)),
    );
    Ok(report)
}
