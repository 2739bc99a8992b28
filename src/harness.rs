//! Verification harness
//!
//! Runs the probe for every registry entry, in registry order, without stopping
//! at the first violation, and reports the per-entry results plus an overall
//! outcome.

use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::PublicHeaderAggregate;
use crate::diagnostic::Diagnostic;
use crate::error::ProbeError;
use crate::preprocess::{HeaderSource, PreprocessOptions};
use crate::probe::{LeakageProbe, ProbeResult};
use crate::registry::ForbiddenSymbolRegistry;

/// Exit status when every marker is clear.
pub const EXIT_CLEAN: u8 = 0;
/// Exit status when at least one marker leaked.
pub const EXIT_VIOLATION: u8 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessReport {
    results: Vec<ProbeResult>,
    passed: bool,
}

impl HarnessReport {
    pub fn new(results: Vec<ProbeResult>) -> Self {
        let passed = !results.iter().any(|r| r.violated);
        Self { results, passed }
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    /// True when no registered marker is visible.
    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn violations(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| r.violated)
    }

    pub fn violation_count(&self) -> usize {
        self.violations().count()
    }

    pub fn exit_code(&self) -> u8 {
        if self.passed {
            EXIT_CLEAN
        } else {
            EXIT_VIOLATION
        }
    }

    /// One error diagnostic per violation, in registry order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.violations().map(ProbeResult::to_diagnostic).collect()
    }

    /// Text report as printed by `leakcheck check`: one line per entry, one
    /// diagnostic per violation, then the verdict. `color` adds ANSI styling.
    pub fn render_text(&self, color: bool) -> String {
        let mut out = String::from("Public API leak check\n=====================\n");
        if self.results.is_empty() {
            out.push_str("  No forbidden markers registered.\n");
        }
        for result in &self.results {
            let status = if result.violated {
                paint(" FAIL", color, |s| s.red().bold())
            } else {
                paint("   ok", color, |s| s.green())
            };
            let name = format!("{:32}", result.entry.name);
            out.push_str(&format!(
                "  [{}] {} {}\n",
                status,
                name,
                paint(&result.entry.originating_dependency, color, |s| s.dimmed())
            ));
        }

        let diagnostics = self.diagnostics();
        if !diagnostics.is_empty() {
            out.push('\n');
            for d in &diagnostics {
                out.push_str(&format!("  {}\n", paint(&d.to_string(), color, |s| s.red())));
            }
        }

        let verdict = if self.passed {
            paint("PASS", color, |s| s.green().bold())
        } else {
            paint("FAIL", color, |s| s.red().bold())
        };
        out.push_str(&format!(
            "\n{} {} marker(s) checked, {} violation(s)\n",
            verdict,
            self.results.len(),
            self.violation_count()
        ));
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Panic with every violation's diagnostic. Intended for `#[test]` functions.
    pub fn assert_clean(&self) {
        if !self.passed {
            let lines: Vec<String> = self.diagnostics().iter().map(|d| d.to_string()).collect();
            panic!(
                "{} internal marker(s) leaked through the public headers:\n{}",
                lines.len(),
                lines.join("\n")
            );
        }
    }
}

fn paint(text: &str, color: bool, style: fn(&str) -> ColoredString) -> String {
    if color {
        style(text).to_string()
    } else {
        text.to_string()
    }
}

/// Check every registry entry against one compiled probe.
pub fn run_all(probe: &LeakageProbe, registry: &ForbiddenSymbolRegistry) -> HarnessReport {
    let results: Vec<ProbeResult> = registry.iter().map(|entry| probe.check(entry)).collect();
    let report = HarnessReport::new(results);

    for violation in report.violations() {
        warn!("{}", violation.diagnostic);
    }
    info!(
        "Leak check: {} marker(s), {} violation(s)",
        report.results.len(),
        report.violation_count()
    );
    report
}

/// Compile the aggregate and run every registry entry against it.
pub fn verify<S: HeaderSource + ?Sized>(
    aggregate: &PublicHeaderAggregate,
    source: &S,
    registry: &ForbiddenSymbolRegistry,
    options: &PreprocessOptions,
) -> Result<HarnessReport, ProbeError> {
    let probe = LeakageProbe::compile(aggregate, source, options)?;
    Ok(run_all(&probe, registry))
}
