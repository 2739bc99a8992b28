//! Diagnostic types for leak-check results
//!
//! Every finding the harness or the self-test reports is a [`Diagnostic`] with a
//! stable rule code.
//!
//! | Code | Severity | Meaning |
//! |------|----------|---------|
//! | LEAK001 | error | forbidden marker visible through the public headers |
//! | LEAK002 | error | self-test: injected dependency header went undetected |
//! | LEAK003 | error | self-test: injected translation unit failed to build |
//! | LEAK010 | warn | self-test: entry declares no dependency header |
//! | LEAK020 | info | forbidden marker not visible |

use serde::{Deserialize, Serialize};

pub const LEAK_VISIBLE: &str = "LEAK001";
pub const SELF_TEST_MISSED: &str = "LEAK002";
pub const SELF_TEST_BUILD_FAILED: &str = "LEAK003";
pub const SELF_TEST_SKIPPED: &str = "LEAK010";
pub const MARKER_CLEAR: &str = "LEAK020";

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message (does not fail the run)
    Info,
    /// Warning (does not fail the run, but should be addressed)
    Warn,
    /// Error (fails the run)
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warn => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Rule code (e.g., "LEAK001")
    pub code: String,
    pub severity: Severity,
    /// The marker the finding is about
    pub marker: String,
    /// Where it was found: a `file:line`, or the public header under test
    pub location: Option<String>,
    pub message: String,
    /// Optional hint for fixing the issue
    pub hint: Option<String>,
}

impl Diagnostic {
    fn with_severity(
        severity: Severity,
        code: impl Into<String>,
        marker: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            marker: marker.into(),
            location: None,
            message: message.into(),
            hint: None,
        }
    }

    pub fn error(
        code: impl Into<String>,
        marker: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::with_severity(Severity::Error, code, marker, message)
    }

    pub fn warn(
        code: impl Into<String>,
        marker: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::with_severity(Severity::Warn, code, marker, message)
    }

    pub fn info(
        code: impl Into<String>,
        marker: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::with_severity(Severity::Info, code, marker, message)
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warn
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.severity)?;
        if let Some(location) = &self.location {
            write!(f, " at {}", location)?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}
