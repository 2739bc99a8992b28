//! Leakage probe
//!
//! Compiles the public header aggregate once and answers, per registry entry,
//! whether the entry's marker is visible in the resulting translation unit.

use serde::{Deserialize, Serialize};

use crate::aggregate::PublicHeaderAggregate;
use crate::diagnostic::{Diagnostic, LEAK_VISIBLE, MARKER_CLEAR};
use crate::error::ProbeError;
use crate::preprocess::{preprocess, HeaderSource, PreprocessOptions, SourceLocation, TranslationUnit};
use crate::registry::ForbiddenSymbolEntry;

/// Where a leaked marker was defined and how the public headers reached it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerOrigin {
    pub defined_at: SourceLocation,
    pub include_chain: Vec<String>,
}

impl MarkerOrigin {
    /// `a.h -> b.h -> c.h`, or the bare location for command-line defines.
    pub fn chain_display(&self) -> String {
        if self.include_chain.is_empty() {
            self.defined_at.to_string()
        } else {
            self.include_chain.join(" -> ")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub entry: ForbiddenSymbolEntry,
    pub violated: bool,
    pub diagnostic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<MarkerOrigin>,
}

impl ProbeResult {
    pub fn to_diagnostic(&self) -> Diagnostic {
        let Some(origin) = self.origin.as_ref().filter(|_| self.violated) else {
            return Diagnostic::info(MARKER_CLEAR, &self.entry.name, &self.diagnostic);
        };
        let hint = match origin.include_chain.as_slice() {
            [root, next, ..] => format!(
                "stop including `{}` from `{}`, or move that include into a source file",
                next, root
            ),
            _ => format!(
                "the marker is defined directly by a public header or predefined; remove it from `{}`",
                origin.defined_at.file
            ),
        };
        Diagnostic::error(LEAK_VISIBLE, &self.entry.name, &self.diagnostic)
            .at(origin.defined_at.to_string())
            .with_hint(hint)
    }
}

#[derive(Debug, Clone)]
pub struct LeakageProbe {
    unit: TranslationUnit,
}

impl LeakageProbe {
    /// Preprocess the aggregate. Failure here is a broken public contract, not a leak.
    pub fn compile<S: HeaderSource + ?Sized>(
        aggregate: &PublicHeaderAggregate,
        source: &S,
        options: &PreprocessOptions,
    ) -> Result<Self, ProbeError> {
        Ok(Self::from_unit(preprocess(aggregate, source, options)?))
    }

    pub fn from_unit(unit: TranslationUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> &TranslationUnit {
        &self.unit
    }

    pub fn check(&self, entry: &ForbiddenSymbolEntry) -> ProbeResult {
        match self.unit.definition(&entry.name) {
            Some(def) => {
                let origin = MarkerOrigin {
                    defined_at: def.defined_at.clone(),
                    include_chain: def.include_chain.clone(),
                };
                let diagnostic = format!(
                    "marker `{}` from internal dependency `{}` is visible through the public headers (defined at {}, via {})",
                    entry.name,
                    entry.originating_dependency,
                    origin.defined_at,
                    origin.chain_display()
                );
                ProbeResult {
                    entry: entry.clone(),
                    violated: true,
                    diagnostic,
                    origin: Some(origin),
                }
            }
            None => ProbeResult {
                entry: entry.clone(),
                violated: false,
                diagnostic: format!(
                    "marker `{}` from internal dependency `{}` is not visible",
                    entry.name, entry.originating_dependency
                ),
                origin: None,
            },
        }
    }
}
