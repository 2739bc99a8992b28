//! Forbidden symbol registry
//!
//! Append-only list of sentinel markers. Each marker must be defined by exactly
//! one internal dependency, so that seeing it after including only the public
//! headers is unambiguous evidence that the dependency leaked. The probe cannot
//! verify that uniqueness; choosing markers well is up to whoever edits the
//! registry.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::preprocess::lexer::is_identifier;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForbiddenSymbolEntry {
    /// Macro name, e.g. `_THRIFT_THRIFT_H_`
    #[serde(rename = "marker")]
    pub name: String,
    /// Internal dependency that defines the marker, e.g. `thrift`
    #[serde(rename = "dependency")]
    pub originating_dependency: String,
    /// Dependency header known to define the marker, used by the detection self-test
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

impl ForbiddenSymbolEntry {
    pub fn new(name: impl Into<String>, originating_dependency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            originating_dependency: originating_dependency.into(),
            header: None,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_identifier(&self.name) {
            return Err(ConfigError::InvalidMarker(self.name.clone()));
        }
        if self.originating_dependency.trim().is_empty() {
            return Err(ConfigError::MissingDependency(self.name.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForbiddenSymbolRegistry {
    entries: Vec<ForbiddenSymbolEntry>,
}

impl ForbiddenSymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(
        entries: impl IntoIterator<Item = ForbiddenSymbolEntry>,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for entry in entries {
            registry.add(entry)?;
        }
        Ok(registry)
    }

    /// Append an entry. Rejects invalid entries and markers already registered.
    pub fn add(&mut self, entry: ForbiddenSymbolEntry) -> Result<(), ConfigError> {
        entry.validate()?;
        if self.contains(&entry.name) {
            return Err(ConfigError::DuplicateMarker(entry.name));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.entries.iter().any(|e| e.name == marker)
    }

    pub fn entries(&self) -> &[ForbiddenSymbolEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ForbiddenSymbolEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct dependencies covered, in registry order.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|e| e.originating_dependency.as_str())
            .filter(|d| seen.insert(*d))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ForbiddenSymbolRegistry {
    type Item = &'a ForbiddenSymbolEntry;
    type IntoIter = std::slice::Iter<'a, ForbiddenSymbolEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
