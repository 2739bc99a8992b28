//! Manifest loading
//!
//! The registry and the aggregate are data, kept in a YAML manifest next to the
//! headers they describe:
//!
//! ```yaml
//! include_dirs: [include]
//! public_headers:
//!   - parquet/api/io.h
//!   - parquet/api/reader.h
//! defines: [PARQUET_EXPORT=]
//! forbidden:
//!   - marker: _THRIFT_THRIFT_H_
//!     dependency: thrift
//!     header: thrift/Thrift.h
//! ```
//!
//! Relative include directories resolve against the manifest's directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::PublicHeaderAggregate;
use crate::error::ConfigError;
use crate::preprocess::{Define, PreprocessOptions, DEFAULT_MAX_INCLUDE_DEPTH};
use crate::registry::{ForbiddenSymbolEntry, ForbiddenSymbolRegistry};

/// Environment variable naming the manifest when `--config` is not given.
pub const CONFIG_ENV: &str = "LEAKCHECK_CONFIG";
pub const DEFAULT_MANIFEST: &str = "leakcheck.yaml";

fn default_max_include_depth() -> usize {
    DEFAULT_MAX_INCLUDE_DEPTH
}

/// On-disk manifest shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
    pub public_headers: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub forbidden: Vec<ForbiddenSymbolEntry>,
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,
}

/// Validated configuration ready to drive a probe run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub aggregate: PublicHeaderAggregate,
    pub registry: ForbiddenSymbolRegistry,
    pub options: PreprocessOptions,
}

impl ProbeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading leak-check manifest from {}", path.display());

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Manifest =
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::from_manifest(manifest, base_dir)?;
        info!(
            "Loaded {} public header(s) and {} forbidden marker(s)",
            config.aggregate.len(),
            config.registry.len()
        );
        Ok(config)
    }

    pub fn from_manifest(manifest: Manifest, base_dir: &Path) -> Result<Self, ConfigError> {
        let include_dirs = manifest
            .include_dirs
            .into_iter()
            .map(|dir| {
                if dir.is_absolute() {
                    dir
                } else {
                    base_dir.join(dir)
                }
            })
            .collect();
        let aggregate = PublicHeaderAggregate::from_parts(include_dirs, manifest.public_headers)?;
        let registry = ForbiddenSymbolRegistry::from_entries(manifest.forbidden)?;
        let defines = manifest
            .defines
            .iter()
            .map(|d| Define::parse(d))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            aggregate,
            registry,
            options: PreprocessOptions {
                defines,
                max_include_depth: manifest.max_include_depth,
            },
        })
    }

    /// Extra include directories, searched after the manifest's own.
    pub fn add_include_dirs(&mut self, dirs: impl IntoIterator<Item = PathBuf>) {
        for dir in dirs {
            self.aggregate.add_include_dir(dir);
        }
    }

    pub fn add_defines(&mut self, defines: impl IntoIterator<Item = Define>) {
        self.options.defines.extend(defines);
    }
}
