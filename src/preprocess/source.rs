//! Where header text comes from
//!
//! The preprocessor never touches the filesystem directly; it asks a
//! [`HeaderSource`]. Besides the plain filesystem this allows an in-memory tree
//! (handy for tests) and an overlay that injects an `#include` into one header
//! without modifying it on disk (used by the detection self-test).

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::error::ProbeError;

pub trait HeaderSource {
    /// Whether `path` names a readable header.
    fn exists(&self, path: &Path) -> bool;

    /// Full text of the header at `path`.
    fn read(&self, path: &Path) -> Result<String, ProbeError>;
}

impl<S: HeaderSource + ?Sized> HeaderSource for &S {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn read(&self, path: &Path) -> Result<String, ProbeError> {
        (**self).read(path)
    }
}

/// Headers on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl HeaderSource for FsSource {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> Result<String, ProbeError> {
        std::fs::read_to_string(path).map_err(|source| ProbeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Headers held in memory, keyed by normalised path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<PathBuf, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) -> &mut Self {
        self.files.insert(normalize(path.as_ref()), text.into());
        self
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
}

impl HeaderSource for MemorySource {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }

    fn read(&self, path: &Path) -> Result<String, ProbeError> {
        self.files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| ProbeError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such header"),
            })
    }
}

/// Wraps another source and prepends `prelude` to one target header.
#[derive(Debug, Clone)]
pub struct InjectedSource<S> {
    inner: S,
    target: PathBuf,
    prelude: String,
}

impl<S: HeaderSource> InjectedSource<S> {
    pub fn new(inner: S, target: impl AsRef<Path>, prelude: impl Into<String>) -> Self {
        Self {
            inner,
            target: normalize(target.as_ref()),
            prelude: prelude.into(),
        }
    }

    /// Overlay that makes `target` start with `#include "<header>"`.
    pub fn include(inner: S, target: impl AsRef<Path>, header: &str) -> Self {
        Self::new(inner, target, format!("#include \"{}\"\n", header))
    }
}

impl<S: HeaderSource> HeaderSource for InjectedSource<S> {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn read(&self, path: &Path) -> Result<String, ProbeError> {
        let text = self.inner.read(path)?;
        if normalize(path) == self.target {
            Ok(format!("{}{}", self.prelude, text))
        } else {
            Ok(text)
        }
    }
}

/// Lexically normalise a path: drop `.` components and fold `..` where possible.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("include/./parquet/../thrift/Thrift.h")),
            PathBuf::from("include/thrift/Thrift.h")
        );
        assert_eq!(normalize(Path::new("../a/b.h")), PathBuf::from("../a/b.h"));
    }

    #[test]
    fn test_injected_source_only_touches_target() {
        let base = MemorySource::new()
            .with_file("inc/parquet/api/schema.h", "#pragma once\n")
            .with_file("inc/parquet/api/io.h", "#pragma once\n");
        let overlay = InjectedSource::include(&base, "inc/parquet/api/schema.h", "thrift/Thrift.h");

        let schema = overlay.read(Path::new("inc/parquet/./api/schema.h")).unwrap();
        assert_eq!(schema, "#include \"thrift/Thrift.h\"\n#pragma once\n");
        let io = overlay.read(Path::new("inc/parquet/api/io.h")).unwrap();
        assert_eq!(io, "#pragma once\n");
        assert!(overlay.exists(Path::new("inc/parquet/api/io.h")));
    }

    #[test]
    fn test_memory_source_missing_file_is_io_error() {
        let source = MemorySource::new();
        assert!(matches!(
            source.read(Path::new("missing.h")),
            Err(ProbeError::Io { .. })
        ));
    }
}
