//! Shared fixture: a small on-disk header tree shaped like a storage library
//! with a public `api/` layer, a generated Thrift codec and an internal
//! logging header.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use header_leak_guard::{ForbiddenSymbolEntry, ForbiddenSymbolRegistry, ProbeConfig};
use tempfile::TempDir;

pub const CODEC_MARKER: &str = "_THRIFT_THRIFT_H_";
pub const CODEC_DEPENDENCY: &str = "thrift";
pub const LOG_MARKER: &str = "DCHECK";
pub const LOG_DEPENDENCY: &str = "parquet/util/logging.h";

pub const PUBLIC_HEADERS: [&str; 4] = [
    "parquet/api/io.h",
    "parquet/api/reader.h",
    "parquet/api/schema.h",
    "parquet/api/writer.h",
];

pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// A clean tree: no public header reaches Thrift or the logging header.
    pub fn clean() -> Self {
        let fixture = Self {
            dir: tempfile::tempdir().expect("create fixture dir"),
        };

        fixture.write(
            "include/parquet/platform.h",
            r#"#ifndef PARQUET_PLATFORM_H
#define PARQUET_PLATFORM_H

#include <cstdint>
#include <memory>

#if defined(_WIN32) && !defined(PARQUET_STATIC)
#  define PARQUET_EXPORT __declspec(dllexport)
#else
#  define PARQUET_EXPORT __attribute__((visibility("default")))
#endif

#endif  // PARQUET_PLATFORM_H
"#,
        );
        fixture.write(
            "include/parquet/api/io.h",
            "#ifndef PARQUET_API_IO_H\n#define PARQUET_API_IO_H\n\n#include \"parquet/platform.h\"\n\n#endif\n",
        );
        fixture.write(
            "include/parquet/api/reader.h",
            "#ifndef PARQUET_API_READER_H\n#define PARQUET_API_READER_H\n\n#include \"parquet/api/io.h\"\n#include \"parquet/api/schema.h\"\n\n#endif\n",
        );
        fixture.write(
            "include/parquet/api/schema.h",
            "#ifndef PARQUET_API_SCHEMA_H\n#define PARQUET_API_SCHEMA_H\n\n#include \"parquet/platform.h\"\n\n#endif\n",
        );
        fixture.write(
            "include/parquet/api/writer.h",
            "#ifndef PARQUET_API_WRITER_H\n#define PARQUET_API_WRITER_H\n\n#include \"parquet/api/io.h\"\n\n#endif\n",
        );
        fixture.write(
            "include/thrift/Thrift.h",
            "#ifndef _THRIFT_THRIFT_H_\n#define _THRIFT_THRIFT_H_ 1\n\n#include <string>\n\n#endif\n",
        );
        fixture.write(
            "include/parquet/thrift_internal.h",
            "#pragma once\n\n#include <thrift/Thrift.h>\n",
        );
        fixture.write(
            "include/parquet/util/logging.h",
            r#"#pragma once

#include "parquet/platform.h"

#ifdef NDEBUG
#define DCHECK(condition) while (false) PARQUET_IGNORE_EXPR(condition)
#else
#define DCHECK(condition) PARQUET_CHECK(condition)
#endif
"#,
        );
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn include_dir(&self) -> PathBuf {
        self.root().join("include")
    }

    pub fn write(&self, rel: &str, text: &str) {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture subdir");
        }
        std::fs::write(path, text).expect("write fixture file");
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root().join(rel)).expect("read fixture file")
    }

    /// Add `#include "<target>"` right after the include guard of `header`.
    pub fn inject_include(&self, header: &str, target: &str) {
        let rel = format!("include/{}", header);
        let text = self.read(&rel);
        let mut lines: Vec<&str> = text.lines().collect();
        let include = format!("#include \"{}\"", target);
        lines.insert(2, &include);
        self.write(&rel, &(lines.join("\n") + "\n"));
    }

    /// Write `leakcheck.yaml` with the four public headers and the given entries.
    pub fn write_manifest(&self, entries: &[(&str, &str, Option<&str>)]) -> PathBuf {
        let mut yaml = String::from("include_dirs: [include]\npublic_headers:\n");
        for header in PUBLIC_HEADERS {
            yaml.push_str(&format!("  - {}\n", header));
        }
        if entries.is_empty() {
            yaml.push_str("forbidden: []\n");
        } else {
            yaml.push_str("forbidden:\n");
            for (marker, dependency, header) in entries {
                yaml.push_str(&format!("  - marker: {}\n    dependency: {}\n", marker, dependency));
                if let Some(header) = header {
                    yaml.push_str(&format!("    header: {}\n", header));
                }
            }
        }
        let path = self.root().join("leakcheck.yaml");
        std::fs::write(&path, yaml).expect("write manifest");
        path
    }

    /// Manifest with the codec and logging markers, loaded.
    pub fn standard_config(&self) -> ProbeConfig {
        let path = self.write_manifest(&[
            (CODEC_MARKER, CODEC_DEPENDENCY, Some("thrift/Thrift.h")),
            (LOG_MARKER, LOG_DEPENDENCY, Some("parquet/util/logging.h")),
        ]);
        ProbeConfig::load(path).expect("load manifest")
    }
}

pub fn standard_registry() -> ForbiddenSymbolRegistry {
    ForbiddenSymbolRegistry::from_entries([
        ForbiddenSymbolEntry::new(CODEC_MARKER, CODEC_DEPENDENCY),
        ForbiddenSymbolEntry::new(LOG_MARKER, LOG_DEPENDENCY),
    ])
    .expect("valid registry")
}
