//! Public header aggregate
//!
//! The headers a consumer includes to use the library, in the order they are
//! included, plus the include path used to find them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicHeaderAggregate {
    include_dirs: Vec<PathBuf>,
    headers: Vec<String>,
}

impl PublicHeaderAggregate {
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        Self {
            include_dirs,
            headers: Vec::new(),
        }
    }

    pub fn from_parts(
        include_dirs: Vec<PathBuf>,
        headers: impl IntoIterator<Item = String>,
    ) -> Result<Self, ConfigError> {
        let mut aggregate = Self::new(include_dirs);
        for header in headers {
            aggregate.push_header(header)?;
        }
        Ok(aggregate)
    }

    /// Append a header identifier such as `parquet/api/reader.h`.
    pub fn push_header(&mut self, header: impl Into<String>) -> Result<(), ConfigError> {
        let header = header.into();
        let header = header.trim();
        if header.is_empty() {
            return Err(ConfigError::EmptyHeader);
        }
        self.headers.push(header.to_string());
        Ok(())
    }

    pub fn add_include_dir(&mut self, dir: impl Into<PathBuf>) {
        self.include_dirs.push(dir.into());
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_keep_declaration_order() {
        let aggregate = PublicHeaderAggregate::from_parts(
            vec![PathBuf::from("include")],
            [
                "parquet/api/io.h",
                "parquet/api/reader.h",
                "parquet/api/schema.h",
                "parquet/api/writer.h",
            ]
            .into_iter()
            .map(String::from),
        )
        .unwrap();

        assert_eq!(aggregate.len(), 4);
        assert_eq!(aggregate.headers()[0], "parquet/api/io.h");
        assert_eq!(aggregate.headers()[3], "parquet/api/writer.h");
    }

    #[test]
    fn test_empty_header_rejected() {
        let mut aggregate = PublicHeaderAggregate::new(vec![]);
        assert!(matches!(
            aggregate.push_header("  "),
            Err(ConfigError::EmptyHeader)
        ));
        assert!(aggregate.is_empty());
    }
}
