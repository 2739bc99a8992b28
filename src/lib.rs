//! header-leak-guard: keep internal dependencies out of a library's public headers
//!
//! A consumer that compiles only against the published headers must never see
//! macros belonging to internal-only dependencies (generated protocol stubs,
//! internal logging...). This crate checks that, at preprocessing time:
//!
//! - [`ForbiddenSymbolRegistry`] - sentinel markers, one per internal dependency
//! - [`PublicHeaderAggregate`] - the headers that form the public contract
//! - [`LeakageProbe`] - preprocesses the aggregate and checks each marker
//! - [`run_all`] / [`HarnessReport`] - every entry checked, every violation reported
//! - [`verify_detection`] - self-test proving each entry can detect its dependency
//!
//! # Example
//!
//! ```no_run
//! use header_leak_guard::{verify, FsSource, ProbeConfig};
//!
//! let config = ProbeConfig::load("leakcheck.yaml")?;
//! let report = verify(&config.aggregate, &FsSource, &config.registry, &config.options)?;
//! report.assert_clean();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aggregate;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod harness;
pub mod mutation;
pub mod preprocess;
pub mod probe;
pub mod registry;

pub use aggregate::PublicHeaderAggregate;
pub use config::{Manifest, ProbeConfig, CONFIG_ENV, DEFAULT_MANIFEST};
pub use diagnostic::{Diagnostic, Severity};
pub use error::{ConfigError, ProbeError};
pub use harness::{run_all, verify, HarnessReport, EXIT_CLEAN, EXIT_VIOLATION};
pub use mutation::{verify_detection, MutationOutcome, MutationStatus, SelfTestReport};
pub use preprocess::{
    preprocess, Define, FsSource, HeaderSource, InjectedSource, MacroDef, MemorySource,
    PreprocessOptions, SourceLocation, TranslationUnit,
};
pub use probe::{LeakageProbe, MarkerOrigin, ProbeResult};
pub use registry::{ForbiddenSymbolEntry, ForbiddenSymbolRegistry};
