//! Content catalog: passages, question banks, vocabulary list
//!
//! The catalog is an external, read-only collaborator of the core. It is
//! loaded once at startup (from a TOML file, or the built-in sample content
//! for dev/test) and linted before the service accepts traffic.

pub mod catalog;
pub mod lint;
pub mod sample;

pub use catalog::*;
pub use lint::{lint_catalog, LintReport};
