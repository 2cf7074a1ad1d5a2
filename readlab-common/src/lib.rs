//! # READLAB Common Library
//!
//! Shared code for the reading-comprehension study backend including:
//! - Content catalog types, loading, and linting
//! - Deterministic per-session randomization (passage pick + source split)
//! - MCQ grading
//! - Demographics normalization
//! - Attention-time bucket rules
//! - Reading-event reconciliation
//! - Session storage abstraction (in-memory and SQLite backends)

pub mod attention;
pub mod config;
pub mod content;
pub mod demographics;
pub mod error;
pub mod grading;
pub mod randomize;
pub mod reading;
pub mod store;
pub mod time;

pub use content::{Catalog, Variant};
pub use error::{Error, Result};
