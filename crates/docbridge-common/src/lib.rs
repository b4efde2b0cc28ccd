//! docbridge Common - Shared utilities and types
//!
//! This crate provides common functionality used across all docbridge components:
//! - Error types and their HTTP mapping
//! - Configuration management
//! - Metrics and observability

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod metrics;

pub use config::Config;
pub use error::{Error, Result};
