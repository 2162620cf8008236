//! BESST Common - Shared configuration, errors and logging for the BESST screener.
//!
//! This crate provides:
//! - Configuration types and modular loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup
//! - Utility functions used across BESST services

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{Config, ExternalSecretsConfig, ObservabilityConfig, SecretsConfig, StorageConfig};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
