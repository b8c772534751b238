//! Core module - shared infrastructure for Troupe
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the crate.

pub mod config;
pub mod error;
pub mod runtime;
pub mod text;
pub mod types;

pub use config::{Config, ProviderKind};
pub use error::{Result, TroupeError};
pub use types::*;
