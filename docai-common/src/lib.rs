//! # DocAI Common Library
//!
//! Shared code for the DocAI invoice extraction tools:
//! - Error type shared by all crates
//! - Bootstrap configuration loading (TOML) with layered file resolution
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
