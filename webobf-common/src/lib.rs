//! # webobf Common Library
//!
//! Shared code for the webobf services:
//! - Error types
//! - Bootstrap configuration (TOML file + environment resolution)
//! - Real-time channel event types (inbound `start`, outbound `progress`/`done`/`error`)

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
