//! Configuration utilities.

/// TOML configuration (`foodie.toml`) with hot reload.
pub mod toml_config;
