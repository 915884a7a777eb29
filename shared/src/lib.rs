//! Types shared between the WorldSync auth server and its test suites.
//!
//! `config` owns loading and validating the TOML configuration file;
//! `types` holds the JSON wire formats and the JWT claim set.

pub mod config;
pub mod types;
