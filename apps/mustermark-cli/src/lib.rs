//! Command-line front end for mustermark-core

pub mod config;
pub mod worker;

pub use config::{Config, Overrides};
