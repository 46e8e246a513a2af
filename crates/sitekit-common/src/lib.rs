//! # SiteKit Common
//!
//! Shared utilities for the SiteKit offline caching worker.
//!
//! Currently this is logging configuration and setup; every other concern
//! lives with the crate that owns it.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};
