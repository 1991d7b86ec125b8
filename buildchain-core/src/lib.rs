//! Buildchain Core
//!
//! Core types and abstractions for the buildchain job-chain runner.
//!
//! This crate contains:
//! - Domain types: jobs, builds, crumbs and terminal outcomes
//! - Configuration: JSON loading, validation and job-list normalization

pub mod config;
pub mod domain;
pub mod error;

pub use config::Configuration;
pub use error::ConfigError;
