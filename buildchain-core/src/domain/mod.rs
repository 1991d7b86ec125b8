//! Core domain types
//!
//! This module contains the domain structures shared between the CI client
//! (which produces them from server responses) and the runner (which drives
//! jobs through their lifecycle and records outcomes).

pub mod build;
pub mod job;
