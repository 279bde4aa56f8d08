//! emsight daemon library.
//!
//! Exposes the daemon modules for integration testing. In production
//! `emsight-daemon` runs as a binary (main.rs).

pub mod cli;
pub mod logging;
pub mod orchestrator;
