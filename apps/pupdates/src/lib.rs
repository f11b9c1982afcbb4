//! # Pupdates Application Library
//!
//! The batch side of Pupdates: configuration, snapshot sources, the
//! concurrent runner, report output and the CLI. All classification
//! lives in `pupdates-core`.

pub mod cli;
pub mod config;
pub mod output;
pub mod runner;
pub mod source;
