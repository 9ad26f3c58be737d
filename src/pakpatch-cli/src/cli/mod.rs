//! CLI argument definitions for pakpatch
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod core;
mod remote;

pub use core::{Cli, Commands};
pub use remote::{RemoteCommand, TableKind};
