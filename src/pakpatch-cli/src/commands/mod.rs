//! Command handlers for pakpatch CLI
//!
//! Each subcommand has its own module with handler functions.

pub mod archives;
pub mod configure;
pub mod edit;
pub mod remote;
pub mod repack;
pub mod session;
