//! Remote lookup table CLI commands

use clap::{Subcommand, ValueEnum};
use std::fmt;

/// Which of the two configured pastes to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableKind {
    /// Items to be replaced
    Source,
    /// Items to replace them with
    Replacement,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Source => f.write_str("source"),
            TableKind::Replacement => f.write_str("replacement"),
        }
    }
}

#[derive(Subcommand)]
pub enum RemoteCommand {
    /// List entries of a remote table
    #[command(visible_alias = "ls")]
    List {
        /// Table to list
        #[arg(value_enum)]
        table: TableKind,

        /// Only show names containing this term (case-insensitive)
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Swap items in one file using names from the remote tables
    Apply {
        /// Archive name under PAKS/ (uses configured default if not provided)
        #[arg(short, long)]
        archive: Option<String>,

        /// File to patch, relative to the archive's unpack tree
        #[arg(short, long)]
        target: String,

        /// Swap as SOURCE=REPLACEMENT; either side may be `#N` for the
        /// N-th entry of its table (repeatable)
        #[arg(short, long = "pair", required = true)]
        pairs: Vec<String>,

        /// Repack the archive afterwards
        #[arg(short, long)]
        repack: bool,
    },
}
