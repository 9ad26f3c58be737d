//! Core CLI definitions

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use super::remote::RemoteCommand;

#[derive(Parser)]
#[command(name = "pakpatch")]
#[command(about = "Byte-pattern patching and repacking for unpacked game archives", long_about = None)]
pub struct Cli {
    /// Working directory containing PAKS/ and UNPACK/
    #[arg(long, global = true, env = "PAKPATCH_ROOT")]
    pub root: Option<PathBuf>,

    /// Path to the external archiver executable
    #[arg(long, global = true, env = "PAKPATCH_ARCHIVER")]
    pub archiver: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure default settings (--root and --archiver are saved too)
    #[command(visible_alias = "c")]
    Configure {
        /// Seconds to wait for the archiver before giving up
        #[arg(long)]
        timeout: Option<u64>,

        /// Archive used when --archive is omitted
        #[arg(long)]
        default_archive: Option<String>,

        /// Index file mapping names to hex codes
        #[arg(long)]
        index: Option<PathBuf>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },

    /// List archives available under PAKS/
    #[command(visible_alias = "ls")]
    Archives,

    /// Swap items by name across an archive's whole unpack tree
    #[command(visible_alias = "e")]
    Edit {
        /// Archive name under PAKS/ (uses configured default if not provided)
        #[arg(short, long)]
        archive: Option<String>,

        /// Index file (uses configured index if not provided)
        #[arg(short, long)]
        index: Option<PathBuf>,

        /// Read `left,right` pairs from a file instead of stdin
        #[arg(short, long)]
        pairs: Option<PathBuf>,

        /// Repack the archive afterwards
        #[arg(short, long)]
        repack: bool,

        /// Process files one at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Replace literal hex patterns
    #[command(visible_alias = "x")]
    Hex {
        /// Archive name under PAKS/ (uses configured default if not provided)
        #[arg(short, long)]
        archive: Option<String>,

        /// Single file to patch, relative to the unpack tree
        #[arg(short, long)]
        target: Option<String>,

        /// Read `search,replace` pairs from a file instead of stdin
        #[arg(short, long)]
        pairs: Option<PathBuf>,

        /// Repack the archive afterwards
        #[arg(short, long)]
        repack: bool,

        /// Process files one at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Look up and apply names from remote tables
    #[command(visible_alias = "r")]
    Remote {
        #[command(subcommand)]
        command: RemoteCommand,
    },

    /// Repack an archive from its edited files
    #[command(visible_alias = "p")]
    Repack {
        /// Archive name under PAKS/ (uses configured default if not provided)
        #[arg(short, long)]
        archive: Option<String>,
    },
}
