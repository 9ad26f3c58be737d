//! # pakpatch
//!
//! Binary pattern substitution over unpacked game archives.
//!
//! This library provides functionality to:
//! - Resolve item identifiers to byte patterns through an index table
//!   (a local `name | hexcode | index:value` file or a remote `name: hex` paste)
//! - Build ordered replacement sets from operator input
//! - Rewrite an unpacked archive tree into a mirrored edit tree, accumulating
//!   changes over earlier edits
//! - Drive an external archiver to rebuild the archive without ever touching
//!   the original `.pak`
//!
//! ## Example
//!
//! ```no_run
//! use pakpatch::{Archiver, Layout, LineTable, PatternSet, RepackOrchestrator, TreeRewriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = Layout::new("/storage/DARK_PAK/UNPACK_REPACK");
//! let index = LineTable::load("/storage/DARK_PAK/Index.txt")?;
//!
//! let input = pakpatch::parse_pair_lines(["1A2B3C,4D5E6F", "q"]);
//! let (patterns, skipped) = PatternSet::from_resolved(&input.pairs, &index);
//! println!("{} pairs ready, {} skipped", patterns.len(), skipped.len());
//!
//! let dirs = layout.archive_dirs("game_patch_3.7.0.19766.pak");
//! let report = TreeRewriter::new(&patterns).rewrite(&dirs.unpack, &dirs.repack)?;
//! println!("{} files written", report.written.len());
//!
//! let archiver = Archiver::new("/opt/DARK_PAK/DARKSIDE");
//! let outcome = RepackOrchestrator::new(layout, archiver).repack("game_patch_3.7.0.19766.pak")?;
//! println!("Rebuilt archive at {}", outcome.result_path.display());
//! # Ok(())
//! # }
//! ```

pub mod index;
pub mod layout;
pub mod pattern;
pub mod repack;
pub mod rewrite;

#[doc(inline)]
pub use index::{IndexError, LineTable, RemoteSource, RemoteTable, Resolve, ResolveError};
#[doc(inline)]
pub use layout::{ArchiveDirs, Layout};
#[doc(inline)]
pub use pattern::{
    parse_pair_line, parse_pair_lines, replace_all, ApplyStats, BytePattern, IdentifierPair,
    PairInput, PatternError, PatternSet, ReplacementPair, SkipReason, SkippedPair,
};
#[doc(inline)]
pub use repack::{Archiver, RepackError, RepackOrchestrator, RepackOutcome, RepackStage};
#[doc(inline)]
pub use rewrite::{FileFailure, FileStage, RewriteError, RewriteReport, TreeRewriter};
