//! Edit command handlers
//!
//! `edit` resolves names through an index file and patches the whole unpack
//! tree; `hex` takes literal hex and can target a single file.

use super::session::Session;
use crate::input::read_pairs;
use anyhow::{bail, Context, Result};
use pakpatch::{LineTable, PatternSet, SkippedPair, TreeRewriter};
use std::path::{Path, PathBuf};

/// Options shared by every patching command
pub struct PatchOptions<'a> {
    pub archive: Option<&'a str>,
    pub target: Option<&'a str>,
    pub pairs: Option<&'a Path>,
    pub repack: bool,
    pub sequential: bool,
}

/// Handle `pakpatch edit`
pub fn handle(session: &Session, index: Option<&Path>, opts: PatchOptions<'_>) -> Result<()> {
    let index_path = session.index_file(index)?;
    let table = LineTable::load(index_path)?;
    if table.is_empty() {
        bail!("Index file {} has no usable entries", index_path.display());
    }

    let input = read_pairs(opts.pairs)?;
    report_skipped(&input.skipped);

    let (patterns, skipped) = PatternSet::from_resolved(&input.pairs, &table);
    report_skipped(&skipped);

    apply(session, &patterns, &opts)
}

/// Handle `pakpatch hex`
pub fn hex(session: &Session, opts: PatchOptions<'_>) -> Result<()> {
    let input = read_pairs(opts.pairs)?;
    report_skipped(&input.skipped);

    let (patterns, skipped) = PatternSet::from_literal_hex(&input.pairs);
    report_skipped(&skipped);

    apply(session, &patterns, &opts)
}

/// Rewrite the archive's unpack tree (or one file in it) into the repack
/// tree, then optionally repack
pub fn apply(session: &Session, patterns: &PatternSet, opts: &PatchOptions<'_>) -> Result<()> {
    if patterns.is_empty() {
        bail!("No valid pairs to apply");
    }

    let name = session.archive_name(opts.archive)?;
    let dirs = session.layout.archive_dirs(&name);
    let (source, output) = targets(&dirs.unpack, &dirs.repack, opts.target)?;

    let report = TreeRewriter::new(patterns)
        .sequential(opts.sequential)
        .rewrite(&source, &output)
        .with_context(|| format!("Failed to patch {}", name))?;

    println!(
        "Scanned {} files, {} replacements, {} files written",
        report.files_scanned,
        report.replacements,
        report.written.len()
    );
    for path in &report.written {
        println!("  {}", path.display());
    }
    for failure in &report.failures {
        eprintln!("Warning: {}", failure);
    }

    if opts.repack {
        super::repack::run(session, &name)?;
    }

    Ok(())
}

/// Source path and output directory for an optional target inside the tree
///
/// A target file lands at the same relative location in the repack tree.
fn targets(unpack: &Path, repack: &Path, target: Option<&str>) -> Result<(PathBuf, PathBuf)> {
    let Some(target) = target else {
        return Ok((unpack.to_path_buf(), repack.to_path_buf()));
    };

    let relative = Path::new(target.trim_start_matches(['/', '\\']));
    if relative
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        bail!("Target must stay inside the unpack tree: {}", target);
    }

    let source = unpack.join(relative);
    let output = match relative.parent() {
        Some(parent) => repack.join(parent),
        None => repack.to_path_buf(),
    };

    Ok((source, output))
}

fn report_skipped(skipped: &[SkippedPair]) {
    for pair in skipped {
        eprintln!("Skipped {}", pair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;

    #[test]
    fn test_targets_whole_tree() {
        let (src, out) = targets(Path::new("/u"), Path::new("/r"), None).unwrap();
        assert_eq!(src, PathBuf::from("/u"));
        assert_eq!(out, PathBuf::from("/r"));
    }

    #[test]
    fn test_targets_nested_file() {
        let (src, out) =
            targets(Path::new("/u"), Path::new("/r"), Some("Content/Char/0026c7f9.uasset")).unwrap();
        assert_eq!(src, PathBuf::from("/u/Content/Char/0026c7f9.uasset"));
        assert_eq!(out, PathBuf::from("/r/Content/Char"));
    }

    #[test]
    fn test_targets_rejects_escape() {
        assert!(targets(Path::new("/u"), Path::new("/r"), Some("../PAKS/x.pak")).is_err());
    }

    #[test]
    fn test_apply_single_target() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("PAKS")).unwrap();
        fs::write(root.join("PAKS/game.pak"), b"pak").unwrap();
        let unpack = root.join("UNPACK/game/unpack/Content");
        fs::create_dir_all(&unpack).unwrap();
        fs::write(unpack.join("a.uasset"), [0xdeu8, 0xad, 0xbe, 0xef]).unwrap();
        fs::write(unpack.join("b.uasset"), [0xdeu8, 0xad]).unwrap();

        let session = Session::new(Some(root.to_path_buf()), None, Config::default()).unwrap();
        let (patterns, skipped) =
            PatternSet::from_literal_hex(&[pakpatch::IdentifierPair::new("DEADBEEF", "CAADBEEF")]);
        assert!(skipped.is_empty());

        let opts = PatchOptions {
            archive: Some("game"),
            target: Some("Content/a.uasset"),
            pairs: None,
            repack: false,
            sequential: true,
        };
        apply(&session, &patterns, &opts).unwrap();

        let repack = root.join("UNPACK/game/repack/Content");
        assert_eq!(fs::read(repack.join("a.uasset")).unwrap(), vec![0xca, 0xad, 0xbe, 0xef]);
        assert!(!repack.join("b.uasset").exists());
    }

    #[test]
    fn test_apply_empty_set_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let session =
            Session::new(Some(temp_dir.path().to_path_buf()), None, Config::default()).unwrap();
        let opts = PatchOptions {
            archive: None,
            target: None,
            pairs: None,
            repack: false,
            sequential: false,
        };
        assert!(apply(&session, &PatternSet::new(), &opts).is_err());
    }
}
