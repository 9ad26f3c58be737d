//! Remote lookup table command handlers

use super::edit::{self, PatchOptions};
use super::session::Session;
use crate::cli::TableKind;
use crate::config::RemoteConfig;
use anyhow::{bail, Context, Result};
use pakpatch::{IdentifierPair, PatternSet, RemoteTable};
use tracing::debug;

fn fetch(remote: &RemoteConfig, kind: TableKind) -> Result<RemoteTable> {
    let paste = match kind {
        TableKind::Source => &remote.source_paste,
        TableKind::Replacement => &remote.replacement_paste,
    };

    debug!("Fetching {} table from paste {}", kind, paste);
    RemoteTable::fetch(&remote.source, paste)
        .with_context(|| format!("Failed to fetch {} table", kind))
}

/// Handle `pakpatch remote list`
pub fn list(session: &Session, kind: TableKind, search: Option<&str>) -> Result<()> {
    let table = fetch(session.remote()?, kind)?;
    let matches = table.search(search.unwrap_or_default());

    if matches.is_empty() {
        println!("No entries found");
        return Ok(());
    }

    let width = table.len().to_string().len();
    for (position, name, value) in &matches {
        println!("#{:<width$}  {}  {}", position, name, value, width = width);
    }
    println!();
    println!("{} of {} entries", matches.len(), table.len());

    Ok(())
}

/// Handle `pakpatch remote apply`
pub fn apply(
    session: &Session,
    archive: Option<&str>,
    target: &str,
    pairs: &[String],
    repack: bool,
) -> Result<()> {
    let remote = session.remote()?;
    let source = fetch(remote, TableKind::Source)?;
    let replacement = fetch(remote, TableKind::Replacement)?;

    let pairs = pairs
        .iter()
        .map(|arg| select_pair(arg, &source, &replacement))
        .collect::<Result<Vec<_>>>()?;

    for pair in &pairs {
        println!("{} ►► {}", pair.left, pair.right);
    }

    let (patterns, skipped) = PatternSet::from_remote(&pairs, &source, &replacement);
    for pair in &skipped {
        eprintln!("Skipped {}", pair);
    }

    let opts = PatchOptions {
        archive,
        target: Some(target),
        pairs: None,
        repack,
        sequential: false,
    };
    edit::apply(session, &patterns, &opts)
}

/// Parse `SOURCE=REPLACEMENT`, turning `#N` into the N-th entry's name
fn select_pair(arg: &str, source: &RemoteTable, replacement: &RemoteTable) -> Result<IdentifierPair> {
    let Some((left, right)) = arg.split_once('=') else {
        bail!("Expected SOURCE=REPLACEMENT, got '{}'", arg);
    };

    Ok(IdentifierPair::new(
        select(left, source, TableKind::Source)?,
        select(right, replacement, TableKind::Replacement)?,
    ))
}

fn select(selector: &str, table: &RemoteTable, kind: TableKind) -> Result<String> {
    let selector = selector.trim();
    if selector.is_empty() {
        bail!("Empty {} selection", kind);
    }

    let Some(position) = selector.strip_prefix('#') else {
        return Ok(selector.to_string());
    };

    let position: usize = position
        .parse()
        .with_context(|| format!("Invalid {} position '{}'", kind, selector))?;

    match table.get_by_position(position) {
        Some((name, _)) => Ok(name.to_string()),
        None => bail!(
            "{} position {} is out of range (1-{})",
            kind,
            position,
            table.len()
        ),
    }
}
