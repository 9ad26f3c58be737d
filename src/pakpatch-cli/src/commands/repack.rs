//! Repack command handler

use super::session::Session;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use pakpatch::RepackError;
use std::time::Duration;

/// Handle `pakpatch repack`
pub fn handle(session: &Session, archive: Option<&str>) -> Result<()> {
    let name = session.archive_name(archive)?;
    run(session, &name)
}

/// Repack `name`, reporting progress on stderr
///
/// A missing edit tree is not an error: there is simply nothing to repack.
pub fn run(session: &Session, name: &str) -> Result<()> {
    let orchestrator = session.orchestrator()?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Repacking {}", name));
    pb.enable_steady_tick(Duration::from_millis(120));

    let result = orchestrator.repack(name);
    pb.finish_and_clear();

    match result {
        Ok(outcome) => {
            println!("Repacking completed!");
            println!("  Output: {}", outcome.result_path.display());
            println!("  Original SHA-256: {}", outcome.original_sha256);
            Ok(())
        }
        Err(RepackError::StagingMissing { dir, .. }) => {
            println!("Nothing to repack for {}: {} does not exist", name, dir.display());
            println!("Run `pakpatch edit` or `pakpatch hex` first.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
