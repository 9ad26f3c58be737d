//! Archive listing

use super::session::Session;
use anyhow::{Context, Result};

/// Handle `pakpatch archives`
pub fn handle(session: &Session) -> Result<()> {
    let paks_dir = session.layout.paks_dir();
    let archives = session
        .layout
        .archives()
        .with_context(|| format!("Failed to list {}", paks_dir.display()))?;

    if archives.is_empty() {
        println!("No archives found in {}", paks_dir.display());
        return Ok(());
    }

    for path in &archives {
        let Some(name) = path.file_name() else {
            continue;
        };
        let name = name.to_string_lossy();
        let dirs = session.layout.archive_dirs(&name);

        let mut status = Vec::new();
        if dirs.unpack.is_dir() {
            status.push("unpacked");
        }
        if dirs.repack.is_dir() {
            status.push("edited");
        }
        if dirs.result.join(&*name).is_file() {
            status.push("repacked");
        }

        if status.is_empty() {
            println!("{}", name);
        } else {
            println!("{}  [{}]", name, status.join(", "));
        }
    }

    Ok(())
}
