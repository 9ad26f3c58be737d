//! Resolved settings shared by the command handlers
//!
//! CLI flags take precedence over the config file.

use crate::config::{Config, RemoteConfig};
use anyhow::{bail, Context, Result};
use pakpatch::{Archiver, Layout, RepackOrchestrator};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub struct Session {
    pub config: Config,
    pub layout: Layout,
    archiver: Option<PathBuf>,
}

impl Session {
    pub fn new(root: Option<PathBuf>, archiver: Option<PathBuf>, config: Config) -> Result<Self> {
        let root = root.or_else(|| config.root.clone()).context(
            "No working directory configured. Use --root, PAKPATCH_ROOT, or: pakpatch configure --root <dir>",
        )?;

        if !root.is_dir() {
            bail!("Working directory not found: {}", root.display());
        }

        let archiver = archiver.or_else(|| config.archiver.clone());
        debug!("Working directory: {}", root.display());

        Ok(Self {
            config,
            layout: Layout::new(root),
            archiver,
        })
    }

    pub fn load(root: Option<PathBuf>, archiver: Option<PathBuf>) -> Result<Self> {
        Self::new(root, archiver, Config::load()?)
    }

    /// Resolve an archive file name under PAKS/, falling back to the
    /// configured default
    pub fn archive_name(&self, archive: Option<&str>) -> Result<String> {
        let name = archive
            .or(self.config.default_archive.as_deref())
            .context("No archive given. Use --archive or: pakpatch configure --default-archive <name>")?;

        let Some(path) = self.layout.archive(name) else {
            bail!(
                "Archive '{}' not found in {} (see: pakpatch archives)",
                name,
                self.layout.paks_dir().display()
            );
        };

        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Invalid archive path {}", path.display()))
    }

    pub fn archiver(&self) -> Result<Archiver> {
        let executable = self.archiver.as_deref().context(
            "No archiver configured. Use --archiver, PAKPATCH_ARCHIVER, or: pakpatch configure --archiver <path>",
        )?;

        let mut archiver = Archiver::new(executable).with_prefix_args(&self.config.archiver_args);
        if let Some(secs) = self.config.archiver_timeout_secs {
            archiver = archiver.with_timeout(Duration::from_secs(secs));
        }

        Ok(archiver)
    }

    pub fn orchestrator(&self) -> Result<RepackOrchestrator> {
        Ok(RepackOrchestrator::new(self.layout.clone(), self.archiver()?))
    }

    /// Index file from the flag or config
    pub fn index_file<'a>(&'a self, index: Option<&'a Path>) -> Result<&'a Path> {
        index
            .or(self.config.index_file.as_deref())
            .context("No index file given. Use --index or: pakpatch configure --index <file>")
    }

    pub fn remote(&self) -> Result<&RemoteConfig> {
        self.config
            .remote
            .as_ref()
            .context("No [remote] section in the config file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace() -> tempfile::TempDir {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("PAKS")).unwrap();
        fs::write(temp_dir.path().join("PAKS/game_patch_1.pak"), b"pak").unwrap();
        temp_dir
    }

    #[test]
    fn test_flag_root_overrides_config() {
        let temp_dir = workspace();
        let config = Config {
            root: Some(PathBuf::from("/nonexistent")),
            ..Default::default()
        };
        let session = Session::new(Some(temp_dir.path().to_path_buf()), None, config).unwrap();
        assert_eq!(session.layout.root, temp_dir.path());
    }

    #[test]
    fn test_missing_root() {
        assert!(Session::new(None, None, Config::default()).is_err());
    }

    #[test]
    fn test_archive_name_resolution() {
        let temp_dir = workspace();
        let config = Config {
            default_archive: Some("game_patch_1".to_string()),
            ..Default::default()
        };
        let session = Session::new(Some(temp_dir.path().to_path_buf()), None, config).unwrap();

        assert_eq!(session.archive_name(None).unwrap(), "game_patch_1.pak");
        assert_eq!(
            session.archive_name(Some("game_patch_1.pak")).unwrap(),
            "game_patch_1.pak"
        );
        assert!(session.archive_name(Some("other")).is_err());
    }

    #[test]
    fn test_archiver_from_config() {
        let temp_dir = workspace();
        let config = Config {
            archiver: Some(PathBuf::from("/opt/DARKSIDE")),
            archiver_args: vec!["--quiet".to_string()],
            archiver_timeout_secs: Some(5),
            ..Default::default()
        };
        let session = Session::new(Some(temp_dir.path().to_path_buf()), None, config).unwrap();
        let archiver = session.archiver().unwrap();

        assert_eq!(archiver.executable, PathBuf::from("/opt/DARKSIDE"));
        assert_eq!(archiver.timeout, Duration::from_secs(5));
        assert_eq!(archiver.prefix_args.len(), 1);
    }

    #[test]
    fn test_archiver_missing() {
        let temp_dir = workspace();
        let session =
            Session::new(Some(temp_dir.path().to_path_buf()), None, Config::default()).unwrap();
        assert!(session.archiver().is_err());
        assert!(session.remote().is_err());
    }
}
