//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up pakpatch defaults.

use crate::config::Config;
use anyhow::Result;
use std::path::PathBuf;

/// Settings passed to `pakpatch configure`
#[derive(Debug, Default)]
pub struct ConfigureArgs {
    pub root: Option<PathBuf>,
    pub archiver: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub default_archive: Option<String>,
    pub index: Option<PathBuf>,
    pub show: bool,
}

impl ConfigureArgs {
    fn is_empty(&self) -> bool {
        self.root.is_none()
            && self.archiver.is_none()
            && self.timeout.is_none()
            && self.default_archive.is_none()
            && self.index.is_none()
    }
}

/// Handle the configure command
pub fn handle(args: ConfigureArgs) -> Result<()> {
    let mut config = Config::load()?;

    if args.show {
        show_config(&config);
        return Ok(());
    }

    if args.is_empty() {
        show_usage();
        return Ok(());
    }

    update(&mut config, args);
    config.save()?;

    println!("Configuration updated");
    if let Ok(path) = Config::config_path() {
        println!("Config saved to: {}", path.display());
    }

    Ok(())
}

fn update(config: &mut Config, args: ConfigureArgs) {
    if let Some(root) = args.root {
        config.root = Some(root);
    }
    if let Some(archiver) = args.archiver {
        config.archiver = Some(archiver);
    }
    if let Some(timeout) = args.timeout {
        config.archiver_timeout_secs = Some(timeout);
    }
    if let Some(name) = args.default_archive {
        config.default_archive = Some(name);
    }
    if let Some(index) = args.index {
        config.index_file = Some(index);
    }
}

/// Display current configuration
fn show_config(config: &Config) {
    fn show(label: &str, value: Option<String>) {
        match value {
            Some(v) => println!("{}: {}", label, v),
            None => println!("{}: (not set)", label),
        }
    }

    show("Root", config.root.as_ref().map(|p| p.display().to_string()));
    show("Archiver", config.archiver.as_ref().map(|p| p.display().to_string()));
    show("Archiver timeout (s)", config.archiver_timeout_secs.map(|s| s.to_string()));
    show("Default archive", config.default_archive.clone());
    show("Index file", config.index_file.as_ref().map(|p| p.display().to_string()));
    show(
        "Remote",
        config
            .remote
            .as_ref()
            .map(|r| format!("{} (source {}, replacement {})", r.source.url, r.source_paste, r.replacement_paste)),
    );

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: pakpatch configure --root DIR --archiver PATH");
    println!("   or: pakpatch configure --default-archive NAME --index FILE --timeout SECS");
    println!("   or: pakpatch configure --show");
    println!();
    println!("Remote tables are configured in the [remote] section of the config file.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_only_given_fields() {
        let mut config = Config {
            root: Some(PathBuf::from("/old")),
            default_archive: Some("a.pak".to_string()),
            ..Default::default()
        };

        update(
            &mut config,
            ConfigureArgs {
                archiver: Some(PathBuf::from("/opt/DARKSIDE")),
                timeout: Some(60),
                ..Default::default()
            },
        );

        assert_eq!(config.root, Some(PathBuf::from("/old")));
        assert_eq!(config.default_archive.as_deref(), Some("a.pak"));
        assert_eq!(config.archiver, Some(PathBuf::from("/opt/DARKSIDE")));
        assert_eq!(config.archiver_timeout_secs, Some(60));
    }

    #[test]
    fn test_empty_args() {
        assert!(ConfigureArgs::default().is_empty());
        assert!(!ConfigureArgs {
            show: true,
            index: Some(PathBuf::from("index.txt")),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_show_usage_does_not_panic() {
        show_usage();
    }
}
