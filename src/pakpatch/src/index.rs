//! Identifier lookup tables
//!
//! Two table shapes are supported:
//!
//! - [`LineTable`]: a local index file with `name | hexcode | index:value`
//!   lines. The hexcode column is the lookup key (case-insensitive) and the
//!   value after the colon is the pattern.
//! - [`RemoteTable`]: a `name: hexvalue` listing fetched once over HTTP.
//!
//! Both are immutable after construction and implement [`Resolve`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::pattern::{BytePattern, PatternError};

/// Field delimiter in index files
pub const LINE_DELIMITER: &str = " | ";

/// Default raw-paste endpoint for remote tables
pub const DEFAULT_REMOTE_URL: &str = "https://pastebin.com/api/api_raw.php";

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("failed to read index {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch remote table: {0}")]
    Fetch(#[source] Box<ureq::Error>),

    #[error("remote table request returned HTTP {0}")]
    Status(u16),

    #[error("failed to read remote table body: {0}")]
    Body(#[source] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("'{0}' was not found in the index")]
    NotFound(String),

    #[error("value for '{identifier}' is not valid hex: {source}")]
    Decode {
        identifier: String,
        #[source]
        source: PatternError,
    },
}

/// Identifier → raw pattern lookup
pub trait Resolve {
    /// Raw pattern string for an identifier, if present
    fn resolve(&self, identifier: &str) -> Option<&str>;

    /// Resolve and decode to a byte pattern
    fn resolve_pattern(&self, identifier: &str) -> Result<BytePattern, ResolveError> {
        let raw = self
            .resolve(identifier)
            .ok_or_else(|| ResolveError::NotFound(identifier.to_string()))?;

        BytePattern::from_hex(raw).map_err(|source| ResolveError::Decode {
            identifier: identifier.to_string(),
            source,
        })
    }
}

/// Index loaded from `name | hexcode | index:value` lines
#[derive(Debug, Default, Clone)]
pub struct LineTable {
    entries: HashMap<String, String>,
}

impl LineTable {
    /// Parse index text; the first line for a given key wins
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();

        for line in text.lines() {
            let Some((key, value)) = parse_index_line(line) else {
                continue;
            };
            entries.entry(key).or_insert(value);
        }

        debug!("Parsed {} index entries", entries.len());
        Self { entries }
    }

    /// Load an index file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let table = Self::parse(&text);
        info!("Loaded {} index entries from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Resolve for LineTable {
    fn resolve(&self, identifier: &str) -> Option<&str> {
        self.entries
            .get(&identifier.to_lowercase())
            .map(String::as_str)
    }
}

/// Split one index line into (lowercased key, value)
fn parse_index_line(line: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = line.split(LINE_DELIMITER).collect();
    if parts.len() < 3 {
        return None;
    }

    let key = parts[1].trim().to_lowercase();
    let value = parts[2].split(':').nth(1)?.trim();
    Some((key, value.to_string()))
}

fn default_remote_url() -> String {
    DEFAULT_REMOTE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Where and how to fetch remote tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSource {
    #[serde(default = "default_remote_url")]
    pub url: String,

    pub dev_key: String,

    pub user_key: String,

    /// Suffixes removed from every name, e.g. `" (4-Star)"`
    #[serde(default)]
    pub strip_suffixes: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteSource {
    pub fn new(dev_key: impl Into<String>, user_key: impl Into<String>) -> Self {
        Self {
            url: default_remote_url(),
            dev_key: dev_key.into(),
            user_key: user_key.into(),
            strip_suffixes: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Name → hex listing fetched from a remote paste
#[derive(Debug, Default, Clone)]
pub struct RemoteTable {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl RemoteTable {
    /// Parse `name: hexvalue` lines
    ///
    /// Lines without a colon are ignored. A repeated name overwrites the
    /// earlier value but keeps the earlier listing position.
    pub fn parse(text: &str, strip_suffixes: &[String]) -> Self {
        let mut table = Self::default();

        for line in text.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };

            let mut name = name.trim().to_string();
            for suffix in strip_suffixes {
                if let Some(stripped) = name.strip_suffix(suffix.as_str()) {
                    name = stripped.trim_end().to_string();
                }
            }

            table.insert(name, value.trim().to_string());
        }

        table
    }

    fn insert(&mut self, name: String, value: String) {
        match self.positions.get(&name) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.positions.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    /// Fetch a paste and parse it
    ///
    /// Any transport failure or non-200 response fails the whole fetch.
    pub fn fetch(source: &RemoteSource, paste_key: &str) -> Result<Self, IndexError> {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(source.timeout_secs))
            .build();

        let response = agent
            .post(&source.url)
            .send_form(&[
                ("api_dev_key", source.dev_key.as_str()),
                ("api_user_key", source.user_key.as_str()),
                ("api_option", "show_paste"),
                ("api_paste_key", paste_key),
            ])
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => IndexError::Status(code),
                other => IndexError::Fetch(Box::new(other)),
            })?;

        if response.status() != 200 {
            return Err(IndexError::Status(response.status()));
        }

        let body = response.into_string().map_err(IndexError::Body)?;
        let table = Self::parse(&body, &source.strip_suffixes);
        info!("Fetched {} entries from remote table {}", table.len(), paste_key);
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in listing order
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Entry at a 1-based listing position
    pub fn get_by_position(&self, position: usize) -> Option<(&str, &str)> {
        let (name, value) = self.entries.get(position.checked_sub(1)?)?;
        Some((name.as_str(), value.as_str()))
    }

    /// Entries whose name contains `term`, ignoring case, with their
    /// 1-based listing positions
    ///
    /// An empty term matches everything.
    pub fn search(&self, term: &str) -> Vec<(usize, &str, &str)> {
        let term = term.trim().to_lowercase();
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, (name, _))| term.is_empty() || name.to_lowercase().contains(&term))
            .map(|(i, (name, value))| (i + 1, name.as_str(), value.as_str()))
            .collect()
    }
}

impl Resolve for RemoteTable {
    fn resolve(&self, identifier: &str) -> Option<&str> {
        let pos = *self.positions.get(identifier.trim())?;
        Some(self.entries[pos].1.as_str())
    }
}
