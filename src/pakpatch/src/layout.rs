//! Working directory layout
//!
//! ```text
//! root/
//!   PAKS/<archive>.pak                 original archives (never written)
//!   UNPACK/<archive-stem>/unpack/      extracted source tree
//!   UNPACK/<archive-stem>/repack/      edited tree and staging area
//!   UNPACK/<archive-stem>/result/      rebuilt archives
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Directory convention rooted at a working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub paks: String,
    pub unpack_root: String,
    pub unpack: String,
    pub repack: String,
    pub result: String,
}

/// Per-archive directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDirs {
    pub base: PathBuf,
    pub unpack: PathBuf,
    pub repack: PathBuf,
    pub result: PathBuf,
}

impl Layout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            paks: "PAKS".to_string(),
            unpack_root: "UNPACK".to_string(),
            unpack: "unpack".to_string(),
            repack: "repack".to_string(),
            result: "result".to_string(),
        }
    }

    /// Folder holding the original archives
    pub fn paks_dir(&self) -> PathBuf {
        self.root.join(&self.paks)
    }

    /// Path of an original archive by file name
    pub fn original_path(&self, archive_name: &str) -> PathBuf {
        self.paks_dir().join(archive_name)
    }

    pub fn archive_dirs(&self, archive_name: &str) -> ArchiveDirs {
        let base = self.root.join(&self.unpack_root).join(archive_stem(archive_name));
        ArchiveDirs {
            unpack: base.join(&self.unpack),
            repack: base.join(&self.repack),
            result: base.join(&self.result),
            base,
        }
    }

    /// List `.pak` files directly under the PAKS folder, sorted
    pub fn archives(&self) -> io::Result<Vec<PathBuf>> {
        let dir = self.paks_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut paks = Vec::new();
        for entry in walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext.eq_ignore_ascii_case("pak") {
                        paks.push(path.to_path_buf());
                    }
                }
            }
        }

        paks.sort();
        Ok(paks)
    }

    /// Find an archive by file name, accepting the name with or without `.pak`
    pub fn archive(&self, name: &str) -> Option<PathBuf> {
        let direct = self.original_path(name);
        if direct.is_file() {
            return Some(direct);
        }

        let with_ext = self.original_path(&format!("{}.pak", name));
        with_ext.is_file().then_some(with_ext)
    }
}

/// Archive file name without its final extension
pub fn archive_stem(archive_name: &str) -> String {
    Path::new(archive_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive_name.to_string())
}
