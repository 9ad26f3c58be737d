//! Tree-wide pattern substitution into a mirrored output tree.
//!
//! Edits are cumulative: when `output/R` already exists from an earlier
//! session it is used as the base content for `R` instead of the pristine
//! source file, so repeated sessions stack their changes. The source tree is
//! only ever read.

use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pattern::PatternSet;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("source path does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("failed to create output directory {}: {source}", .path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Step at which a single file failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStage {
    Walk,
    Read,
    Write,
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStage::Walk => f.write_str("walk"),
            FileStage::Read => f.write_str("read"),
            FileStage::Write => f.write_str("write"),
        }
    }
}

/// A file that could not be processed; the rest of the tree continues
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub stage: FileStage,
    pub error: io::Error,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed for {}: {}", self.stage, self.path.display(), self.error)
    }
}

/// Summary of one rewrite pass
#[derive(Debug, Default)]
pub struct RewriteReport {
    /// Output files written by this pass
    pub written: BTreeSet<PathBuf>,
    pub failures: Vec<FileFailure>,
    pub files_scanned: usize,
    pub replacements: usize,
}

struct FileJob {
    source: PathBuf,
    output: PathBuf,
}

struct FileResult {
    output: PathBuf,
    written: bool,
    replacements: usize,
}

/// Applies a [`PatternSet`] to every file under a source path
pub struct TreeRewriter<'a> {
    patterns: &'a PatternSet,
    sequential: bool,
}

impl<'a> TreeRewriter<'a> {
    pub fn new(patterns: &'a PatternSet) -> Self {
        Self {
            patterns,
            sequential: false,
        }
    }

    /// Process files one at a time instead of across the rayon pool
    pub fn sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    /// Rewrite `source` (a file or a directory) into `output`
    ///
    /// A single file lands at `output/<file name>`; a directory is mirrored
    /// by relative path.
    pub fn rewrite(&self, source: &Path, output: &Path) -> Result<RewriteReport, RewriteError> {
        if !source.exists() {
            return Err(RewriteError::SourceMissing(source.to_path_buf()));
        }

        fs::create_dir_all(output).map_err(|e| RewriteError::CreateOutput {
            path: output.to_path_buf(),
            source: e,
        })?;

        let mut report = RewriteReport::default();
        let jobs = collect_jobs(source, output, &mut report.failures);
        report.files_scanned = jobs.len();

        info!(
            "Applying {} pairs to {} files from {}",
            self.patterns.len(),
            jobs.len(),
            source.display()
        );

        let results: Vec<Result<FileResult, FileFailure>> = if self.sequential {
            jobs.iter().map(|job| self.rewrite_file(job)).collect()
        } else {
            jobs.par_iter().map(|job| self.rewrite_file(job)).collect()
        };

        for result in results {
            match result {
                Ok(file) => {
                    report.replacements += file.replacements;
                    if file.written {
                        report.written.insert(file.output);
                    }
                }
                Err(failure) => {
                    warn!("{}", failure);
                    report.failures.push(failure);
                }
            }
        }

        info!(
            "Wrote {} files ({} replacements, {} failures)",
            report.written.len(),
            report.replacements,
            report.failures.len()
        );

        Ok(report)
    }

    fn rewrite_file(&self, job: &FileJob) -> Result<FileResult, FileFailure> {
        // Earlier edits take precedence over the pristine source
        let base_path = if job.output.exists() {
            &job.output
        } else {
            &job.source
        };

        let base = fs::read(base_path).map_err(|error| FileFailure {
            path: base_path.clone(),
            stage: FileStage::Read,
            error,
        })?;

        let mut data = base.clone();
        let stats = self.patterns.apply(&mut data);

        for (pair, count) in self.patterns.iter().zip(&stats.per_pair) {
            if *count > 0 {
                debug!("{}: {} x{}", job.output.display(), pair, count);
            }
        }

        if data == base {
            return Ok(FileResult {
                output: job.output.clone(),
                written: false,
                replacements: stats.total(),
            });
        }

        write_output(&job.output, &data).map_err(|error| FileFailure {
            path: job.output.clone(),
            stage: FileStage::Write,
            error,
        })?;

        Ok(FileResult {
            output: job.output.clone(),
            written: true,
            replacements: stats.total(),
        })
    }
}

fn write_output(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)
}

fn collect_jobs(source: &Path, output: &Path, failures: &mut Vec<FileFailure>) -> Vec<FileJob> {
    if source.is_file() {
        let name = source.file_name().map(PathBuf::from).unwrap_or_default();
        return vec![FileJob {
            source: source.to_path_buf(),
            output: output.join(name),
        }];
    }

    let mut jobs = Vec::new();
    for entry in walkdir::WalkDir::new(source) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
                failures.push(FileFailure {
                    path,
                    stage: FileStage::Walk,
                    error: e.into(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };

        jobs.push(FileJob {
            source: entry.path().to_path_buf(),
            output: output.join(relative),
        });
    }

    jobs
}
