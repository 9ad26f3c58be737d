//! Safe repacking through an external archiver.
//!
//! The original archive is never handed to the archiver. Instead it is
//! copied into the archive's `repack/` folder, the archiver rewrites that
//! copy in place using the edited files next to it, and the copy is moved
//! into `result/`:
//!
//! ```text
//! Idle -> Staged -> Invoked -> Relocated -> CleanedUp
//! ```
//!
//! The archiver's exit status is not trusted. Success means the staged copy
//! still exists after the archiver returns; if the archiver removed it,
//! nothing is written to `result/`.

use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant, SystemTime};
use sysinfo::{Pid, ProcessesToUpdate, System};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::layout::Layout;

/// Lock file created in `UNPACK/<stem>/` while a repack runs
pub const LOCK_FILE: &str = ".repack.lock";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepackStage {
    Idle,
    Staged,
    Invoked,
    Relocated,
    CleanedUp,
}

impl fmt::Display for RepackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepackStage::Idle => "idle",
            RepackStage::Staged => "staged",
            RepackStage::Invoked => "invoked",
            RepackStage::Relocated => "relocated",
            RepackStage::CleanedUp => "cleaned up",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum RepackError {
    #[error("no edited files found for {archive}: {} does not exist", .dir.display())]
    StagingMissing { archive: String, dir: PathBuf },

    #[error("original archive not found: {}", .0.display())]
    OriginalMissing(PathBuf),

    #[error("{archive} is already being repacked (lock file {})", .lock.display())]
    Locked { archive: String, lock: PathBuf },

    #[error("failed to launch archiver {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("archiver did not finish within {0:?}")]
    Timeout(Duration),

    #[error("repacking failed, no output produced ({} is missing after the archiver ran)", .0.display())]
    NoOutput(PathBuf),

    #[error("original archive {} changed during repack", .0.display())]
    OriginalModified(PathBuf),

    #[error("{stage}: {}: {source}", .path.display())]
    Io {
        stage: RepackStage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RepackError {
    fn io(stage: RepackStage, path: &Path) -> impl FnOnce(io::Error) -> RepackError + '_ {
        move |source| RepackError::Io {
            stage,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// External archiver invocation: `<exe> [prefix args] -a -r <staged> <repack dir>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archiver {
    pub executable: PathBuf,
    /// Arguments placed before the fixed convention, e.g. a script for an interpreter
    pub prefix_args: Vec<OsString>,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Archiver {
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        Self {
            executable: executable.into(),
            prefix_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn command(&self, staged: &Path, repack_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.prefix_args)
            .arg("-a")
            .arg("-r")
            .arg(staged)
            .arg(repack_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run to completion or until the timeout, returning the exit code
    ///
    /// On timeout the child is killed and reaped.
    fn run(&self, staged: &Path, repack_dir: &Path) -> Result<Option<i32>, RepackError> {
        let mut child = self
            .command(staged, repack_dir)
            .spawn()
            .map_err(|source| RepackError::Spawn {
                path: self.executable.clone(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            forward_output(stdout, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(stderr, "stderr");
        }

        match child.wait_timeout(self.timeout, self.poll_interval) {
            Ok(Some(status)) => {
                debug!("Archiver exited with {}", status);
                Ok(status.code())
            }
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(RepackError::Timeout(self.timeout))
            }
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(RepackError::Io {
                    stage: RepackStage::Invoked,
                    path: self.executable.clone(),
                    source,
                })
            }
        }
    }
}

/// Drain an archiver pipe into the debug log
///
/// The reader is detached; it ends when every holder of the pipe exits.
fn forward_output<R: Read + Send + 'static>(pipe: R, stream: &'static str) {
    std::thread::spawn(move || {
        for line in BufReader::new(pipe).lines().map_while(Result::ok) {
            debug!("archiver {}: {}", stream, line);
        }
    });
}

trait ChildExt {
    fn wait_timeout(&mut self, timeout: Duration, poll: Duration) -> io::Result<Option<ExitStatus>>;
}

impl ChildExt for Child {
    fn wait_timeout(&mut self, timeout: Duration, poll: Duration) -> io::Result<Option<ExitStatus>> {
        let start = Instant::now();

        loop {
            match self.try_wait()? {
                Some(status) => return Ok(Some(status)),
                None => {
                    if start.elapsed() >= timeout {
                        return Ok(None);
                    }
                    std::thread::sleep(poll);
                }
            }
        }
    }
}

/// Compute SHA-256 hash of a file
pub fn hash_file(path: &Path) -> io::Result<String> {
    let data = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    sha256: String,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn of(path: &Path) -> io::Result<Self> {
        let modified = fs::metadata(path)?.modified().ok();
        Ok(Self {
            sha256: hash_file(path)?,
            modified,
        })
    }
}

/// Exclusive per-archive lock, released on drop
///
/// The lock file holds the owner's PID. A lock whose owner is no longer
/// running is stale and gets taken over.
struct RepackLock {
    path: PathBuf,
}

impl RepackLock {
    fn acquire(path: PathBuf, archive: &str) -> Result<Self, RepackError> {
        let mut created = Self::create(&path);

        if matches!(&created, Err(e) if e.kind() == io::ErrorKind::AlreadyExists) {
            if let Some(pid) = lock_owner(&path).filter(|&pid| !process_alive(pid)) {
                warn!("Removing stale lock {} left by process {}", path.display(), pid);
                fs::remove_file(&path).map_err(RepackError::io(RepackStage::Idle, &path))?;
                created = Self::create(&path);
            }
        }

        match created {
            Ok(()) => Ok(Self { path }),
            Err(e) => Err(Self::error(path, archive, e)),
        }
    }

    fn create(path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let _ = writeln!(file, "{}", std::process::id());
        Ok(())
    }

    fn error(path: PathBuf, archive: &str, e: io::Error) -> RepackError {
        if e.kind() == io::ErrorKind::AlreadyExists {
            RepackError::Locked {
                archive: archive.to_string(),
                lock: path,
            }
        } else {
            RepackError::Io {
                stage: RepackStage::Idle,
                path,
                source: e,
            }
        }
    }
}

impl Drop for RepackLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}

/// PID recorded in a lock file, if readable
fn lock_owner(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}

/// Result of a successful repack
#[derive(Debug, Clone)]
pub struct RepackOutcome {
    pub result_path: PathBuf,
    /// Archiver exit code, informational only
    pub exit_code: Option<i32>,
    /// SHA-256 of the original archive, identical before and after
    pub original_sha256: String,
}

/// Drives the copy → invoke → move → cleanup sequence for one archive
#[derive(Debug, Clone)]
pub struct RepackOrchestrator {
    layout: Layout,
    archiver: Archiver,
}

impl RepackOrchestrator {
    pub fn new(layout: Layout, archiver: Archiver) -> Self {
        Self { layout, archiver }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Repack `archive_name` (a file name under `PAKS/`)
    pub fn repack(&self, archive_name: &str) -> Result<RepackOutcome, RepackError> {
        let dirs = self.layout.archive_dirs(archive_name);
        let original = self.layout.original_path(archive_name);

        if !dirs.repack.is_dir() {
            return Err(RepackError::StagingMissing {
                archive: archive_name.to_string(),
                dir: dirs.repack,
            });
        }
        if !original.is_file() {
            return Err(RepackError::OriginalMissing(original));
        }

        let _lock = RepackLock::acquire(dirs.base.join(LOCK_FILE), archive_name)?;

        let staged = dirs.repack.join(archive_name);
        let result_path = dirs.result.join(archive_name);

        if staged.exists() {
            warn!("Removing orphaned staging copy {}", staged.display());
            fs::remove_file(&staged).map_err(RepackError::io(RepackStage::Idle, &staged))?;
        }

        let before = Fingerprint::of(&original).map_err(RepackError::io(RepackStage::Idle, &original))?;

        // Idle -> Staged
        fs::create_dir_all(&dirs.result).map_err(RepackError::io(RepackStage::Idle, &dirs.result))?;
        fs::copy(&original, &staged).map_err(|e| {
            discard(&staged);
            RepackError::io(RepackStage::Idle, &staged)(e)
        })?;
        info!("Repacking {} while keeping the original safe", archive_name);
        debug!("Stage {}: {}", RepackStage::Staged, staged.display());

        // Staged -> Invoked
        let exit_code = match self.archiver.run(&staged, &dirs.repack) {
            Ok(code) => code,
            Err(e) => {
                discard(&staged);
                return Err(e);
            }
        };
        debug!("Stage {}: exit code {:?}", RepackStage::Invoked, exit_code);

        // Invoked -> Relocated
        if !staged.exists() {
            return Err(RepackError::NoOutput(staged));
        }
        relocate(&staged, &result_path)?;
        debug!("Stage {}: {}", RepackStage::Relocated, result_path.display());

        // Relocated -> CleanedUp
        if staged.exists() {
            fs::remove_file(&staged).map_err(RepackError::io(RepackStage::CleanedUp, &staged))?;
            info!("Temporary file deleted from {}", dirs.repack.display());
        }

        let after = Fingerprint::of(&original).map_err(RepackError::io(RepackStage::CleanedUp, &original))?;
        if after != before {
            return Err(RepackError::OriginalModified(original));
        }

        info!("Repacking completed, saved at {}", result_path.display());
        Ok(RepackOutcome {
            result_path,
            exit_code,
            original_sha256: before.sha256,
        })
    }
}

fn discard(staged: &Path) {
    if staged.exists() {
        if let Err(e) = fs::remove_file(staged) {
            warn!("Failed to remove staging copy {}: {}", staged.display(), e);
        }
    }
}

/// Move the staged archive into place
///
/// Falls back to copy-then-rename through a `.partial` sibling so the final
/// path never holds a half-written file.
fn relocate(staged: &Path, dest: &Path) -> Result<(), RepackError> {
    if fs::rename(staged, dest).is_ok() {
        return Ok(());
    }

    let mut partial_name = dest.file_name().map(OsString::from).unwrap_or_default();
    partial_name.push(".partial");
    let partial = dest.with_file_name(partial_name);

    fs::copy(staged, &partial).map_err(|e| {
        let _ = fs::remove_file(&partial);
        RepackError::io(RepackStage::Relocated, &partial)(e)
    })?;
    fs::rename(&partial, dest).map_err(|e| {
        let _ = fs::remove_file(&partial);
        RepackError::io(RepackStage::Relocated, dest)(e)
    })?;
    fs::remove_file(staged).map_err(RepackError::io(RepackStage::Relocated, staged))?;

    Ok(())
}
