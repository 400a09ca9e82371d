use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::Duration,
};
use tracing::{debug, warn};

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const LOG_NAME_FORMAT: &str = "%Y%m%d_%H%M%S";
const MAX_LOG_NAME_ATTEMPTS: u32 = 1000;

/// Terminal classification of one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum OutcomeKind {
    /// Converter exited with status 0
    Success,
    /// Output already existed and overwriting was disabled
    Skipped,
    /// Converter exited with a nonzero status
    Failed,
    /// The task could not be prepared or the converter could not be run
    Errored,
}

impl OutcomeKind {
    const fn level(self) -> Level {
        match self {
            Self::Success => Level::Success,
            Self::Skipped => Level::Skip,
            Self::Failed => Level::Failed,
            Self::Errored => Level::Error,
        }
    }
}

/// Result of processing one input file. Created once, never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    /// Classification
    pub kind: OutcomeKind,

    /// Input file
    pub input: PathBuf,

    /// Output file, if it was resolved before the task ended
    pub output: Option<PathBuf>,

    /// Human-readable detail
    pub message: String,
}

impl TaskOutcome {
    pub(crate) fn success(input: &Path, output: &Path) -> Self {
        Self {
            kind: OutcomeKind::Success,
            input: input.to_path_buf(),
            output: Some(output.to_path_buf()),
            message: format!("{} -> {}", input.display(), output.display()),
        }
    }

    pub(crate) fn skipped(input: &Path, output: &Path) -> Self {
        Self {
            kind: OutcomeKind::Skipped,
            input: input.to_path_buf(),
            output: Some(output.to_path_buf()),
            message: format!("{} (output exists: {})", input.display(), output.display()),
        }
    }

    pub(crate) fn failed(input: &Path, output: &Path, detail: impl fmt::Display) -> Self {
        Self {
            kind: OutcomeKind::Failed,
            input: input.to_path_buf(),
            output: Some(output.to_path_buf()),
            message: format!("{}: {detail}", input.display()),
        }
    }

    pub(crate) fn errored(input: &Path, output: Option<&Path>, detail: impl fmt::Display) -> Self {
        Self {
            kind: OutcomeKind::Errored,
            input: input.to_path_buf(),
            output: output.map(Path::to_path_buf),
            message: format!("{}: {detail}", input.display()),
        }
    }
}

/// Severity tag written in front of every log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Level {
    Info,
    Warn,
    Skip,
    Success,
    Failed,
    Error,
    Gzip,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Skip => "SKIP",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Error => "ERROR",
            Self::Gzip => "GZIP",
        })
    }
}

/// Outcome counts for a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Input files discovered
    pub total: usize,

    /// Successful conversions
    pub success: usize,

    /// Inputs skipped because their output existed
    pub skipped: usize,

    /// Conversions the converter rejected
    pub failed: usize,

    /// Tasks that could not be run at all
    pub errored: usize,

    /// When the run started
    pub started_at: DateTime<Local>,

    /// When the last task finished
    pub finished_at: DateTime<Local>,

    /// Run log written to the destination root
    pub log_file: PathBuf,
}

impl RunSummary {
    /// Counts outcomes by kind.
    #[must_use]
    pub fn from_outcomes(
        outcomes: &[TaskOutcome],
        started_at: DateTime<Local>,
        finished_at: DateTime<Local>,
        log_file: PathBuf,
    ) -> Self {
        let count = |kind| outcomes.iter().filter(|o| o.kind == kind).count();

        Self {
            total: outcomes.len(),
            success: count(OutcomeKind::Success),
            skipped: count(OutcomeKind::Skipped),
            failed: count(OutcomeKind::Failed),
            errored: count(OutcomeKind::Errored),
            started_at,
            finished_at,
            log_file,
        }
    }

    /// Failed and errored tasks together.
    #[must_use]
    pub const fn failures(&self) -> usize {
        self.failed + self.errored
    }

    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// The one-line summary written at the end of the log.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "Success: {} | Skipped: {} | Failed: {}",
            self.success,
            self.skipped,
            self.failures()
        )
    }

    /// Prints the summary line and log location to stdout.
    pub fn print_summary(&self) {
        println!(
            "{} ({} files, {:.2}s)",
            self.summary_line(),
            self.total,
            self.duration().as_secs_f64()
        );
        println!("Log: {}", self.log_file.display());
    }
}

/// Collects outcomes from concurrent workers and appends them to the run log.
///
/// Each log line is written whole while holding the file lock, so lines from
/// different workers may interleave but are never torn.
#[derive(Debug)]
pub(crate) struct Reporter {
    log_path: PathBuf,
    log: Mutex<File>,
    outcomes: Mutex<Vec<TaskOutcome>>,
}

impl Reporter {
    /// Creates a fresh `<dest_root>/conversion_log_<timestamp>.txt`.
    ///
    /// A run never appends to another run's log: if the name is taken, a
    /// `_1`, `_2`, ... suffix is added until an unused one is found.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be created.
    pub(crate) fn create(dest_root: &Path, started_at: DateTime<Local>) -> Result<Self> {
        let (log_path, file) = create_log_file(dest_root, started_at)?;

        debug!("Writing run log to {}", log_path.display());

        Ok(Self {
            log_path,
            log: Mutex::new(file),
            outcomes: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Appends one line to the run log.
    ///
    /// A failed write is reported through tracing and otherwise ignored.
    pub(crate) fn event(&self, level: Level, message: impl fmt::Display) {
        let line = format!(
            "{} [{level}] {message}\n",
            Local::now().format(LOG_TIMESTAMP_FORMAT)
        );

        let mut file = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|()| file.flush()) {
            warn!("Failed to write run log {}: {}", self.log_path.display(), e);
        }
    }

    /// Logs and stores a task's terminal outcome.
    pub(crate) fn record(&self, outcome: TaskOutcome) {
        self.event(outcome.kind.level(), &outcome.message);
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }

    /// Takes every outcome recorded so far.
    pub(crate) fn take_outcomes(&self) -> Vec<TaskOutcome> {
        std::mem::take(&mut *self.outcomes.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Writes the final summary line.
    pub(crate) fn write_summary(&self, summary: &RunSummary) {
        self.event(Level::Info, summary.summary_line());
    }
}

fn create_log_file(dest_root: &Path, started_at: DateTime<Local>) -> Result<(PathBuf, File)> {
    let stamp = started_at.format(LOG_NAME_FORMAT).to_string();

    for attempt in 0..MAX_LOG_NAME_ATTEMPTS {
        let log_path = dest_root.join(log_file_name(&stamp, attempt));
        match OpenOptions::new().create_new(true).append(true).open(&log_path) {
            Ok(file) => return Ok((log_path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(Error::io(&log_path, e)),
        }
    }

    Err(Error::io(
        dest_root,
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no unused run log name for {stamp}"),
        ),
    ))
}

fn log_file_name(stamp: &str, attempt: u32) -> String {
    if attempt == 0 {
        format!("conversion_log_{stamp}.txt")
    } else {
        format!("conversion_log_{stamp}_{attempt}.txt")
    }
}
