/// Per-category event journal
///
/// One append-only file per category under the run's `log/` directory. Every
/// record opens the file, writes one preassembled line with a single
/// `write_all`, and closes it again, so lines from concurrent processes never
/// interleave mid-line and no handle outlives the call.
///
/// Not async-signal-safe: it allocates and formats. Never call it from a
/// signal handler.
use crate::kernel::process::ProcessIdentity;
use chrono::Local;
use log::{debug, warn};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Journal destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// fork, exit, signal, reap
    Process,
    /// orphan demonstrator transitions
    Orphan,
    /// zombie demonstrator transitions
    Zombie,
    /// original artifact creation and copy
    FileMaking,
    /// cipher pass over copies
    Obfuscation,
}

impl LogCategory {
    pub const ALL: [LogCategory; 5] = [
        LogCategory::Process,
        LogCategory::Orphan,
        LogCategory::Zombie,
        LogCategory::FileMaking,
        LogCategory::Obfuscation,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Process => "process.log",
            Self::Orphan => "orphan.log",
            Self::Zombie => "zombie.log",
            Self::FileMaking => "file_making.log",
            Self::Obfuscation => "obfuscation.log",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Process => "process",
            Self::Orphan => "orphan",
            Self::Zombie => "zombie",
            Self::FileMaking => "file-making",
            Self::Obfuscation => "obfuscation",
        };
        f.write_str(name)
    }
}

/// Timestamp format of the line header
pub const LINE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Assemble one journal line, newline included
pub fn format_line(
    timestamp: &str,
    identity: &ProcessIdentity,
    tag: &str,
    message: fmt::Arguments<'_>,
) -> String {
    format!(
        "[{}][PID:{:<6}][PPID:{:<6}][PGID:{:<6}][{}] {}\n",
        timestamp,
        identity.pid.as_raw(),
        identity.ppid.as_raw(),
        identity.pgid.as_raw(),
        tag,
        message
    )
}

/// Writer for the per-category files of one run
#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
}

impl Journal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, category: LogCategory) -> PathBuf {
        self.dir.join(category.file_name())
    }

    /// Append one record. Failure goes to stderr and is otherwise ignored.
    pub fn record(&self, category: LogCategory, tag: &str, message: fmt::Arguments<'_>) {
        let timestamp = Local::now().format(LINE_TIME_FORMAT).to_string();
        let identity = ProcessIdentity::current();
        let line = format_line(&timestamp, &identity, tag, message);
        debug!("[{}] {}", category, line.trim_end());
        self.append(category, &line);
    }

    /// Same as [`Journal::record`] with a `WARN` marker, mirrored at warn level
    pub fn record_warning(&self, category: LogCategory, tag: &str, message: fmt::Arguments<'_>) {
        let timestamp = Local::now().format(LINE_TIME_FORMAT).to_string();
        let identity = ProcessIdentity::current();
        let line = format_line(&timestamp, &identity, tag, format_args!("WARN {}", message));
        warn!("[{}] {}", category, line.trim_end());
        self.append(category, &line);
    }

    fn append(&self, category: LogCategory, line: &str) {
        let path = self.path_for(category);
        let mut file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!(
                    "Failed to open {} log file {}: {}",
                    category,
                    path.display(),
                    e
                );
                return;
            }
        };
        if let Err(e) = file.write_all(line.as_bytes()) {
            eprintln!(
                "Failed to write {} log file {}: {}",
                category,
                path.display(),
                e
            );
        }
    }
}

/// `journal!(journal, LogCategory::Process, "TAG", "fmt {}", args)`
#[macro_export]
macro_rules! journal {
    ($journal:expr, $category:expr, $tag:expr, $($arg:tt)+) => {
        $journal.record($category, $tag, format_args!($($arg)+))
    };
}

/// Warning flavour of [`journal!`]
#[macro_export]
macro_rules! journal_warn {
    ($journal:expr, $category:expr, $tag:expr, $($arg:tt)+) => {
        $journal.record_warning($category, $tag, format_args!($($arg)+))
    };
}
