//! Singleton log sink with daily/line-cap rotation and an optional
//! async write mode.
//!
//! Grounded on `original_source/code/logsys/log.h`'s `Log`: a lazily
//! initialized singleton holding the current file handle, a line
//! counter and the stored calendar day, with an async mode that hands
//! formatted lines to a bounded queue drained by one dedicated writer
//! thread. Macro names and call sites (`info!`/`warn!`/`error!`/
//! `debug!`/`trace!`) come from this crate's original form; its bare
//! `println!` body is replaced here with the real sink described above
//! (`errors!` is renamed to `error!` to match Rust's `log`-crate
//! convention).

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::thread;

use thiserror::Error;
use threadpool::BlockingQueue;
use time::{format_description::FormatItem, macros::format_description, Date, OffsetDateTime};

const MAX_LINES_PER_FILE: usize = 50_000;
const TIMESTAMP_FORMAT: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to create log directory {0}: {1}")]
    CreateDir(PathBuf, #[source] io::Error),
    #[error("failed to open log file {0}: {1}")]
    OpenFile(PathBuf, #[source] io::Error),
    #[error("logger already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO ",
            Level::Warn => "WARN ",
            Level::Error => "ERROR",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Level::Debug => "36",
            Level::Info => "32",
            Level::Warn => "33",
            Level::Error => "31",
        }
    }
}

struct RotatingFile {
    dir: PathBuf,
    suffix: String,
    today: Date,
    split_index: usize,
    line_count: usize,
    file: File,
}

impl RotatingFile {
    fn open(dir: PathBuf, suffix: String) -> Result<Self, LogError> {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| LogError::CreateDir(dir.clone(), e))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::set_permissions(&dir, fs::Permissions::from_mode(0o777));
            }
        }
        let today = OffsetDateTime::now_utc().date();
        let file = Self::open_file(&dir, today, 0, &suffix)?;
        Ok(RotatingFile {
            dir,
            suffix,
            today,
            split_index: 0,
            line_count: 0,
            file,
        })
    }

    fn file_name(date: Date, split: usize, suffix: &str) -> String {
        if split == 0 {
            format!(
                "{:04}_{:02}_{:02}{}",
                date.year(),
                u8::from(date.month()),
                date.day(),
                suffix
            )
        } else {
            format!(
                "{:04}_{:02}_{:02}-{}{}",
                date.year(),
                u8::from(date.month()),
                date.day(),
                split,
                suffix
            )
        }
    }

    fn open_file(dir: &Path, date: Date, split: usize, suffix: &str) -> Result<File, LogError> {
        let path = dir.join(Self::file_name(date, split, suffix));
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LogError::OpenFile(path, e))
    }

    /// Rotates to a fresh file when the calendar day has changed or
    /// the 50,000-line cap for the current file was crossed, then
    /// appends `line`.
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let today = OffsetDateTime::now_utc().date();
        let due_for_split = self.line_count > 0 && self.line_count % MAX_LINES_PER_FILE == 0;
        let reopened = if today != self.today {
            self.today = today;
            self.split_index = 0;
            self.line_count = 0;
            Some(Self::open_file(&self.dir, self.today, 0, &self.suffix))
        } else if due_for_split {
            self.split_index += 1;
            Some(Self::open_file(
                &self.dir,
                self.today,
                self.split_index,
                &self.suffix,
            ))
        } else {
            None
        };
        if let Some(result) = reopened {
            self.file = result.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        self.file.write_all(line.as_bytes())?;
        self.line_count += 1;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

struct Logger {
    level: Level,
    state: Mutex<RotatingFile>,
    queue: Option<BlockingQueue<String>>,
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

/// Initializes the singleton. When `queue_size > 0` a dedicated,
/// detached writer thread drains formatted lines from an internal
/// bounded queue; otherwise every write happens synchronously on the
/// caller's thread. Safe to call at most once per process.
pub fn init(
    level: Level,
    dir: impl Into<PathBuf>,
    suffix: &str,
    queue_size: usize,
) -> Result<(), LogError> {
    let rotating = RotatingFile::open(dir.into(), suffix.to_string())?;
    let queue = if queue_size > 0 {
        Some(BlockingQueue::new(queue_size))
    } else {
        None
    };
    let logger = Logger {
        level,
        state: Mutex::new(rotating),
        queue,
    };
    LOGGER.set(logger).map_err(|_| LogError::AlreadyInitialized)?;

    if LOGGER.get().unwrap().queue.is_some() {
        thread::spawn(|| writer_loop(LOGGER.get().expect("logger set above")));
    }
    Ok(())
}

fn writer_loop(logger: &'static Logger) {
    let queue = logger
        .queue
        .as_ref()
        .expect("writer only spawned in async mode");
    while let Some(line) = queue.pop() {
        let mut state = logger.state.lock().unwrap();
        let _ = state.write_line(&line);
    }
}

/// Whether a message at `level` would be recorded. The macros check
/// this before formatting their arguments so disabled levels cost
/// nothing beyond the comparison.
pub fn enabled(level: Level) -> bool {
    LOGGER.get().is_some_and(|logger| level >= logger.level)
}

/// Formats and records one line. In async mode the line is pushed to
/// the write queue when there's room; if the queue is full it is
/// written synchronously instead of blocking the caller.
pub fn log(level: Level, args: fmt::Arguments<'_>) {
    let Some(logger) = LOGGER.get() else { return };
    if level < logger.level {
        return;
    }
    let now = OffsetDateTime::now_utc();
    let ts = now
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| String::from("----"));
    let line = format!(
        "[{}] #|| web-server ||# \x1b[{}m{}\x1b[0m: {}\n",
        ts,
        level.color(),
        level.tag(),
        args
    );
    match &logger.queue {
        Some(queue) => {
            if let Err(line) = queue.try_push(line) {
                let mut state = logger.state.lock().unwrap();
                let _ = state.write_line(&line);
            }
        }
        None => {
            let mut state = logger.state.lock().unwrap();
            let _ = state.write_line(&line);
        }
    }
}

/// Flushes the current file to disk. Does not wait for an async
/// writer to catch up with a full queue; call [`shutdown`] for that.
pub fn flush() {
    if let Some(logger) = LOGGER.get() {
        let mut state = logger.state.lock().unwrap();
        let _ = state.flush();
    }
}

/// Closes the async write queue (if any), letting the writer thread
/// drain and exit, then flushes the file one last time.
pub fn shutdown() {
    if let Some(logger) = LOGGER.get() {
        if let Some(queue) = &logger.queue {
            queue.close();
        }
        let mut state = logger.state.lock().unwrap();
        let _ = state.flush();
    }
}

#[macro_export]
macro_rules! log {
    ($level:expr, $($arg:tt)*) => {{
        if $crate::enabled($level) {
            $crate::log($level, format_args!($($arg)*));
        }
    }};
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::log!($crate::Level::Debug, $($arg)*); };
}
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { $crate::log!($crate::Level::Info, $($arg)*); };
}
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::log!($crate::Level::Warn, $($arg)*); };
}
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { $crate::log!($crate::Level::Error, $($arg)*); };
}
// Kept for call-site compatibility; the spec only defines four
// levels, so `trace!` logs at `Debug` severity rather than adding a
// fifth.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::log!($crate::Level::Debug, $($arg)*); };
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn level_ordering_matches_spec() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn file_name_includes_split_suffix_only_past_zero() {
        let d = date!(2026 - 07 - 27);
        assert_eq!(RotatingFile::file_name(d, 0, ".log"), "2026_07_27.log");
        assert_eq!(RotatingFile::file_name(d, 2, ".log"), "2026_07_27-2.log");
    }

    #[test]
    fn rotating_file_creates_directory_and_appends_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        let mut rf = RotatingFile::open(dir.clone(), ".log".to_string()).unwrap();
        rf.write_line("hello\n").unwrap();
        rf.write_line("world\n").unwrap();
        rf.flush().unwrap();
        let name = RotatingFile::file_name(OffsetDateTime::now_utc().date(), 0, ".log");
        let contents = std::fs::read_to_string(dir.join(name)).unwrap();
        assert_eq!(contents, "hello\nworld\n");
    }

    #[test]
    fn rotation_splits_after_line_cap() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("logs");
        let mut rf = RotatingFile::open(dir.clone(), ".log".to_string()).unwrap();
        rf.line_count = MAX_LINES_PER_FILE;
        rf.write_line("overflow\n").unwrap();
        assert_eq!(rf.split_index, 1);
        let name = RotatingFile::file_name(OffsetDateTime::now_utc().date(), 1, ".log");
        assert!(dir.join(name).exists());
    }
}
