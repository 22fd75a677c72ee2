//! Per-run log for InpaintFE: `<data dir>/InpaintFE/inpaintfe.log`, emptied
//! each time the logger starts.
//!
//! Records mask rasterization, submissions, stale responses and failures via
//! `log_info!` / `log_warn!` / `log_err!`. Until [`init`] or [`init_at`] runs
//! nothing is written to disk; `--verbose` mirrors every line to stderr.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

const APP_DIR: &str = "InpaintFE";
const LOG_NAME: &str = "inpaintfe.log";

static SINK: OnceLock<Mutex<File>> = OnceLock::new();
static SINK_PATH: OnceLock<PathBuf> = OnceLock::new();
static ECHO: AtomicBool = AtomicBool::new(false);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Where this run is logging, once initialised.
pub fn log_path() -> Option<&'static PathBuf> {
    SINK_PATH.get()
}

pub fn set_echo(enabled: bool) {
    ECHO.store(enabled, Ordering::Relaxed);
}

/// Append one raw line. Write failures are dropped.
pub fn write_line(line: &str) {
    if ECHO.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
    if let Some(sink) = SINK.get()
        && let Ok(mut file) = sink.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// `[HH:MM:SS] [LEVEL] msg`
pub fn format_line(level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", clock(), level.tag(), msg)
}

pub fn write(level: Level, msg: &str) {
    write_line(&format_line(level, msg));
}

// No trailing `;` so the macros also work as match-arm expressions.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

pub fn init() {
    init_at(&default_log_path());
}

/// Open (truncating) `path` as this run's log. Later calls are ignored.
/// Panics are copied into the log before the previous hook runs.
pub fn init_at(path: &Path) {
    if SINK.get().is_some() {
        return;
    }
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }
    let opened = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path);
    let file = match opened {
        Ok(f) => f,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return;
        }
    };
    let _ = SINK_PATH.set(path.to_path_buf());
    let _ = SINK.set(Mutex::new(file));

    write_line(&format!(
        "=== {} run started (unix {}) -> {} ===",
        APP_DIR,
        epoch_secs().unwrap_or(0),
        path.display()
    ));

    let chained = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format!("[{}] [PANIC] {}", clock(), info));
        chained(info);
    }));
}

pub fn default_log_path() -> PathBuf {
    data_root().join(APP_DIR).join(LOG_NAME)
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var).map(PathBuf::from)
}

fn data_root() -> PathBuf {
    let platform = if cfg!(target_os = "windows") {
        env_path("APPDATA")
    } else if cfg!(target_os = "macos") {
        env_path("HOME").map(|h| h.join("Library").join("Application Support"))
    } else {
        None
    };
    platform
        .or_else(|| env_path("XDG_DATA_HOME"))
        .or_else(|| env_path("HOME").map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn epoch_secs() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

/// UTC wall clock, `HH:MM:SS`.
fn clock() -> String {
    let Some(secs) = epoch_secs() else {
        return "??:??:??".to_string();
    };
    format!(
        "{:02}:{:02}:{:02}",
        (secs % 86_400) / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}
