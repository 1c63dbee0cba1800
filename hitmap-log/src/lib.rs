//! Logging for the hitmap crates.
//!
//! Output is controlled entirely through environment variables so that a
//! host application can turn diagnostics on without code changes:
//!
//! - `HITMAP_DEBUG=1` - shortcut for `HITMAP_LOG_LEVEL=debug`
//! - `HITMAP_LOG_LEVEL=trace|debug|info|warn|error|off`
//! - `HITMAP_LOG_FORMAT=json|compact|facade`
//! - `HITMAP_LOG_TIMESTAMPS=1|0`
//!
//! The `facade` format hands every line to the [`log`] crate instead of
//! writing to stderr, which lets an application route hitmap output through
//! whatever logger it already installed.
//!
//! ```rust
//! use hitmap_log::{debug, info};
//!
//! let hits = 3;
//! debug!("mapping {} hits", hits);
//! info!(target: "hitmap::transport", "connected");
//! ```

use once_cell::sync::Lazy;
use std::env;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    /// Per-hit detail.
    Trace = 0,
    /// Per-request detail.
    Debug = 1,
    /// Lifecycle events.
    Info = 2,
    /// Recoverable problems.
    Warn = 3,
    /// Failures.
    Error = 4,
    /// Nothing is logged.
    Off = 5,
}

impl Level {
    /// Upper-case name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            _ => Level::Off,
        }
    }

    fn to_log(self) -> Option<log::Level> {
        match self {
            Level::Trace => Some(log::Level::Trace),
            Level::Debug => Some(log::Level::Debug),
            Level::Info => Some(log::Level::Info),
            Level::Warn => Some(log::Level::Warn),
            Level::Error => Some(log::Level::Error),
            Level::Off => None,
        }
    }
}

impl FromStr for Level {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "off" | "none" => Ok(Level::Off),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One JSON object per line on stderr.
    Json,
    /// `HH:MM:SS L target: message` on stderr.
    Compact,
    /// Forward to the `log` crate.
    Facade,
}

impl FromStr for Format {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "compact" => Ok(Format::Compact),
            "facade" | "log" => Ok(Format::Facade),
            _ => Err(()),
        }
    }
}

/// Logging settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level written.
    pub level: Level,
    /// Output format.
    pub format: Format,
    /// Prefix lines with a timestamp.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Warn,
            format: Format::Json,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Read `HITMAP_*` variables, falling back to [`LogConfig::default`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let debug = env_flag("HITMAP_DEBUG").unwrap_or(false);

        let level = env::var("HITMAP_LOG_LEVEL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(if debug { Level::Debug } else { defaults.level });

        let format = env::var("HITMAP_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.format);

        Self {
            level,
            format,
            timestamps: env_flag("HITMAP_LOG_TIMESTAMPS").unwrap_or(defaults.timestamps),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

static CONFIG: Lazy<LogConfig> = Lazy::new(|| {
    let config = LogConfig::from_env();
    LEVEL.store(config.level as u8, Ordering::SeqCst);
    config
});

// Sentinel until CONFIG is forced; any real level is below it.
const UNINITIALIZED: u8 = u8::MAX;

static LEVEL: AtomicU8 = AtomicU8::new(UNINITIALIZED);

/// Resolve the environment eagerly. Otherwise this happens on first use.
pub fn init() {
    Lazy::force(&CONFIG);
}

/// The active configuration.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

/// Current minimum level.
pub fn current_level() -> Level {
    let raw = LEVEL.load(Ordering::Relaxed);
    if raw == UNINITIALIZED {
        init();
        return Level::from_u8(LEVEL.load(Ordering::Relaxed));
    }
    Level::from_u8(raw)
}

/// Override the minimum level at runtime.
pub fn set_level(level: Level) {
    init();
    LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Whether a line at `level` would be written.
#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    level != Level::Off && level >= current_level()
}

#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    if !is_level_enabled(level) {
        return;
    }

    let config = config();
    match config.format {
        Format::Json => write_json(level, target, message, config.timestamps),
        Format::Compact => write_compact(level, target, message, config.timestamps),
        Format::Facade => {
            if let Some(lvl) = level.to_log() {
                log::log!(target: target, lvl, "{}", message);
            }
        }
    }
}

fn write_compact(level: Level, target: &str, message: &str, timestamps: bool) {
    let mut stderr = std::io::stderr().lock();
    if timestamps {
        let _ = write!(stderr, "{} ", chrono::Local::now().format("%H:%M:%S%.3f"));
    }
    let _ = writeln!(
        stderr,
        "{} {}: {}",
        level.as_str().chars().next().unwrap_or('?'),
        target,
        message
    );
}

#[cfg(feature = "json")]
fn write_json(level: Level, target: &str, message: &str, timestamps: bool) {
    #[derive(serde::Serialize)]
    struct Line<'a> {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        level: &'a str,
        target: &'a str,
        message: &'a str,
    }

    let line = Line {
        timestamp: timestamps.then(|| chrono::Utc::now().to_rfc3339()),
        level: level.as_str(),
        target,
        message,
    };

    if let Ok(json) = serde_json::to_string(&line) {
        eprintln!("{}", json);
    }
}

#[cfg(not(feature = "json"))]
fn write_json(level: Level, target: &str, message: &str, timestamps: bool) {
    // Without serde the compact layout is the closest structured fallback.
    write_compact(level, target, message, timestamps);
}

/// Log at [`Level::Trace`].
#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Trace) {
            $crate::log($crate::Level::Trace, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::trace!(target: module_path!(), $($arg)+)
    };
}

/// Log at [`Level::Debug`].
#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Debug) {
            $crate::log($crate::Level::Debug, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::debug!(target: module_path!(), $($arg)+)
    };
}

/// Log at [`Level::Info`].
#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Info) {
            $crate::log($crate::Level::Info, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::info!(target: module_path!(), $($arg)+)
    };
}

/// Log at [`Level::Warn`].
#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Warn) {
            $crate::log($crate::Level::Warn, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::warn!(target: module_path!(), $($arg)+)
    };
}

/// Log at [`Level::Error`].
#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($crate::Level::Error) {
            $crate::log($crate::Level::Error, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        $crate::error!(target: module_path!(), $($arg)+)
    };
}
