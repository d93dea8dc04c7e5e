//! Formwork Logging
//!
//! Leveled logging for the form engine, controlled by `FORMWORK_*`
//! environment variables.
//!
//! # Usage
//!
//! ```rust
//! use formwork_log::{debug, info, targets};
//!
//! debug!(target: targets::STORE, "set {} = {:?}", "username", "neo");
//! info!("form ready");
//! ```
//!
//! # Environment Variables
//!
//! - `FORMWORK_DEBUG=1` - Enable debug logging
//! - `FORMWORK_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `FORMWORK_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `FORMWORK_LOG_TIMESTAMPS=1|0` - Include timestamps
//!
//! # Capturing in tests
//!
//! ```rust
//! use formwork_log::{capture, warn, Level};
//!
//! capture::start(Level::Debug);
//! warn!(target: "formwork::array", "minimum reached");
//! let lines = capture::take();
//! assert!(lines[0].contains("minimum reached"));
//! ```

use once_cell::sync::Lazy;
use std::env;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Log targets used by the engine components.
pub mod targets {
    pub const STORE: &str = "formwork::store";
    pub const VALIDATION: &str = "formwork::validation";
    pub const ARRAY: &str = "formwork::array";
    pub const SUBMIT: &str = "formwork::submit";
}

// ============================================================================
// Levels and formats
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl Level {
    /// Parse a level name, case insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

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

    const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Off,
    ];

    fn from_u8(raw: u8) -> Self {
        Self::ALL.get(raw as usize).copied().unwrap_or(Level::Off)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human readable, one field per column
    Pretty,
    /// Short single-line form
    Compact,
    /// One JSON object per line
    Json,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Global configuration
// ============================================================================

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Warn as u8);

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

/// Logging configuration read once from the environment.
#[derive(Debug)]
pub struct LogConfig {
    pub debug: bool,
    pub level: Level,
    pub format: Format,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Warn,
            format: Format::Compact,
            timestamps: true,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl LogConfig {
    /// Read `FORMWORK_*` variables and publish the level to the global atomics.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let debug = env_flag("FORMWORK_DEBUG").unwrap_or(defaults.debug);

        let level = env::var("FORMWORK_LOG_LEVEL")
            .ok()
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { defaults.level });

        let format = env::var("FORMWORK_LOG_FORMAT")
            .ok()
            .and_then(|s| Format::parse(&s))
            .unwrap_or(defaults.format);

        let timestamps = env_flag("FORMWORK_LOG_TIMESTAMPS").unwrap_or(defaults.timestamps);

        DEBUG_ENABLED.store(debug, Ordering::SeqCst);
        LOG_LEVEL.store(level as u8, Ordering::SeqCst);

        Self {
            debug,
            level,
            format,
            timestamps,
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Force reading the environment now instead of on first use.
pub fn init() {
    Lazy::force(&CONFIG);
}

pub fn config() -> &'static LogConfig {
    &CONFIG
}

#[inline]
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn current_level() -> Level {
    Lazy::force(&CONFIG);
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Change the level at runtime.
pub fn set_level(level: Level) {
    Lazy::force(&CONFIG);
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

pub fn set_debug(enabled: bool) {
    Lazy::force(&CONFIG);
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    if enabled && current_level() > Level::Debug {
        set_level(Level::Debug);
    }
}

/// Whether a message at `level` would go anywhere.
#[inline]
pub fn enabled(level: Level) -> bool {
    writes(level) || capture::accepts(level)
}

/// Whether `level` reaches stderr under the current settings
fn writes(level: Level) -> bool {
    level >= current_level() || (level == Level::Debug && is_debug_enabled())
}

// ============================================================================
// Output
// ============================================================================

#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    if capture::record(level, target, message) {
        return;
    }

    if !writes(level) {
        return;
    }

    let config = config();
    match config.format {
        Format::Pretty => log_pretty(level, target, message, config),
        Format::Compact => log_compact(level, target, message, config),
        Format::Json => log_json(level, target, message),
    }
}

fn log_pretty(level: Level, target: &str, message: &str, config: &LogConfig) {
    let mut stderr = std::io::stderr().lock();
    if config.timestamps {
        let now = chrono::Local::now();
        let _ = write!(stderr, "{} ", now.format("%Y-%m-%d %H:%M:%S%.3f"));
    }
    let _ = writeln!(stderr, "{:5} [{}] {}", level.as_str(), target, message);
}

fn log_compact(level: Level, target: &str, message: &str, config: &LogConfig) {
    let mut stderr = std::io::stderr().lock();
    if config.timestamps {
        let now = chrono::Local::now();
        let _ = write!(stderr, "{} ", now.format("%H:%M:%S"));
    }
    let initial = level.as_str().chars().next().unwrap_or('?');
    let _ = writeln!(stderr, "{} {}: {}", initial, target, message);
}

#[cfg(feature = "json")]
fn log_json(level: Level, target: &str, message: &str) {
    use serde::Serialize;

    #[derive(Serialize)]
    struct LogEntry<'a> {
        timestamp: String,
        level: &'a str,
        target: &'a str,
        message: &'a str,
    }

    let entry = LogEntry {
        timestamp: chrono::Utc::now().to_rfc3339(),
        level: level.as_str(),
        target,
        message,
    };

    if let Ok(json) = serde_json::to_string(&entry) {
        eprintln!("{}", json);
    }
}

#[cfg(not(feature = "json"))]
fn log_json(level: Level, target: &str, message: &str) {
    eprintln!(
        r#"{{"timestamp":"{}","level":"{}","target":{:?},"message":{:?}}}"#,
        chrono::Utc::now().to_rfc3339(),
        level.as_str(),
        target,
        message
    );
}

// ============================================================================
// Capture
// ============================================================================

pub mod capture {
    //! Per-thread capture of log lines.
    //!
    //! While capturing, messages at or above the capture level are recorded
    //! as `LEVEL target: message` instead of being written to stderr. Tests
    //! on a current-thread runtime see lines from their spawned tasks too.

    use super::Level;
    use std::cell::RefCell;

    thread_local! {
        static BUFFER: RefCell<Option<(Level, Vec<String>)>> = const { RefCell::new(None) };
    }

    /// Begin capturing on this thread
    pub fn start(level: Level) {
        BUFFER.with(|buffer| *buffer.borrow_mut() = Some((level, Vec::new())));
    }

    /// Stop capturing and return everything recorded
    pub fn take() -> Vec<String> {
        BUFFER.with(|buffer| {
            buffer
                .borrow_mut()
                .take()
                .map(|(_, lines)| lines)
                .unwrap_or_default()
        })
    }

    pub(crate) fn accepts(level: Level) -> bool {
        BUFFER.with(|buffer| {
            buffer
                .borrow()
                .as_ref()
                .is_some_and(|(min, _)| level >= *min)
        })
    }

    pub(crate) fn record(level: Level, target: &str, message: &str) -> bool {
        BUFFER.with(|buffer| match buffer.borrow_mut().as_mut() {
            Some((min, lines)) => {
                if level >= *min {
                    lines.push(format!("{} {}: {}", level.as_str(), target, message));
                }
                true
            }
            None => false,
        })
    }
}

// ============================================================================
// Macros
// ============================================================================

#[doc(hidden)]
#[macro_export]
macro_rules! __emit {
    ($level:ident, target: $target:expr, $($arg:tt)+) => {
        if $crate::enabled($crate::Level::$level) {
            $crate::log($crate::Level::$level, $target, &format!($($arg)+));
        }
    };
    ($level:ident, $($arg:tt)+) => {
        $crate::__emit!($level, target: module_path!(), $($arg)+)
    };
}

/// Log a trace message.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => { $crate::__emit!(Trace, $($arg)+) };
}

/// Log a debug message.
///
/// Enabled by `FORMWORK_DEBUG=1` or `FORMWORK_LOG_LEVEL=debug`.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => { $crate::__emit!(Debug, $($arg)+) };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { $crate::__emit!(Info, $($arg)+) };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { $crate::__emit!(Warn, $($arg)+) };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => { $crate::__emit!(Error, $($arg)+) };
}
