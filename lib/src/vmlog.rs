//! Device-layer logging.
//!
//! Every log line funnels through a single **backend** function pointer that
//! the embedding VMM registers at startup. The device crates are libraries
//! and never touch the host's stdio on their own, so until a backend is
//! registered log lines are discarded.
//!
//! # Backend contract
//!
//! The backend receives the level and the pre-formatted arguments for a
//! **single log line**. It must write the text and a trailing newline without
//! interleaving with lines from other vCPU threads.
//!
//! ```ignore
//! fn stderr_backend(level: LogLevel, args: core::fmt::Arguments<'_>) {
//!     eprintln!("[{level}] {args}");
//! }
//! lkvm_lib::vmlog::register_backend(stderr_backend);
//! ```

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// Log levels
// ---------------------------------------------------------------------------

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Parse a level name, ignoring ASCII case.
    pub fn parse(value: &str) -> Option<Self> {
        const NAMES: [(&str, LogLevel); 5] = [
            ("error", LogLevel::Error),
            ("warn", LogLevel::Warn),
            ("info", LogLevel::Info),
            ("debug", LogLevel::Debug),
            ("trace", LogLevel::Trace),
        ];
        NAMES
            .iter()
            .find(|(name, _)| value.eq_ignore_ascii_case(name))
            .map(|&(_, level)| level)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static CURRENT_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

#[inline(always)]
fn is_enabled(level: LogLevel) -> bool {
    level as u8 <= CURRENT_LEVEL.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Backend dispatch
// ---------------------------------------------------------------------------

/// Signature of a log backend.
pub type LogBackend = fn(LogLevel, fmt::Arguments<'_>);

/// Stored as a raw pointer; `null` means "no backend, discard".
static BACKEND: AtomicPtr<()> = AtomicPtr::new(core::ptr::null_mut());

#[inline]
fn dispatch(level: LogLevel, args: fmt::Arguments<'_>) {
    let ptr = BACKEND.load(Ordering::Acquire);
    if ptr.is_null() {
        return;
    }
    // SAFETY: `register_backend` only stores valid `LogBackend` fn pointers,
    // which have the same size as `*mut ()` on every supported host.
    let backend: LogBackend = unsafe { core::mem::transmute::<*mut (), LogBackend>(ptr) };
    backend(level, args);
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Route all subsequent log lines to `backend`.
pub fn register_backend(backend: LogBackend) {
    BACKEND.store(backend as *mut (), Ordering::Release);
}

/// Drop the registered backend; later lines are discarded.
pub fn clear_backend() {
    BACKEND.store(core::ptr::null_mut(), Ordering::Release);
}

pub fn set_level(level: LogLevel) {
    CURRENT_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn level() -> LogLevel {
    LogLevel::from_raw(CURRENT_LEVEL.load(Ordering::Relaxed))
}

pub fn is_enabled_level(level: LogLevel) -> bool {
    is_enabled(level)
}

/// Emit a formatted log line at the given level.
///
/// The backend appends the newline; callers should not include one.
pub fn log_args(level: LogLevel, args: fmt::Arguments<'_>) {
    if !is_enabled(level) {
        return;
    }
    dispatch(level, args);
}

// ---------------------------------------------------------------------------
// Macros
// ---------------------------------------------------------------------------

#[macro_export]
macro_rules! vm_log {
    ($level:expr, $($arg:tt)*) => {{
        $crate::vmlog::log_args($level, ::core::format_args!($($arg)*));
    }};
}

#[macro_export]
macro_rules! vm_error {
    ($($arg:tt)*) => {
        $crate::vmlog::log_args($crate::vmlog::LogLevel::Error, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! vm_warn {
    ($($arg:tt)*) => {
        $crate::vmlog::log_args($crate::vmlog::LogLevel::Warn, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! vm_info {
    ($($arg:tt)*) => {
        $crate::vmlog::log_args($crate::vmlog::LogLevel::Info, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! vm_debug {
    ($($arg:tt)*) => {
        $crate::vmlog::log_args($crate::vmlog::LogLevel::Debug, ::core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! vm_trace {
    ($($arg:tt)*) => {
        $crate::vmlog::log_args($crate::vmlog::LogLevel::Trace, ::core::format_args!($($arg)*))
    };
}
