//! Injectable log sinks.
//!
//! Components never log through the process-wide `log` macros directly. Each one is handed a
//! [`SharedLogger`] at construction and emits through it with [`emit!`], so a test can capture
//! exactly what one instance logged without installing a global logger.

use log::{Level, Log, Metadata, Record};
use regex::Regex;
use std::borrow::Cow;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"gh[pousr]_[A-Za-z0-9]{36,}", "ghp_REDACTED"),
        (r"github_pat_[A-Za-z0-9_]{22,}", "github_pat_REDACTED"),
        (r"(?i)bearer\s+[A-Za-z0-9._-]{20,}", "Bearer REDACTED"),
        (r#"(?i)password[=:]\s*["']?[^"'\s]+["']?"#, "password=REDACTED"),
        (r#"(?i)api_key[=:]\s*["']?[^"'\s]+["']?"#, "api_key=REDACTED"),
        (r#"(?i)token[=:]\s*["']?[^"'\s]+["']?"#, "token=REDACTED"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).expect("invalid regex"), replacement))
    .collect()
});

/// A log sink shared between components.
pub type SharedLogger = Arc<dyn Log>;

/// Emit a formatted record through an injected [`SharedLogger`].
///
/// The calling module must define a `LOG_TARGET` constant.
#[macro_export]
macro_rules! emit {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let logger: &dyn ::log::Log = &*$logger;
        let metadata = ::log::Metadata::builder().level($level).target(LOG_TARGET).build();
        if logger.enabled(&metadata) {
            logger.log(
                &::log::Record::builder()
                    .metadata(metadata)
                    .args(format_args!($($arg)+))
                    .module_path(Some(module_path!()))
                    .file(Some(file!()))
                    .line(Some(line!()))
                    .build(),
            );
        }
    }};
}

/// Forwards every record to the process-wide logger installed through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalLogger;

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level() && log::logger().enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            log::logger().log(record);
        }
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

/// Returns a logger that forwards to the process-wide `log` facade.
#[must_use]
pub fn global() -> SharedLogger {
    Arc::new(GlobalLogger)
}

/// Replace credentials that may appear in free text (tokens, bearer headers, `key=value` secrets).
#[must_use]
pub fn redact(text: &str) -> Cow<'_, str> {
    let mut out = Cow::Borrowed(text);
    for (pattern, replacement) in SECRET_PATTERNS.iter() {
        if pattern.is_match(&out) {
            out = Cow::Owned(pattern.replace_all(&out, *replacement).into_owned());
        }
    }
    out
}

/// Wraps another logger and scrubs credentials out of every message before forwarding it.
#[derive(Debug)]
pub struct RedactingLogger<L> {
    inner: L,
}

impl<L: Log> RedactingLogger<L> {
    pub const fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<L: Log> Log for RedactingLogger<L> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.inner.enabled(record.metadata()) {
            return;
        }

        let text = record.args().to_string();
        let redacted = redact(&text);
        self.inner.log(
            &Record::builder()
                .metadata(record.metadata().clone())
                .args(format_args!("{redacted}"))
                .module_path(record.module_path())
                .file(record.file())
                .line(record.line())
                .build(),
        );
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// A single record kept by [`CapturingLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Keeps every record in memory. Intended for tests.
#[derive(Debug, Default)]
pub struct CapturingLogger {
    records: Mutex<Vec<CapturedRecord>>,
}

impl CapturingLogger {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of all records captured so far.
    #[must_use]
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Messages captured at exactly `level`.
    #[must_use]
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .map(|r| r.message)
            .collect()
    }
}

impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedRecord {
                level: record.level(),
                target: record.target().trim().to_string(),
                message: record.args().to_string(),
            });
    }

    fn flush(&self) {}
}
