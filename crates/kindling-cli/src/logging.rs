use std::cell::Cell;

use kindling_core::{Log, LogLevel};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, Registry};

use crate::render::{render_status_line, OutputStyle};

/// Status lines on stderr for the pipeline, plus a `tracing` subscriber for
/// diagnostics from the library crates. Both follow the same level.
pub(crate) struct TerminalLog {
    style: OutputStyle,
    level: Cell<LogLevel>,
    diagnostics: Option<reload::Handle<LevelFilter, Registry>>,
}

impl TerminalLog {
    pub(crate) fn install(style: OutputStyle) -> Self {
        let (filter, handle) = reload::Layer::new(level_filter(LogLevel::default()));
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(style == OutputStyle::Rich)
                    .with_target(false)
                    .without_time(),
            )
            .try_init()
            .is_ok();

        Self::new(style, installed.then_some(handle))
    }

    pub(crate) fn new(
        style: OutputStyle,
        diagnostics: Option<reload::Handle<LevelFilter, Registry>>,
    ) -> Self {
        Self {
            style,
            level: Cell::new(LogLevel::default()),
            diagnostics,
        }
    }

    fn emit(&self, at: LogLevel, status: &str, message: &str) {
        if at <= self.level.get() {
            eprintln!("{}", render_status_line(self.style, status, message));
        }
    }
}

impl Log for TerminalLog {
    fn notice(&self, tag: &str, message: &str) {
        self.emit(LogLevel::Info, "notice", &format!("{tag} {message}"));
    }

    fn warn(&self, tag: &str, message: &str) {
        self.emit(LogLevel::Warn, "warn", &format!("{tag} {message}"));
    }

    fn error(&self, message: &str) {
        self.emit(LogLevel::Error, "error", message);
    }

    fn verbose(&self, message: &str) {
        self.emit(LogLevel::Verbose, "verbose", message);
    }

    fn set_level(&self, level: LogLevel) {
        self.level.set(level);
        if let Some(handle) = &self.diagnostics {
            if let Err(err) = apply_level(handle, level) {
                self.emit(
                    LogLevel::Verbose,
                    "verbose",
                    &format!("diagnostics stay at their previous level: {err}"),
                );
            }
        }
    }

    fn level(&self) -> LogLevel {
        self.level.get()
    }
}

/// Fails once the subscriber owning the filter has been dropped.
pub(crate) fn apply_level(
    handle: &reload::Handle<LevelFilter, Registry>,
    level: LogLevel,
) -> Result<(), reload::Error> {
    handle.modify(|filter| *filter = level_filter(level))
}

pub(crate) fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Verbose => LevelFilter::DEBUG,
    }
}
