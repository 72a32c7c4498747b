use std::fmt;

/// Verbosity of the logging collaborator, quietest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Verbose => "verbose",
        }
    }

    pub fn from_str_loose(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" | "notice" => Some(Self::Info),
            "verbose" | "debug" | "trace" => Some(Self::Verbose),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The logging surface the bootstrap pipeline writes through.
///
/// Implementations own formatting and the output sink; `set_level` takes
/// `&self` because the level is raised mid-invocation once `--debug` is seen.
pub trait Log {
    fn notice(&self, tag: &str, message: &str);
    fn warn(&self, tag: &str, message: &str);
    fn error(&self, message: &str);
    fn verbose(&self, message: &str);
    fn set_level(&self, level: LogLevel);
    fn level(&self) -> LogLevel;
}
