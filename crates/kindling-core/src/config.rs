use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::dotfile::{read_dotfile, DOTFILE_NAME};
use crate::error::ConfigError;
use crate::log::LogLevel;
use crate::probe::PathProbe;

pub const DEFAULT_CLI_HOME: &str = ".kindling";

pub const ENV_CLI_HOME: &str = "CLI_HOME";
pub const ENV_CLI_HOME_PATH: &str = "CLI_HOME_PATH";
pub const ENV_CLI_DEBUG: &str = "CLI_DEBUG";
pub const ENV_CLI_TARGET_PATH: &str = "CLI_TARGET_PATH";
pub const ENV_CLI_REGISTRY: &str = "CLI_REGISTRY";
pub const ENV_NO_UPDATE_CHECK: &str = "CLI_NO_UPDATE_CHECK";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Configuration resolved once per invocation. Read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    home_dir: PathBuf,
    data_dir: PathBuf,
    debug: bool,
    target_path: Option<PathBuf>,
    registry_url: Option<String>,
    update_check: bool,
}

impl RuntimeConfig {
    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn target_path(&self) -> Option<&Path> {
        self.target_path.as_deref()
    }

    pub fn registry_url(&self) -> Option<&str> {
        self.registry_url.as_deref()
    }

    pub fn update_check(&self) -> bool {
        self.update_check
    }

    pub fn log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Verbose
        } else {
            LogLevel::Info
        }
    }

    /// Variables handed down to child processes and external collaborators.
    pub fn exported_vars(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            (ENV_CLI_HOME_PATH, self.data_dir.display().to_string()),
            (ENV_LOG_LEVEL, self.log_level().as_str().to_string()),
        ];
        if let Some(target_path) = &self.target_path {
            vars.push((ENV_CLI_TARGET_PATH, target_path.display().to_string()));
        }
        vars
    }
}

/// Values taken from the command line, which outrank every other source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub debug: bool,
    pub target_path: Option<PathBuf>,
}

/// Layers command-line values, the live environment, `<home>/.env` and
/// built-in defaults into a [`RuntimeConfig`], in that order of precedence.
pub struct EnvironmentResolver<'a> {
    paths: &'a dyn PathProbe,
    overrides: CliOverrides,
}

impl<'a> EnvironmentResolver<'a> {
    pub fn new(paths: &'a dyn PathProbe) -> Self {
        Self {
            paths,
            overrides: CliOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: CliOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn resolve(
        &self,
        env: &BTreeMap<String, String>,
        user_home: &Path,
    ) -> Result<RuntimeConfig, ConfigError> {
        if !self.paths.is_accessible_dir(user_home) {
            return Err(ConfigError::HomeDirUnavailable {
                path: user_home.to_path_buf(),
            });
        }

        let effective = self.effective_environment(env, user_home)?;
        let lookup = |key: &str| {
            effective
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let data_dir = join_under(user_home, lookup(ENV_CLI_HOME).unwrap_or(DEFAULT_CLI_HOME));
        let debug = self.overrides.debug || lookup(ENV_CLI_DEBUG).is_some_and(is_truthy);
        let target_path = self
            .overrides
            .target_path
            .clone()
            .or_else(|| lookup(ENV_CLI_TARGET_PATH).map(PathBuf::from));

        Ok(RuntimeConfig {
            home_dir: user_home.to_path_buf(),
            data_dir,
            debug,
            target_path,
            registry_url: lookup(ENV_CLI_REGISTRY).map(str::to_string),
            update_check: !lookup(ENV_NO_UPDATE_CHECK).is_some_and(is_truthy),
        })
    }

    fn effective_environment(
        &self,
        env: &BTreeMap<String, String>,
        user_home: &Path,
    ) -> Result<BTreeMap<String, String>, ConfigError> {
        let dotfile_path = user_home.join(DOTFILE_NAME);
        if !self.paths.exists(&dotfile_path) {
            return Ok(env.clone());
        }

        let mut effective = read_dotfile(&dotfile_path)?;
        effective.extend(env.iter().map(|(key, value)| (key.clone(), value.clone())));
        Ok(effective)
    }
}

/// Snapshot of the process environment. Entries that are not valid UTF-8
/// are skipped.
pub fn live_environment() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

pub fn user_home_dir(env: &BTreeMap<String, String>) -> Option<PathBuf> {
    let key = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    env.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Joins `relative` below `base`. Roots, prefixes and `..` in `relative` are
/// dropped, so the result never leaves `base`.
fn join_under(base: &Path, relative: &str) -> PathBuf {
    let mut joined = base.to_path_buf();
    for component in Path::new(relative).components() {
        if let Component::Normal(part) = component {
            joined.push(part);
        }
    }
    if joined == base {
        joined.push(DEFAULT_CLI_HOME);
    }
    joined
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
