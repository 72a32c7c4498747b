mod config;
mod dotfile;
mod error;
mod log;
mod probe;

pub use config::{
    live_environment, user_home_dir, CliOverrides, EnvironmentResolver, RuntimeConfig,
    DEFAULT_CLI_HOME, ENV_CLI_DEBUG, ENV_CLI_HOME, ENV_CLI_HOME_PATH, ENV_CLI_REGISTRY,
    ENV_CLI_TARGET_PATH, ENV_LOG_LEVEL, ENV_NO_UPDATE_CHECK,
};
pub use dotfile::{read_dotfile, DOTFILE_NAME};
pub use error::ConfigError;
pub use log::{Log, LogLevel};
pub use probe::{LocalPaths, PathProbe};
