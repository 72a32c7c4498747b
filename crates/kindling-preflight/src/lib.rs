mod checker;
mod error;
mod host;
mod steps;

pub use checker::{PreflightChecker, PreflightState, PreflightStep};
pub use error::PreflightError;
pub use host::{
    parse_release, HostRuntime, Identity, PrivilegeControl, ProcessPrivileges, RuntimeProbe,
    MIN_RUNTIME_VERSION,
};
pub use steps::{
    check_home_directory, check_privileges, check_runtime_version, standard_steps, HostChecks,
    STEP_HOME_DIRECTORY, STEP_PRIVILEGES, STEP_RUNTIME_VERSION,
};
