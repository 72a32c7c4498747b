use std::path::Path;

use kindling_core::PathProbe;
use semver::Version;
use tracing::{debug, info};

use crate::checker::PreflightStep;
use crate::error::PreflightError;
use crate::host::{PrivilegeControl, RuntimeProbe};

pub const STEP_RUNTIME_VERSION: &str = "runtime-version";
pub const STEP_PRIVILEGES: &str = "privileges";
pub const STEP_HOME_DIRECTORY: &str = "home-directory";

/// Everything the standard preflight steps consult.
pub struct HostChecks<'a> {
    pub runtime: &'a dyn RuntimeProbe,
    pub minimum_runtime: Version,
    pub privileges: &'a dyn PrivilegeControl,
    pub paths: &'a dyn PathProbe,
    pub home_dir: Option<&'a Path>,
}

/// Runtime floor, then privilege de-escalation, then the home directory.
pub fn standard_steps(host: HostChecks<'_>) -> Vec<PreflightStep<'_>> {
    let HostChecks {
        runtime,
        minimum_runtime,
        privileges,
        paths,
        home_dir,
    } = host;

    vec![
        PreflightStep::new(STEP_RUNTIME_VERSION, move || {
            check_runtime_version(runtime, &minimum_runtime)
        }),
        PreflightStep::new(STEP_PRIVILEGES, move || check_privileges(privileges)),
        PreflightStep::new(STEP_HOME_DIRECTORY, move || {
            check_home_directory(paths, home_dir)
        }),
    ]
}

pub fn check_runtime_version(
    probe: &dyn RuntimeProbe,
    minimum: &Version,
) -> Result<(), PreflightError> {
    let Some(found) = probe.runtime_version() else {
        debug!(runtime = probe.runtime_name(), "runtime version unavailable; skipping floor");
        return Ok(());
    };

    if found < *minimum {
        return Err(PreflightError::UnsupportedRuntime {
            runtime: probe.runtime_name().to_string(),
            found,
            minimum: minimum.clone(),
        });
    }
    debug!(runtime = probe.runtime_name(), %found, %minimum, "runtime version accepted");
    Ok(())
}

pub fn check_privileges(control: &dyn PrivilegeControl) -> Result<(), PreflightError> {
    if !control.is_elevated() {
        return Ok(());
    }
    control.drop_privileges()?;
    info!("dropped elevated privileges before running commands");
    Ok(())
}

pub fn check_home_directory(
    paths: &dyn PathProbe,
    home_dir: Option<&Path>,
) -> Result<(), PreflightError> {
    match home_dir {
        Some(home) if paths.is_accessible_dir(home) => Ok(()),
        Some(home) => Err(PreflightError::MissingHomeDir {
            path: Some(home.to_path_buf()),
        }),
        None => Err(PreflightError::MissingHomeDir { path: None }),
    }
}
