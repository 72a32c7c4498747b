use std::collections::BTreeMap;

use semver::Version;

use crate::error::PreflightError;

/// Oldest kernel the tool supports on this platform. Matches the floor of
/// the Rust standard library for each target.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const MIN_RUNTIME_VERSION: Version = Version::new(3, 2, 0);
/// Darwin 16 is macOS 10.12.
#[cfg(target_os = "macos")]
pub const MIN_RUNTIME_VERSION: Version = Version::new(16, 0, 0);
#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
pub const MIN_RUNTIME_VERSION: Version = Version::new(0, 0, 0);

pub trait RuntimeProbe {
    fn runtime_name(&self) -> &str;

    /// `None` when the platform does not report a comparable version.
    fn runtime_version(&self) -> Option<Version>;
}

/// The host kernel as reported by `uname`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostRuntime;

impl RuntimeProbe for HostRuntime {
    fn runtime_name(&self) -> &str {
        match std::env::consts::OS {
            "linux" | "android" => "Linux kernel",
            "macos" => "Darwin kernel",
            other => other,
        }
    }

    fn runtime_version(&self) -> Option<Version> {
        kernel_release().as_deref().and_then(parse_release)
    }
}

/// Reads the leading numeric part of a kernel release such as
/// `6.8.0-45-generic`. Missing minor or patch components count as zero.
pub fn parse_release(raw: &str) -> Option<Version> {
    let numeric: String = raw
        .trim()
        .chars()
        .take_while(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect();

    let mut parts = numeric
        .split('.')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().ok());
    let major = parts.next()??;
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

#[cfg(unix)]
fn kernel_release() -> Option<String> {
    // SAFETY: `uname` only writes into the zeroed struct we own, and on
    // success `release` holds a NUL-terminated string.
    let mut info: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut info) } != 0 {
        return None;
    }
    let release = unsafe { std::ffi::CStr::from_ptr(info.release.as_ptr()) };
    Some(release.to_string_lossy().into_owned())
}

#[cfg(not(unix))]
fn kernel_release() -> Option<String> {
    None
}

pub trait PrivilegeControl {
    fn is_elevated(&self) -> bool;

    /// Irreversibly switches the process to an unprivileged identity.
    fn drop_privileges(&self) -> Result<(), PreflightError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
}

impl Identity {
    /// First regular account on a fresh install of the host OS.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self { uid: 501, gid: 20 }
        } else {
            Self {
                uid: 1000,
                gid: 1000,
            }
        }
    }
}

/// Privileges of the running process. When started through `sudo`, drops
/// back to the invoking user; otherwise to the platform's default account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessPrivileges {
    target: Identity,
}

impl ProcessPrivileges {
    pub fn new(target: Identity) -> Self {
        Self { target }
    }

    pub fn from_env(env: &BTreeMap<String, String>) -> Self {
        let read_id = |key: &str| {
            env.get(key)
                .and_then(|value| value.trim().parse::<u32>().ok())
                .filter(|id| *id != 0)
        };

        let fallback = Identity::platform_default();
        let uid = read_id("SUDO_UID").unwrap_or(fallback.uid);
        let gid = read_id("SUDO_GID").unwrap_or(fallback.gid);
        Self::new(Identity { uid, gid })
    }

    pub fn target(&self) -> Identity {
        self.target
    }
}

#[cfg(unix)]
impl PrivilegeControl for ProcessPrivileges {
    fn is_elevated(&self) -> bool {
        // SAFETY: geteuid has no preconditions.
        unsafe { libc::geteuid() == 0 }
    }

    fn drop_privileges(&self) -> Result<(), PreflightError> {
        let Identity { uid, gid } = self.target;

        // Groups first: once the uid changes we can no longer touch them.
        // SAFETY: an empty supplementary group list needs no valid pointer.
        if unsafe { libc::setgroups(0, std::ptr::null()) } != 0 {
            return Err(os_failure("setgroups"));
        }
        // SAFETY: plain syscalls on the current process.
        if unsafe { libc::setgid(gid as libc::gid_t) } != 0 {
            return Err(os_failure("setgid"));
        }
        if unsafe { libc::setuid(uid as libc::uid_t) } != 0 {
            return Err(os_failure("setuid"));
        }

        if self.is_elevated() {
            return Err(PreflightError::PrivilegeDrop {
                message: format!("still running as root after switching to uid {uid}"),
            });
        }
        Ok(())
    }
}

#[cfg(not(unix))]
impl PrivilegeControl for ProcessPrivileges {
    fn is_elevated(&self) -> bool {
        false
    }

    fn drop_privileges(&self) -> Result<(), PreflightError> {
        Ok(())
    }
}

#[cfg(unix)]
fn os_failure(call: &str) -> PreflightError {
    PreflightError::PrivilegeDrop {
        message: format!("{call} failed: {}", std::io::Error::last_os_error()),
    }
}
