use kindling_core::Log;
use kindling_registry::MetadataSource;
use kindling_resolver::resolve_latest_compatible;
use semver::Version;

/// Tells the user about a newer compatible release. Never installs one, and
/// never fails: an unreachable registry just means no advice.
pub(crate) struct UpdateAdvisor<'a> {
    source: &'a dyn MetadataSource,
    log: &'a dyn Log,
}

impl<'a> UpdateAdvisor<'a> {
    pub(crate) fn new(source: &'a dyn MetadataSource, log: &'a dyn Log) -> Self {
        Self { source, log }
    }

    pub(crate) fn check_for_update(&self, current_version: &str, package: &str) -> Option<Version> {
        self.log.verbose(&format!(
            "checking {} for {package} updates",
            self.source.location()
        ));
        let metadata = match self.source.fetch_metadata(package) {
            Ok(metadata) => metadata,
            Err(err) if err.is_network_error() => {
                self.log
                    .verbose(&format!("update check skipped, registry unreachable: {err}"));
                return None;
            }
            Err(err) => {
                self.log.verbose(&format!("update check skipped: {err}"));
                return None;
            }
        };

        let Some(latest) = resolve_latest_compatible(current_version, metadata.version_strs())
        else {
            self.log
                .verbose(&format!("{package} {current_version} is up to date"));
            return None;
        };

        self.log.warn(
            "update",
            &format!(
                "{package} {latest} is available (current {current_version}); upgrade manually with `{}`",
                upgrade_command(package)
            ),
        );
        Some(latest)
    }
}

pub(crate) fn upgrade_command(package: &str) -> String {
    format!("cargo install {package} --locked")
}
