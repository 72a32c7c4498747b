use std::collections::BTreeMap;

use kindling_core::{
    user_home_dir, CliOverrides, EnvironmentResolver, Log, LogLevel, PathProbe, RuntimeConfig,
};
use kindling_preflight::{standard_steps, HostChecks, PreflightChecker, PrivilegeControl, RuntimeProbe};
use kindling_registry::MetadataSource;
use semver::Version;

use crate::advisor::UpdateAdvisor;
use crate::commands::init_command;
use crate::router::{CommandRouter, GlobalOptions, Outcome};

pub(crate) const BIN_NAME: &str = "kindling";
pub(crate) const PACKAGE_NAME: &str = "kindling";
pub(crate) const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

type SourceFactory<'a> = Box<dyn Fn(&RuntimeConfig) -> Box<dyn MetadataSource> + 'a>;
type ExportFn<'a> = Box<dyn Fn(&str, &str) + 'a>;

/// Everything the pipeline reads from or writes to outside the process.
pub(crate) struct Host<'a> {
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) runtime: &'a dyn RuntimeProbe,
    pub(crate) minimum_runtime: Version,
    pub(crate) privileges: &'a dyn PrivilegeControl,
    pub(crate) paths: &'a dyn PathProbe,
    pub(crate) metadata_source: SourceFactory<'a>,
    pub(crate) export: ExportFn<'a>,
}

pub(crate) struct Bootstrapper<'a> {
    host: Host<'a>,
    router: CommandRouter,
    log: &'a dyn Log,
    package: &'static str,
    version: &'static str,
}

impl<'a> Bootstrapper<'a> {
    pub(crate) fn new(host: Host<'a>, router: CommandRouter, log: &'a dyn Log) -> Self {
        Self {
            host,
            router,
            log,
            package: PACKAGE_NAME,
            version: CURRENT_VERSION,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    /// Preflight, configuration, update advice, then dispatch. The first two
    /// are fatal; the update check never is.
    pub(crate) fn run<S: AsRef<str>>(&self, args: &[S]) -> Outcome {
        let globals = GlobalOptions::scan(args);
        if globals.debug {
            self.log.set_level(LogLevel::Verbose);
        }
        self.log
            .verbose(&format!("{} {}", self.package, self.version));

        let home_dir = user_home_dir(&self.host.env);
        let mut preflight = PreflightChecker::new(standard_steps(HostChecks {
            runtime: self.host.runtime,
            minimum_runtime: self.host.minimum_runtime.clone(),
            privileges: self.host.privileges,
            paths: self.host.paths,
            home_dir: home_dir.as_deref(),
        }));
        if let Err(err) = preflight.run() {
            self.log.error(&err.to_string());
            return Outcome::Failure;
        }
        // Preflight has already rejected a missing home directory.
        let Some(home_dir) = home_dir.as_deref() else {
            return Outcome::Failure;
        };

        let resolver = EnvironmentResolver::new(self.host.paths).with_overrides(CliOverrides {
            debug: globals.debug,
            target_path: globals.target_path,
        });
        let config = match resolver.resolve(&self.host.env, home_dir) {
            Ok(config) => config,
            Err(err) => {
                self.log.error(&err.to_string());
                return Outcome::Failure;
            }
        };
        if config.debug() {
            self.log.set_level(LogLevel::Verbose);
        }
        self.log
            .verbose(&format!("data directory {}", config.data_dir().display()));
        for (key, value) in config.exported_vars() {
            (self.host.export)(key, &value);
        }

        if config.update_check() {
            let source = (self.host.metadata_source)(&config);
            UpdateAdvisor::new(source.as_ref(), self.log)
                .check_for_update(self.version, self.package);
        } else {
            self.log.verbose("update check disabled");
        }

        self.router.dispatch(args, &config, self.log)
    }
}

pub(crate) fn default_router() -> CommandRouter {
    let mut router = CommandRouter::new(
        BIN_NAME,
        CURRENT_VERSION,
        "Bootstrap, check for updates and dispatch project commands",
    );
    router.register(init_command());
    router
}
