mod advisor;
mod bootstrap;
mod commands;
mod logging;
mod render;
mod router;

use std::process::ExitCode;

use kindling_core::{live_environment, LocalPaths, RuntimeConfig};
use kindling_preflight::{HostRuntime, ProcessPrivileges, MIN_RUNTIME_VERSION};
use kindling_registry::{MetadataSource, RegistryClient};

use crate::bootstrap::{default_router, Bootstrapper, Host};
use crate::logging::TerminalLog;
use crate::render::current_output_style;

fn main() -> ExitCode {
    let log = TerminalLog::install(current_output_style());
    let env = live_environment();
    let privileges = ProcessPrivileges::from_env(&env);

    let host = Host {
        env,
        runtime: &HostRuntime,
        minimum_runtime: MIN_RUNTIME_VERSION,
        privileges: &privileges,
        paths: &LocalPaths,
        metadata_source: Box::new(|config: &RuntimeConfig| {
            let client = RegistryClient::from_setting(config.registry_url());
            Box::new(client) as Box<dyn MetadataSource>
        }),
        export: Box::new(|key: &str, value: &str| std::env::set_var(key, value)),
    };

    let args: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    let outcome = Bootstrapper::new(host, default_router(), &log).run(&args);
    outcome.into()
}

#[cfg(test)]
mod tests;
