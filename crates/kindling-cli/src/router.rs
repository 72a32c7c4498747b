use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use kindling_core::{Log, LogLevel, RuntimeConfig};

pub(crate) const ARG_DEBUG: &str = "debug";
pub(crate) const ARG_TARGET_PATH: &str = "targetPath";
const TARGET_PATH_SHORT: &str = "-tp";

pub(crate) type Handler = Box<dyn Fn(&Invocation<'_>) -> Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failure,
    Usage,
}

impl Outcome {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Usage => 2,
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        ExitCode::from(outcome.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OptionSpec {
    Positional {
        name: &'static str,
        help: &'static str,
        required: bool,
    },
    Flag {
        name: &'static str,
        short: Option<char>,
        help: &'static str,
    },
    Value {
        name: &'static str,
        short: Option<char>,
        value_name: &'static str,
        help: &'static str,
    },
}

impl OptionSpec {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Positional { name, .. } | Self::Flag { name, .. } | Self::Value { name, .. } => {
                *name
            }
        }
    }

    fn to_arg(&self) -> Arg {
        match self {
            Self::Positional {
                name,
                help,
                required,
            } => Arg::new(*name)
                .value_name(*name)
                .help(*help)
                .required(*required)
                .action(ArgAction::Set),
            Self::Flag { name, short, help } => {
                let arg = Arg::new(*name)
                    .long(*name)
                    .help(*help)
                    .action(ArgAction::SetTrue);
                match short {
                    Some(short) => arg.short(*short),
                    None => arg,
                }
            }
            Self::Value {
                name,
                short,
                value_name,
                help,
            } => {
                let arg = Arg::new(*name)
                    .long(*name)
                    .value_name(*value_name)
                    .help(*help)
                    .action(ArgAction::Set);
                match short {
                    Some(short) => arg.short(*short),
                    None => arg,
                }
            }
        }
    }
}

pub(crate) struct CommandSpec {
    name: &'static str,
    about: &'static str,
    options: Vec<OptionSpec>,
    handler: Handler,
}

impl CommandSpec {
    pub(crate) fn new<F>(name: &'static str, about: &'static str, handler: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<()> + 'static,
    {
        Self {
            name,
            about,
            options: Vec::new(),
            handler: Box::new(handler),
        }
    }

    pub(crate) fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    fn to_command(&self) -> Command {
        self.options
            .iter()
            .fold(Command::new(self.name).about(self.about), |command, option| {
                command.arg(option.to_arg())
            })
    }
}

/// What a command handler receives for one dispatch.
pub(crate) struct Invocation<'a> {
    command: &'a str,
    values: &'a BTreeMap<String, String>,
    flags: &'a BTreeSet<String>,
    config: &'a RuntimeConfig,
    log: &'a dyn Log,
}

impl<'a> Invocation<'a> {
    pub(crate) fn command(&self) -> &str {
        self.command
    }

    pub(crate) fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub(crate) fn values(&self) -> &BTreeMap<String, String> {
        self.values
    }

    pub(crate) fn flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    pub(crate) fn config(&self) -> &RuntimeConfig {
        self.config
    }

    pub(crate) fn log(&self) -> &dyn Log {
        self.log
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MatchedCommand {
    pub(crate) name: String,
    pub(crate) values: BTreeMap<String, String>,
    pub(crate) flags: BTreeSet<String>,
    pub(crate) debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Route {
    Matched(MatchedCommand),
    Unmatched { name: String, debug: bool },
    Help(String),
}

/// Options that must be known before the pipeline starts, read straight from
/// argv wherever they appear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct GlobalOptions {
    pub(crate) debug: bool,
    pub(crate) target_path: Option<PathBuf>,
}

impl GlobalOptions {
    pub(crate) fn scan<S: AsRef<str>>(args: &[S]) -> Self {
        let mut options = Self::default();
        let mut args = args.iter().map(|arg| arg.as_ref());
        while let Some(arg) = args.next() {
            match arg {
                "--" => break,
                "--debug" => options.debug = true,
                "--targetPath" | TARGET_PATH_SHORT => {
                    if let Some(value) = args.next() {
                        options.target_path = Some(PathBuf::from(value));
                    }
                }
                _ => {
                    if let Some(value) = arg.strip_prefix("--targetPath=") {
                        options.target_path = Some(PathBuf::from(value));
                    }
                }
            }
        }
        options
    }
}

pub(crate) struct CommandRouter {
    bin_name: &'static str,
    version: &'static str,
    about: &'static str,
    commands: Vec<CommandSpec>,
}

impl CommandRouter {
    pub(crate) fn new(bin_name: &'static str, version: &'static str, about: &'static str) -> Self {
        Self {
            bin_name,
            version,
            about,
            commands: Vec::new(),
        }
    }

    /// Later registrations under an existing name replace the earlier one.
    pub(crate) fn register(&mut self, spec: CommandSpec) {
        self.commands.retain(|existing| existing.name != spec.name);
        self.commands.push(spec);
    }

    pub(crate) fn command_names(&self) -> Vec<&'static str> {
        self.commands.iter().map(CommandSpec::name).collect()
    }

    fn find(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|spec| spec.name == name)
    }

    fn build_command(&self) -> Command {
        let root = Command::new(self.bin_name)
            .version(self.version)
            .about(self.about)
            .allow_external_subcommands(true)
            .arg(
                Arg::new(ARG_DEBUG)
                    .long(ARG_DEBUG)
                    .help("Enable verbose logging")
                    .action(ArgAction::SetTrue)
                    .global(true),
            )
            .arg(
                Arg::new(ARG_TARGET_PATH)
                    .long(ARG_TARGET_PATH)
                    .value_name("PATH")
                    .help("Target path for commands (-tp for short, overrides CLI_TARGET_PATH)")
                    .action(ArgAction::Set)
                    .global(true),
            );
        self.commands
            .iter()
            .fold(root, |root, spec| root.subcommand(spec.to_command()))
    }

    pub(crate) fn route<S: AsRef<str>>(&self, args: &[S]) -> Result<Route, clap::Error> {
        let mut command = self.build_command();
        let argv = std::iter::once(self.bin_name.to_string())
            .chain(args.iter().map(|arg| normalize_arg(arg.as_ref())));
        let matches = command.try_get_matches_from_mut(argv)?;
        let global_debug = flag_set(&matches, ARG_DEBUG);

        let Some((name, sub_matches)) = matches.subcommand() else {
            return Ok(Route::Help(command.render_help().to_string()));
        };
        let Some(spec) = self.find(name) else {
            return Ok(Route::Unmatched {
                name: name.to_string(),
                debug: global_debug,
            });
        };

        let mut values = BTreeMap::new();
        let mut flags = BTreeSet::new();
        for option in &spec.options {
            let name = option.name();
            match option {
                OptionSpec::Flag { .. } => {
                    if flag_set(sub_matches, name) {
                        flags.insert(name.to_string());
                    }
                }
                OptionSpec::Positional { .. } | OptionSpec::Value { .. } => {
                    if let Ok(Some(value)) = sub_matches.try_get_one::<String>(name) {
                        values.insert(name.to_string(), value.clone());
                    }
                }
            }
        }

        Ok(Route::Matched(MatchedCommand {
            name: name.to_string(),
            values,
            flags,
            debug: global_debug || flag_set(sub_matches, ARG_DEBUG),
        }))
    }

    pub(crate) fn dispatch<S: AsRef<str>>(
        &self,
        args: &[S],
        config: &RuntimeConfig,
        log: &dyn Log,
    ) -> Outcome {
        let route = match self.route(args) {
            Ok(route) => route,
            Err(err) => return report_clap_error(&err, log),
        };

        match route {
            Route::Help(text) => {
                println!("{text}");
                Outcome::Success
            }
            Route::Unmatched { name, debug } => {
                if debug {
                    log.set_level(LogLevel::Verbose);
                }
                log.error(&format!("unknown command: {name}"));
                log.notice(
                    "cli",
                    &format!("available commands: {}", self.command_names().join(", ")),
                );
                Outcome::Failure
            }
            Route::Matched(matched) => {
                if matched.debug {
                    log.set_level(LogLevel::Verbose);
                }
                let Some(spec) = self.find(&matched.name) else {
                    log.error(&format!("unknown command: {}", matched.name));
                    return Outcome::Failure;
                };

                log.verbose(&format!("dispatching {}", matched.name));
                let invocation = Invocation {
                    command: &matched.name,
                    values: &matched.values,
                    flags: &matched.flags,
                    config,
                    log,
                };
                match (spec.handler)(&invocation) {
                    Ok(()) => Outcome::Success,
                    Err(err) => {
                        log.error(&format!("{err:#}"));
                        Outcome::Failure
                    }
                }
            }
        }
    }
}

fn normalize_arg(arg: &str) -> String {
    if arg == TARGET_PATH_SHORT {
        format!("--{ARG_TARGET_PATH}")
    } else {
        arg.to_string()
    }
}

fn flag_set(matches: &ArgMatches, id: &str) -> bool {
    matches!(matches.try_get_one::<bool>(id), Ok(Some(true)))
}

/// Help and version output go to stdout, usage errors to stderr. If that
/// stream is gone the message still reaches the log.
pub(crate) fn report_clap_error(err: &clap::Error, log: &dyn Log) -> Outcome {
    if let Err(io_err) = err.print() {
        log.error(&format!("{}", err.render()));
        log.verbose(&format!("could not print usage output: {io_err}"));
    }
    if err.exit_code() == 0 {
        Outcome::Success
    } else {
        Outcome::Usage
    }
}
