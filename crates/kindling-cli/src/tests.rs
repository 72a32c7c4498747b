use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use kindling_core::{Log, LogLevel, PathProbe, RuntimeConfig};
use kindling_preflight::{PreflightError, PrivilegeControl, RuntimeProbe};
use kindling_registry::{MetadataSource, RegistryError, RegistryMetadata};
use semver::Version;

use crate::advisor::{upgrade_command, UpdateAdvisor};
use crate::bootstrap::{default_router, Bootstrapper, Host};
use crate::commands::{INIT_FORCE, INIT_PROJECT_NAME, INIT_TEMPLATE};
use crate::logging::{apply_level, level_filter, TerminalLog};
use crate::render::{render_status_line, OutputStyle};
use crate::router::{
    report_clap_error, CommandRouter, CommandSpec, GlobalOptions, OptionSpec, Outcome, Route,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Notice(String, String),
    Warn(String, String),
    Error(String),
    Verbose(String),
}

#[derive(Default)]
struct RecordingLog {
    entries: RefCell<Vec<Entry>>,
    level: Cell<LogLevel>,
}

impl RecordingLog {
    fn errors(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                Entry::Error(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn warnings(&self) -> Vec<(String, String)> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                Entry::Warn(tag, message) => Some((tag.clone(), message.clone())),
                _ => None,
            })
            .collect()
    }

    fn contains_notice(&self, tag: &str, needle: &str) -> bool {
        self.entries.borrow().iter().any(|entry| {
            matches!(entry, Entry::Notice(t, message) if t == tag && message.contains(needle))
        })
    }

    fn contains_verbose(&self, needle: &str) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|entry| matches!(entry, Entry::Verbose(message) if message.contains(needle)))
    }
}

impl Log for RecordingLog {
    fn notice(&self, tag: &str, message: &str) {
        self.entries
            .borrow_mut()
            .push(Entry::Notice(tag.to_string(), message.to_string()));
    }

    fn warn(&self, tag: &str, message: &str) {
        self.entries
            .borrow_mut()
            .push(Entry::Warn(tag.to_string(), message.to_string()));
    }

    fn error(&self, message: &str) {
        self.entries
            .borrow_mut()
            .push(Entry::Error(message.to_string()));
    }

    fn verbose(&self, message: &str) {
        self.entries
            .borrow_mut()
            .push(Entry::Verbose(message.to_string()));
    }

    fn set_level(&self, level: LogLevel) {
        self.level.set(level);
    }

    fn level(&self) -> LogLevel {
        self.level.get()
    }
}

struct FakeSource {
    versions: Option<Vec<&'static str>>,
    fetches: Rc<Cell<usize>>,
}

impl FakeSource {
    fn with_versions(versions: &[&'static str]) -> Self {
        Self {
            versions: Some(versions.to_vec()),
            fetches: Rc::new(Cell::new(0)),
        }
    }

    fn unreachable() -> Self {
        Self {
            versions: None,
            fetches: Rc::new(Cell::new(0)),
        }
    }
}

impl MetadataSource for FakeSource {
    fn fetch_metadata(&self, package: &str) -> Result<RegistryMetadata, RegistryError> {
        self.fetches.set(self.fetches.get() + 1);
        match &self.versions {
            Some(versions) => Ok(RegistryMetadata {
                versions: versions.iter().map(|version| version.to_string()).collect(),
            }),
            None => Err(RegistryError::Transport {
                url: format!("http://127.0.0.1:9/{package}"),
                message: "connection refused".to_string(),
            }),
        }
    }

    fn location(&self) -> &str {
        "http://127.0.0.1:9"
    }
}

struct FixedRuntime(&'static str);

impl RuntimeProbe for FixedRuntime {
    fn runtime_name(&self) -> &str {
        "Test kernel"
    }

    fn runtime_version(&self) -> Option<Version> {
        Version::parse(self.0).ok()
    }
}

struct Unprivileged;

impl PrivilegeControl for Unprivileged {
    fn is_elevated(&self) -> bool {
        false
    }

    fn drop_privileges(&self) -> Result<(), PreflightError> {
        Ok(())
    }
}

struct FakePaths(Vec<PathBuf>);

impl PathProbe for FakePaths {
    fn exists(&self, _path: &Path) -> bool {
        false
    }

    fn is_accessible_dir(&self, path: &Path) -> bool {
        self.0.iter().any(|dir| dir == path)
    }
}

fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn home_env() -> BTreeMap<String, String> {
    let key = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    env(&[(key, "/home/dev")])
}

fn test_config() -> RuntimeConfig {
    let paths = FakePaths(vec![PathBuf::from("/home/dev")]);
    kindling_core::EnvironmentResolver::new(&paths)
        .resolve(&BTreeMap::new(), Path::new("/home/dev"))
        .expect("must resolve test config")
}

fn router_with(names: &[&'static str]) -> CommandRouter {
    let mut router = CommandRouter::new("kindling", "1.2.3", "test router");
    for name in names {
        router.register(CommandSpec::new(*name, "test command", |_| Ok(())));
    }
    router
}

fn host<'a>(
    env: BTreeMap<String, String>,
    runtime: &'a FixedRuntime,
    paths: &'a FakePaths,
    source: impl Fn() -> FakeSource + 'a,
    exported: &'a RefCell<Vec<(String, String)>>,
) -> Host<'a> {
    Host {
        env,
        runtime,
        minimum_runtime: Version::new(3, 2, 0),
        privileges: &Unprivileged,
        paths,
        metadata_source: Box::new(move |_config: &RuntimeConfig| {
            Box::new(source()) as Box<dyn MetadataSource>
        }),
        export: Box::new(move |key: &str, value: &str| {
            exported
                .borrow_mut()
                .push((key.to_string(), value.to_string()))
        }),
    }
}

#[test]
fn unknown_command_lists_registered_commands() {
    let router = router_with(&["init"]);
    let log = RecordingLog::default();

    let outcome = router.dispatch(&["frob"], &test_config(), &log);

    assert_eq!(outcome, Outcome::Failure);
    assert_ne!(outcome.code(), 0);
    assert_eq!(log.errors(), vec!["unknown command: frob".to_string()]);
    assert!(log.contains_notice("cli", "init"));
}

#[test]
fn unknown_command_routes_as_unmatched() {
    let router = router_with(&["init", "build"]);
    let route = router.route(&["frob", "--x"]).expect("external names must route");
    assert_eq!(
        route,
        Route::Unmatched {
            name: "frob".to_string(),
            debug: false
        }
    );
}

#[test]
fn no_subcommand_shows_help_and_succeeds() {
    let router = router_with(&["init"]);
    let empty: [&str; 0] = [];

    match router.route(&empty).expect("empty argv must route") {
        Route::Help(text) => assert!(text.contains("init"), "help must list commands: {text}"),
        other => panic!("unexpected route: {other:?}"),
    }
    assert_eq!(
        router.dispatch(&empty, &test_config(), &RecordingLog::default()),
        Outcome::Success
    );
}

#[test]
fn version_flag_exits_zero() {
    let router = router_with(&["init"]);
    let err = router
        .route(&["--version"])
        .expect_err("--version is reported through clap");
    assert_eq!(err.exit_code(), 0);
    assert_eq!(
        router.dispatch(&["--version"], &test_config(), &RecordingLog::default()),
        Outcome::Success
    );
}

#[test]
fn bad_option_is_a_usage_error() {
    let router = default_router();
    let log = RecordingLog::default();

    let outcome = router.dispatch(&["init", "--bogus"], &test_config(), &log);
    assert_eq!(outcome, Outcome::Usage);
    assert_eq!(outcome.code(), 2);
}

#[test]
fn registering_same_name_replaces_handler() {
    let mut router = router_with(&["init"]);
    let calls = Rc::new(Cell::new(0));
    let seen = Rc::clone(&calls);
    router.register(CommandSpec::new("init", "replacement", move |_| {
        seen.set(seen.get() + 1);
        Ok(())
    }));

    assert_eq!(router.command_names(), vec!["init"]);
    router.dispatch(&["init"], &test_config(), &RecordingLog::default());
    assert_eq!(calls.get(), 1);
}

#[test]
fn handler_error_is_reported_as_one_line() {
    let mut router = CommandRouter::new("kindling", "1.2.3", "test router");
    router.register(CommandSpec::new("build", "fails", |_| {
        Err(anyhow::anyhow!("nothing to build"))
    }));
    let log = RecordingLog::default();

    let outcome = router.dispatch(&["build"], &test_config(), &log);
    assert_eq!(outcome, Outcome::Failure);
    assert_eq!(log.errors(), vec!["nothing to build".to_string()]);
}

#[test]
fn init_options_reach_the_matched_route() {
    let router = default_router();
    let route = router
        .route(&["init", "demo", "-f", "--template", "web", "-tp", "/work"])
        .expect("init must parse");

    let Route::Matched(matched) = route else {
        panic!("init must match");
    };
    assert_eq!(matched.name, "init");
    assert_eq!(
        matched.values.get(INIT_PROJECT_NAME).map(String::as_str),
        Some("demo")
    );
    assert_eq!(
        matched.values.get(INIT_TEMPLATE).map(String::as_str),
        Some("web")
    );
    assert!(matched.flags.contains(INIT_FORCE));
    assert!(!matched.debug);
}

#[test]
fn debug_after_subcommand_raises_verbosity() {
    let router = default_router();
    let log = RecordingLog::default();

    let outcome = router.dispatch(&["init", "demo", "--debug"], &test_config(), &log);
    assert_eq!(outcome, Outcome::Success);
    assert_eq!(log.level(), LogLevel::Verbose);
    assert!(log.contains_notice("init", "project demo"));
}

#[test]
fn global_options_scan_handles_all_spellings() {
    assert_eq!(
        GlobalOptions::scan(&["-tp", "/a", "init"]).target_path,
        Some(PathBuf::from("/a"))
    );
    assert_eq!(
        GlobalOptions::scan(&["init", "--targetPath=/b"]).target_path,
        Some(PathBuf::from("/b"))
    );
    let scanned = GlobalOptions::scan(&["init", "--debug", "--targetPath", "/c"]);
    assert!(scanned.debug);
    assert_eq!(scanned.target_path, Some(PathBuf::from("/c")));

    let after_separator = GlobalOptions::scan(&["init", "--", "--debug"]);
    assert!(!after_separator.debug);
}

#[test]
fn advisor_swallows_registry_failures() {
    let source = FakeSource::unreachable();
    let log = RecordingLog::default();

    let found = UpdateAdvisor::new(&source, &log).check_for_update("1.2.3", "kindling");

    assert_eq!(found, None);
    assert_eq!(source.fetches.get(), 1);
    assert!(log.warnings().is_empty());
    assert!(log.errors().is_empty());
    assert!(log.contains_verbose("checking http://127.0.0.1:9 for kindling updates"));
    assert!(log.contains_verbose("update check skipped, registry unreachable"));
}

#[test]
fn advisor_warns_about_newer_compatible_release() {
    let source = FakeSource::with_versions(&["1.2.0", "1.2.3", "1.2.4", "1.3.5", "2.0.0"]);
    let log = RecordingLog::default();

    let found = UpdateAdvisor::new(&source, &log).check_for_update("1.2.3", "kindling");

    assert_eq!(found, Some(Version::new(1, 3, 5)));
    let warnings = log.warnings();
    assert_eq!(warnings.len(), 1);
    let (tag, message) = &warnings[0];
    assert_eq!(tag, "update");
    assert!(message.contains("kindling 1.3.5 is available (current 1.2.3)"));
    assert!(message.contains(&upgrade_command("kindling")));
}

#[test]
fn advisor_is_quiet_when_up_to_date() {
    let source = FakeSource::with_versions(&["1.0.0", "1.2.3", "2.0.0"]);
    let log = RecordingLog::default();

    assert_eq!(
        UpdateAdvisor::new(&source, &log).check_for_update("1.2.3", "kindling"),
        None
    );
    assert!(log.warnings().is_empty());
}

#[test]
fn bootstrap_runs_handler_with_debug_and_options() {
    let runtime = FixedRuntime("6.8.0");
    let paths = FakePaths(vec![PathBuf::from("/home/dev")]);
    let exported = RefCell::new(Vec::new());
    let log = RecordingLog::default();

    let seen_level = Rc::new(Cell::new(LogLevel::Error));
    let seen_project = Rc::new(RefCell::new(None));
    let mut router = CommandRouter::new("kindling", "1.2.3", "test router");
    {
        let seen_level = Rc::clone(&seen_level);
        let seen_project = Rc::clone(&seen_project);
        router.register(
            CommandSpec::new("init", "records", move |invocation| {
                seen_level.set(invocation.log().level());
                *seen_project.borrow_mut() =
                    invocation.value(INIT_PROJECT_NAME).map(str::to_string);
                Ok(())
            })
            .option(OptionSpec::Positional {
                name: INIT_PROJECT_NAME,
                help: "project",
                required: false,
            }),
        );
    }

    let bootstrapper = Bootstrapper::new(
        host(
            home_env(),
            &runtime,
            &paths,
            || FakeSource::with_versions(&["1.2.3"]),
            &exported,
        ),
        router,
        &log,
    )
    .with_version("1.2.3");

    let outcome = bootstrapper.run(&["--debug", "init", "myproj"]);

    assert_eq!(outcome, Outcome::Success);
    assert_eq!(seen_level.get(), LogLevel::Verbose);
    assert_eq!(seen_project.borrow().as_deref(), Some("myproj"));
    assert!(log.errors().is_empty());
}

#[test]
fn preflight_failure_reports_one_line_and_skips_dispatch() {
    let runtime = FixedRuntime("2.6.32");
    let paths = FakePaths(vec![PathBuf::from("/home/dev")]);
    let exported = RefCell::new(Vec::new());
    let log = RecordingLog::default();
    let fetches = Rc::new(Cell::new(0));

    let calls = Rc::new(Cell::new(0));
    let mut router = CommandRouter::new("kindling", "1.2.3", "test router");
    {
        let calls = Rc::clone(&calls);
        router.register(CommandSpec::new("init", "counts", move |_| {
            calls.set(calls.get() + 1);
            Ok(())
        }));
    }

    let source_fetches = Rc::clone(&fetches);
    let bootstrapper = Bootstrapper::new(
        host(
            home_env(),
            &runtime,
            &paths,
            move || FakeSource {
                versions: Some(vec!["9.9.9"]),
                fetches: Rc::clone(&source_fetches),
            },
            &exported,
        ),
        router,
        &log,
    );

    let outcome = bootstrapper.run(&["init"]);

    assert_eq!(outcome, Outcome::Failure);
    assert_eq!(
        log.errors(),
        vec!["Test kernel 2.6.32 is not supported; version 3.2.0 or newer is required".to_string()]
    );
    assert_eq!(calls.get(), 0);
    assert_eq!(fetches.get(), 0);
    assert!(exported.borrow().is_empty());
}

#[test]
fn missing_home_directory_stops_before_configuration() {
    let runtime = FixedRuntime("6.8.0");
    let paths = FakePaths(Vec::new());
    let exported = RefCell::new(Vec::new());
    let log = RecordingLog::default();

    let bootstrapper = Bootstrapper::new(
        host(
            home_env(),
            &runtime,
            &paths,
            || FakeSource::with_versions(&[]),
            &exported,
        ),
        default_router(),
        &log,
    );

    assert_eq!(bootstrapper.run(&["init"]), Outcome::Failure);
    assert_eq!(
        log.errors(),
        vec!["user home directory /home/dev does not exist".to_string()]
    );
}

#[test]
fn registry_failure_does_not_fail_the_run() {
    let runtime = FixedRuntime("6.8.0");
    let paths = FakePaths(vec![PathBuf::from("/home/dev")]);
    let exported = RefCell::new(Vec::new());
    let log = RecordingLog::default();

    let bootstrapper = Bootstrapper::new(
        host(
            home_env(),
            &runtime,
            &paths,
            FakeSource::unreachable,
            &exported,
        ),
        default_router(),
        &log,
    )
    .with_version("1.2.3");

    assert_eq!(bootstrapper.run(&["init", "demo"]), Outcome::Success);
    assert!(log.errors().is_empty());
    assert!(log.warnings().is_empty());
    assert!(log.contains_notice("init", "project demo"));
}

#[test]
fn update_check_can_be_disabled() {
    let runtime = FixedRuntime("6.8.0");
    let paths = FakePaths(vec![PathBuf::from("/home/dev")]);
    let exported = RefCell::new(Vec::new());
    let log = RecordingLog::default();
    let fetches = Rc::new(Cell::new(0));

    let mut live = home_env();
    live.insert("CLI_NO_UPDATE_CHECK".to_string(), "1".to_string());
    let source_fetches = Rc::clone(&fetches);
    let bootstrapper = Bootstrapper::new(
        host(
            live,
            &runtime,
            &paths,
            move || FakeSource {
                versions: Some(vec!["1.9.0"]),
                fetches: Rc::clone(&source_fetches),
            },
            &exported,
        ),
        default_router(),
        &log,
    )
    .with_version("1.2.3");

    assert_eq!(bootstrapper.run(&["init"]), Outcome::Success);
    assert_eq!(fetches.get(), 0);
    assert!(log.warnings().is_empty());
}

#[test]
fn resolved_config_is_exported() {
    let runtime = FixedRuntime("6.8.0");
    let paths = FakePaths(vec![PathBuf::from("/home/dev")]);
    let exported = RefCell::new(Vec::new());
    let log = RecordingLog::default();

    let mut live = home_env();
    live.insert("CLI_HOME".to_string(), "custom".to_string());
    let bootstrapper = Bootstrapper::new(
        host(
            live,
            &runtime,
            &paths,
            || FakeSource::with_versions(&[]),
            &exported,
        ),
        default_router(),
        &log,
    );

    assert_eq!(bootstrapper.run(&["-tp", "/work/app", "init"]), Outcome::Success);

    let vars: BTreeMap<String, String> = exported.borrow().iter().cloned().collect();
    assert_eq!(
        vars.get("CLI_HOME_PATH").map(String::as_str),
        Some(Path::new("/home/dev").join("custom").display().to_string().as_str())
    );
    assert_eq!(vars.get("LOG_LEVEL").map(String::as_str), Some("info"));
    assert_eq!(
        vars.get("CLI_TARGET_PATH").map(String::as_str),
        Some("/work/app")
    );
}

#[test]
fn status_lines_render_plain_and_rich() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "error", "boom"),
        "error: boom"
    );

    let rich = render_status_line(OutputStyle::Rich, "warn", "newer release");
    assert!(rich.contains("[WARN]"));
    assert!(rich.ends_with(" newer release"));
    assert!(rich.contains('\u{1b}'));
}

#[test]
fn log_levels_map_to_tracing_filters() {
    use tracing_subscriber::filter::LevelFilter;

    assert_eq!(level_filter(LogLevel::Error), LevelFilter::ERROR);
    assert_eq!(level_filter(LogLevel::Info), LevelFilter::INFO);
    assert_eq!(level_filter(LogLevel::Verbose), LevelFilter::DEBUG);
}

#[test]
fn level_change_survives_a_dropped_diagnostics_subscriber() {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::{reload, Registry};

    let (layer, handle) = reload::Layer::<LevelFilter, Registry>::new(LevelFilter::INFO);
    apply_level(&handle, LogLevel::Verbose).expect("live filter must accept a new level");
    drop(layer);
    apply_level(&handle, LogLevel::Verbose).expect_err("dropped filter must report failure");

    let log = TerminalLog::new(OutputStyle::Plain, Some(handle));
    log.set_level(LogLevel::Verbose);
    assert_eq!(log.level(), LogLevel::Verbose);
}

#[test]
fn clap_errors_map_to_exit_outcomes() {
    let router = default_router();
    let log = RecordingLog::default();

    let usage = router
        .route(&["init", "--bogus"])
        .expect_err("unknown option must fail to parse");
    assert_eq!(report_clap_error(&usage, &log), Outcome::Usage);

    let version = router
        .route(&["--version"])
        .expect_err("--version is reported through clap");
    assert_eq!(report_clap_error(&version, &log), Outcome::Success);
    assert!(log.errors().is_empty());
}
