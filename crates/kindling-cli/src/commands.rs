use anyhow::Result;

use crate::router::{CommandSpec, Invocation, OptionSpec};

pub(crate) const INIT_PROJECT_NAME: &str = "projectName";
pub(crate) const INIT_FORCE: &str = "force";
pub(crate) const INIT_TEMPLATE: &str = "template";

pub(crate) fn init_command() -> CommandSpec {
    CommandSpec::new("init", "Initialise a new project", run_init)
        .option(OptionSpec::Positional {
            name: INIT_PROJECT_NAME,
            help: "Name of the project to create",
            required: false,
        })
        .option(OptionSpec::Flag {
            name: INIT_FORCE,
            short: Some('f'),
            help: "Initialise even when the target directory is not empty",
        })
        .option(OptionSpec::Value {
            name: INIT_TEMPLATE,
            short: Some('t'),
            value_name: "NAME",
            help: "Template package to initialise from",
        })
}

// Project scaffolding is provided by the installed template package; this
// handler only reports what it was asked to do.
fn run_init(invocation: &Invocation<'_>) -> Result<()> {
    let config = invocation.config();
    let target = config
        .target_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| ".".to_string());
    let project = invocation.value(INIT_PROJECT_NAME).unwrap_or("(unnamed)");
    let template = invocation.value(INIT_TEMPLATE).unwrap_or("default");

    invocation.log().verbose(&format!(
        "{} options: {:?}",
        invocation.command(),
        invocation.values()
    ));
    invocation.log().notice(
        "init",
        &format!(
            "project {project} in {target} from template {template}{}",
            if invocation.flag(INIT_FORCE) {
                " (force)"
            } else {
                ""
            }
        ),
    );
    Ok(())
}
