//! `flowrun describe`: builds a run descriptor and optionally drives it
//! through the error and completion events.

use std::{env, ffi::OsString, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Args;
use flowrun_engine::{
    Collaborators, DispatchError, EventDispatcher, EventHandler, HandlerScope, RunDescriptor, RunNamespace,
    scope::format_json_value,
};
use flowrun_types::{ContainerEngine, RunError};
use flowrun_util::{
    ConfiguredContainerResolver, ContainerOverrides, FsScriptLocator, GitCliProvenance, InMemoryNamespace, RunInvocation,
    RunSettings, current_tool_version, new_session_id, redact_sensitive, render_command_line, run_name_for,
};
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// Main script of the pipeline
    script: PathBuf,

    /// Config file (YAML or JSON); repeat to layer several, later files win
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_files: Vec<PathBuf>,

    /// Configuration profile
    #[arg(long)]
    profile: Option<String>,

    /// Run name; generated from the session id when omitted
    #[arg(long = "name", value_name = "NAME")]
    run_name: Option<String>,

    /// Mark the run as resuming a previous session
    #[arg(long)]
    resume: bool,

    /// Mark the run as a stub run
    #[arg(long)]
    stub_run: bool,

    #[arg(long, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Container image for the run's processes
    #[arg(long = "with-container", value_name = "IMAGE")]
    container_image: Option<String>,

    /// Enable a container engine; repeatable
    #[arg(long = "engine", value_name = "ENGINE", value_parser = parse_engine)]
    engines: Vec<ContainerEngine>,

    /// Bind a namespace variable before handlers fire; VALUE is JSON or a plain string
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_binding)]
    bindings: Vec<(String, Value)>,

    /// Print how NAME resolves inside the event handlers; repeatable, dotted paths allowed
    #[arg(long = "show", value_name = "NAME")]
    show: Vec<String>,

    /// Complete the run and fire completion handlers
    #[arg(long)]
    complete: bool,

    /// Fail the run with MESSAGE, fire error handlers, then complete it
    #[arg(long, value_name = "MESSAGE")]
    fail: Option<String>,

    /// Exit status recorded with --fail
    #[arg(long, value_name = "CODE", requires = "fail")]
    exit_status: Option<i32>,
}

impl DescribeArgs {
    fn flag_settings(&self) -> RunSettings {
        RunSettings {
            profile: self.profile.clone(),
            run_name: self.run_name.clone(),
            resume: self.resume.then_some(true),
            stub_run: self.stub_run.then_some(true),
            work_dir: self.work_dir.clone(),
            container: ContainerOverrides {
                image: self.container_image.clone(),
                enabled: (!self.engines.is_empty()).then(|| self.engines.clone()),
            },
        }
    }
}

pub fn run(args: DescribeArgs) -> Result<()> {
    let launch_dir = env::current_dir().context("failed to determine the launch directory")?;
    let rendered = describe(&args, launch_dir, launch_command_line(env::args_os()))?;
    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

/// Builds the descriptor, drives the requested events and returns its public properties.
fn describe(args: &DescribeArgs, launch_dir: PathBuf, command_line: String) -> Result<Value> {
    let settings = RunSettings::load_all(&args.config_files)
        .context("failed to load config files")?
        .merge(args.flag_settings());

    let session_id = new_session_id();
    let config = settings.into_run_config(RunInvocation {
        command_line,
        session_id: session_id.to_string(),
        default_run_name: run_name_for(&session_id),
        launch_dir: launch_dir.clone(),
        config_files: args.config_files.clone(),
    });
    info!(command_line = %config.command_line, profile = config.profile_name(), "describing run");

    let scripts = FsScriptLocator::new(&launch_dir);
    let vcs = GitCliProvenance::default();
    let tool_version = current_tool_version();
    let collaborators = Collaborators {
        scripts: &scripts,
        vcs: &vcs,
        containers: &ConfiguredContainerResolver,
        tool_version: &tool_version,
    };
    let mut descriptor = RunDescriptor::create(&args.script, &config, &collaborators)
        .with_context(|| format!("failed to describe {}", args.script.display()))?;

    let namespace = Arc::new(InMemoryNamespace::new());
    descriptor.publish(&*namespace);
    for (name, value) in &args.bindings {
        namespace.set(name, value.clone());
    }
    debug!(variables = ?namespace.snapshot().keys().collect::<Vec<_>>(), "namespace prepared");

    let mut dispatcher = EventDispatcher::new(namespace.clone());
    for name in &args.show {
        dispatcher.on_complete(show_handler(name));
        dispatcher.on_error(show_handler(name));
    }

    if let Some(message) = &args.fail {
        let mut error = RunError::new(message.as_str());
        if let Some(exit_status) = args.exit_status {
            error = error.with_exit_status(exit_status);
        }
        tolerate_handler_failures(dispatcher.fire_error(&mut descriptor, error))?;
    }
    if args.complete || args.fail.is_some() {
        descriptor.mark_complete()?;
        tolerate_handler_failures(dispatcher.fire_complete(&descriptor))?;
        descriptor.publish(&*namespace);
    }

    Ok(descriptor.to_json())
}

/// Recorded command line of this process, with secrets redacted.
///
/// Non UTF-8 arguments are rendered lossily.
fn launch_command_line<I>(args: I) -> String
where
    I: IntoIterator<Item = OsString>,
{
    let args: Vec<String> = args
        .into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    redact_sensitive(&render_command_line(&args))
}

/// Handler failures are reported but do not fail the command.
fn tolerate_handler_failures(result: Result<(), DispatchError>) -> Result<()> {
    match result {
        Err(DispatchError::HandlersFailed(report)) => {
            warn!(%report, "lifecycle handlers failed");
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}

fn show_handler(name: &str) -> EventHandler {
    let label = format!("show {name}");
    let name = name.to_string();
    EventHandler::new(move |scope| {
        println!("{}", render_resolution(scope, &name));
        Ok(())
    })
    .named(label)
}

fn render_resolution(scope: &HandlerScope<'_>, name: &str) -> String {
    let head = name.split('.').next().unwrap_or(name);
    let resolution = scope.resolve(head);
    let value = if head == name {
        resolution.value().cloned()
    } else {
        scope.lookup(name)
    };
    match value {
        Some(value) => format!("{name} [{}] = {}", resolution.source(), format_json_value(&value)),
        None => format!("{name} [{}]", resolution.source()),
    }
}

fn parse_binding(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

fn parse_engine(raw: &str) -> Result<ContainerEngine, String> {
    ContainerEngine::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = ContainerEngine::PRECEDENCE.iter().map(|engine| engine.as_str()).collect();
        format!("unknown container engine '{raw}' (expected one of: {})", known.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use clap::Parser;
    use flowrun_engine::{NoContainer, NoRepository};
    use serde_json::json;

    use super::*;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        args: DescribeArgs,
    }

    fn parse(argv: &[&str]) -> DescribeArgs {
        Harness::try_parse_from(std::iter::once("describe").chain(argv.iter().copied()))
            .expect("parse describe args")
            .args
    }

    #[test]
    fn bindings_parse_json_or_fall_back_to_strings() {
        assert_eq!(parse_binding("value_a=1"), Ok(("value_a".to_string(), json!(1))));
        assert_eq!(parse_binding("flags=[true,false]"), Ok(("flags".to_string(), json!([true, false]))));
        assert_eq!(parse_binding("greeting=Hello world"), Ok(("greeting".to_string(), json!("Hello world"))));
        assert_eq!(parse_binding("empty="), Ok(("empty".to_string(), json!(""))));
        assert!(parse_binding("no-equals").is_err());
        assert!(parse_binding("=1").is_err());
    }

    #[test]
    fn unknown_engine_lists_the_known_ones() {
        let message = parse_engine("rkt").expect_err("rkt is not supported");

        assert!(message.contains("docker, podman, singularity"));
        assert_eq!(parse_engine("Podman"), Ok(ContainerEngine::Podman));
    }

    #[test]
    fn flags_become_the_last_settings_layer() {
        let args = parse(&[
            "main.nf",
            "--profile",
            "test",
            "--resume",
            "--engine",
            "singularity",
            "--engine",
            "docker",
            "--set",
            "value_a=1",
        ]);

        let settings = args.flag_settings();

        assert_eq!(settings.profile.as_deref(), Some("test"));
        assert_eq!(settings.resume, Some(true));
        assert_eq!(settings.stub_run, None);
        assert_eq!(
            settings.container.enabled,
            Some(vec![ContainerEngine::Singularity, ContainerEngine::Docker])
        );
        assert_eq!(args.bindings, vec![("value_a".to_string(), json!(1))]);
    }

    #[test]
    fn unset_flags_do_not_override_files() {
        let args = parse(&["main.nf"]);
        let from_file = RunSettings {
            resume: Some(true),
            ..RunSettings::default()
        };

        let merged = from_file.merge(args.flag_settings());

        assert_eq!(merged.resume, Some(true));
        assert_eq!(merged.container.enabled, None);
    }

    #[test]
    fn exit_status_requires_fail() {
        let result = Harness::try_parse_from(["describe", "main.nf", "--exit-status", "2"]);

        assert!(result.is_err());
    }

    fn pipeline_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("main.nf"), "println 'Hello world'").expect("write script");
        dir
    }

    fn argv(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn launch_command_line_redacts_secrets() {
        let line = launch_command_line(argv(&["flowrun", "describe", "main.nf", "--set", "API_TOKEN=s3cr3t"]));

        assert_eq!(line, "flowrun describe main.nf --set API_TOKEN=<redacted>");
    }

    #[cfg(unix)]
    #[test]
    fn launch_command_line_tolerates_non_utf8_arguments() {
        use std::os::unix::ffi::OsStringExt;

        let line = launch_command_line(vec![OsString::from("flowrun"), OsString::from_vec(b"caf\xff".to_vec())]);

        assert_eq!(line, "flowrun caf\u{FFFD}");
    }

    #[test]
    fn render_resolution_reads_live_descriptor_after_completion() {
        let dir = pipeline_dir();
        let config = RunSettings::default().into_run_config(RunInvocation {
            command_line: "flowrun describe main.nf".into(),
            session_id: "session".into(),
            default_run_name: "serene-noether".into(),
            launch_dir: dir.path().to_path_buf(),
            config_files: Vec::new(),
        });
        let scripts = FsScriptLocator::new(dir.path());
        let version = current_tool_version();
        let collaborators = Collaborators {
            scripts: &scripts,
            vcs: &NoRepository,
            containers: &NoContainer,
            tool_version: &version,
        };
        let mut descriptor = RunDescriptor::create(Path::new("main.nf"), &config, &collaborators).expect("create descriptor");
        let namespace = InMemoryNamespace::new();
        descriptor.publish(&namespace);
        namespace.set("value_a", json!(1));
        descriptor.mark_complete().expect("complete");

        let scope = HandlerScope::new(&descriptor, &namespace);

        assert_eq!(render_resolution(&scope, "workflow.success"), "workflow.success [descriptor] = true");
        assert_eq!(render_resolution(&scope, "success"), "success [descriptor] = true");
        assert_eq!(render_resolution(&scope, "runName"), "runName [descriptor] = serene-noether");
        assert_eq!(render_resolution(&scope, "value_a"), "value_a [namespace] = 1");
        assert_eq!(render_resolution(&scope, "undefinedVariable"), "undefinedVariable [absent]");
    }

    #[test]
    fn show_handler_is_labelled_by_name() {
        assert_eq!(show_handler("workflow.success").label(), Some("show workflow.success"));
    }

    #[test]
    fn describe_completes_run_with_redacted_command_line() {
        let dir = pipeline_dir();
        let args = parse(&["main.nf", "--complete", "--show", "workflow.success", "--set", "value_a=1"]);
        let command_line = launch_command_line(argv(&["flowrun", "describe", "main.nf", "--set", "API_TOKEN=s3cr3t"]));

        let rendered = describe(&args, dir.path().to_path_buf(), command_line).expect("describe");

        assert_eq!(rendered["success"], json!(true));
        assert_eq!(rendered["exitStatus"], json!(0));
        assert_eq!(rendered["scriptName"], json!("main.nf"));
        assert!(rendered["completeTime"].is_string());
        let command_line = rendered["commandLine"].as_str().expect("command line");
        assert!(command_line.contains("API_TOKEN=<redacted>"));
        assert!(!command_line.contains("s3cr3t"));
    }

    #[test]
    fn describe_fail_path_records_the_error() {
        let dir = pipeline_dir();
        let args = parse(&["main.nf", "--fail", "process `align` failed", "--exit-status", "3", "--show", "error.message"]);

        let rendered = describe(&args, dir.path().to_path_buf(), "flowrun describe main.nf".into()).expect("describe");

        assert_eq!(rendered["success"], json!(false));
        assert_eq!(rendered["exitStatus"], json!(3));
        assert_eq!(rendered["errorMessage"], json!("process `align` failed"));
    }

    #[test]
    fn describe_reports_a_missing_script() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = parse(&["absent.nf"]);

        let error = describe(&args, dir.path().to_path_buf(), "flowrun describe absent.nf".into()).expect_err("missing script");

        assert!(format!("{error:#}").contains("script file not found"));
    }
}
