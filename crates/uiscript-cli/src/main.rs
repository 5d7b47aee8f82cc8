//! uiscript CLI: manage, run and report desktop UI test scripts.
//!
//! Scripts run against a simulated desktop described by a JSON or YAML file,
//! which makes the CLI usable for dry runs and in CI.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes
#![allow(clippy::fn_params_excessive_bools)] // CLI flags are naturally bools

use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use miette::Result;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uiscript::automation::SimulatedDesktop;
use uiscript::{EngineConfig, EngineError, EngineResult, Step, StepType, TestResult, TestSession, TestStatus};

mod progress;

/// Color output mode
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and `NO_COLOR` env
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Debug, Parser)]
#[command(name = "uiscript", version, about = "Record, store and replay desktop UI test scripts")]
struct Cli {
    /// Control color output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorMode,

    /// Repository directory (overrides the config file)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Engine config file (.json, .yaml or .yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug); `RUST_LOG` takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an empty script
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Append a step to a stored script
    AddStep {
        script: String,
        #[arg(long)]
        command: String,
        #[arg(long = "type", default_value = "action")]
        step_type: String,
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
        #[arg(long)]
        expected: Option<String>,
        #[arg(long)]
        store_result: Option<String>,
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        continue_on_failure: bool,
    },
    /// List stored scripts
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print a stored script as JSON
    Show { name: String },
    /// Delete a stored script
    Delete { name: String },
    /// Save a script document (JSON) into the repository
    Import { file: PathBuf },
    /// Run a stored script against a simulated desktop
    Run {
        name: String,
        #[arg(long, help = "Desktop description file (.json, .yaml or .yml)")]
        desktop: Option<PathBuf>,
        #[arg(long = "param", value_parser = parse_key_value, help = "Variable override, KEY=VALUE")]
        params: Vec<(String, String)>,
        #[arg(long)]
        json: bool,
        #[arg(long, help = "Show per-step progress on stderr")]
        progress: bool,
    },
    /// Show stored results of a script, newest first
    Results {
        name: String,
        #[arg(long)]
        max: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Export the latest result of a script as an HTML report
    Export { name: String },
    /// Generate shell completions
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for")]
        shell: Shell,
    },
}

impl Commands {
    fn json(&self) -> bool {
        match self {
            Self::List { json } | Self::Results { json, .. } | Self::Run { json, .. } => *json,
            _ => false,
        }
    }
}

/// Configure color output based on CLI flag and environment
fn configure_colors(mode: ColorMode) {
    let use_color = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            if std::env::var("NO_COLOR").is_ok() {
                false
            } else {
                supports_color::on(supports_color::Stream::Stderr).is_some()
            }
        }
    };

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(use_color)
                .unicode(use_color)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_colors(cli.color);
    init_tracing(cli.verbose);

    let json = cli.command.json();
    match dispatch(cli) {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(err) => emit_error(json, err),
    }
}

fn dispatch(cli: Cli) -> EngineResult<i32> {
    let config = load_config(cli.config.as_deref(), cli.home)?;
    match cli.command {
        Commands::Create { name, description } => cmd_create(&config, &name, &description),
        Commands::AddStep {
            script,
            command,
            step_type,
            params,
            expected,
            store_result,
            message,
            description,
            continue_on_failure,
        } => {
            let step = Step {
                step_type: StepType::from(step_type),
                command,
                params: params
                    .into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
                store_result,
                expected: expected.map(Into::into),
                message,
                continue_on_failure,
                description,
            };
            cmd_add_step(&config, &script, step)
        }
        Commands::List { json } => cmd_list(&config, json),
        Commands::Show { name } => cmd_show(&config, &name),
        Commands::Delete { name } => cmd_delete(&config, &name),
        Commands::Import { file } => cmd_import(&config, &file),
        Commands::Run {
            name,
            desktop,
            params,
            json,
            progress,
        } => cmd_run(config, &name, desktop.as_deref(), params, json, progress),
        Commands::Results { name, max, json } => cmd_results(&config, &name, max, json),
        Commands::Export { name } => cmd_export(&config, &name),
        Commands::Completions { shell } => Ok(cmd_completions(shell)),
    }
}

fn load_config(path: Option<&Path>, home: Option<PathBuf>) -> EngineResult<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(home) = home {
        config.home = home;
    }
    debug!(home = %config.home.display(), "using repository");
    Ok(config)
}

fn open_session(config: &EngineConfig) -> EngineResult<TestSession<SimulatedDesktop>> {
    TestSession::new(config.clone(), SimulatedDesktop::new())
}

// =============================================================================
// Command Handlers
// =============================================================================

fn cmd_create(config: &EngineConfig, name: &str, description: &str) -> EngineResult<i32> {
    let script = open_session(config)?.create_script(name, description)?;
    println!("created script: {}", script.name);
    Ok(0)
}

fn cmd_add_step(config: &EngineConfig, script: &str, step: Step) -> EngineResult<i32> {
    let index = open_session(config)?.add_step(script, step)?;
    println!("added step {index} to {script}");
    Ok(0)
}

fn cmd_list(config: &EngineConfig, json: bool) -> EngineResult<i32> {
    let scripts = open_session(config)?.list_scripts()?;
    if json {
        println!("{}", to_json(&scripts)?);
    } else {
        for script in &scripts {
            println!(
                "{}\t{} steps\t{}",
                script.name,
                script.steps.len(),
                script.modified.to_rfc3339()
            );
        }
    }
    Ok(0)
}

fn cmd_show(config: &EngineConfig, name: &str) -> EngineResult<i32> {
    let script = open_session(config)?
        .load_script(name)?
        .ok_or_else(|| EngineError::not_found(format!("Script not found: {name}")))?;
    println!("{}", to_json_pretty(&script)?);
    Ok(0)
}

fn cmd_delete(config: &EngineConfig, name: &str) -> EngineResult<i32> {
    if open_session(config)?.delete_script(name)? {
        println!("deleted script: {name}");
        Ok(0)
    } else {
        Err(EngineError::not_found(format!("Script not found: {name}")))
    }
}

fn cmd_import(config: &EngineConfig, file: &Path) -> EngineResult<i32> {
    let document = fs::read_to_string(file)
        .map_err(|err| EngineError::io("failed to read script file", err))?;
    let script = open_session(config)?.save_script_json(&document)?;
    println!("saved script: {}", script.name);
    Ok(0)
}

fn cmd_run(
    config: EngineConfig,
    name: &str,
    desktop: Option<&Path>,
    params: Vec<(String, String)>,
    json: bool,
    progress: bool,
) -> EngineResult<i32> {
    let backend = match desktop {
        Some(path) => SimulatedDesktop::load(path)?,
        None => SimulatedDesktop::new(),
    };
    let mut session = TestSession::new(config, backend)?;
    if progress {
        session = session.with_progress(Arc::new(progress::VerboseProgress::new()));
    }
    let overrides: BTreeMap<String, String> = params.into_iter().collect();
    let overrides = (!overrides.is_empty()).then_some(&overrides);

    let result = session.run_script(name, overrides)?;
    emit_result(json, &result)?;
    Ok(i32::from(result.status != TestStatus::Passed))
}

fn cmd_results(config: &EngineConfig, name: &str, max: Option<usize>, json: bool) -> EngineResult<i32> {
    let results = open_session(config)?.get_results(Some(name), max)?;
    if json {
        println!("{}", to_json(&results)?);
    } else {
        for result in &results {
            println!(
                "{}\t{:?}\t{}/{} passed\t{}ms",
                result.start_time.to_rfc3339(),
                result.status,
                result.passed_steps(),
                result.total_steps,
                result.duration_ms()
            );
        }
    }
    Ok(0)
}

fn cmd_export(config: &EngineConfig, name: &str) -> EngineResult<i32> {
    let path = open_session(config)?.export_result_to_report(Some(name))?;
    println!("{}", path.display());
    Ok(0)
}

fn cmd_completions(shell: Shell) -> i32 {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    0
}

// =============================================================================
// Output
// =============================================================================

fn emit_result(json: bool, result: &TestResult) -> EngineResult<()> {
    if json {
        println!("{}", to_json(result)?);
        return Ok(());
    }
    println!(
        "{}: {:?} ({}/{} steps passed, {}ms)",
        result.script_name,
        result.status,
        result.passed_steps(),
        result.total_steps,
        result.duration_ms()
    );
    for step in &result.step_results {
        if let Some(error) = &step.error_message {
            println!("  step {} ({}): {error}", step.step_index + 1, step.step.command);
        }
    }
    Ok(())
}

fn emit_error(json: bool, err: EngineError) -> Result<()> {
    let code = err.code.exit_code();
    if json {
        let payload = serde_json::json!({
            "code": err.code,
            "message": err.message,
            "context": err.context,
        });
        println!("{payload}");
    } else {
        eprintln!("{:?}", miette::Report::new(err));
    }
    std::process::exit(code)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> EngineResult<String> {
    serde_json::to_string(value).map_err(|err| EngineError::protocol("failed to serialize", err))
}

fn to_json_pretty<T: serde::Serialize + ?Sized>(value: &T) -> EngineResult<String> {
    serde_json::to_string_pretty(value).map_err(|err| EngineError::protocol("failed to serialize", err))
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::parse_key_value;

    #[test]
    fn key_value_splits_on_first_equals() {
        assert_eq!(
            parse_key_value("url=https://x?a=b"),
            Ok(("url".to_string(), "https://x?a=b".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
