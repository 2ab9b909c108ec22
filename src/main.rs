//! Impacket Runner - run a command on a remote Windows host through psexec.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use impacket_runner::client::{Client, ClientEvent};
use impacket_runner::config::{AppConfig, ConfigLoader};
use impacket_runner::display;
use impacket_runner::runner::{OutputStream, ProcessOutcome, RunError};

/// Exit status when the helper could not be started.
const EXIT_SPAWN_FAILED: u8 = 127;
/// Exit status after Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;
/// Exit status for usage and configuration errors.
const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(
    name = "impacket-runner",
    about = "Run a command on a remote Windows host through impacket psexec",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to .impacket-runner.toml, then the user config dir).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one command on the remote host.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Command line to execute remotely.
    command: String,
    /// Target host.
    #[arg(long)]
    host: Option<String>,
    /// Account as login, login@domain, domain\login or domain/login.
    #[arg(short, long)]
    username: Option<String>,
    /// Password; omit to authenticate without one.
    #[arg(short, long)]
    password: Option<String>,
    /// Reinstall the remote service first.
    #[arg(long)]
    reinstall: bool,
    /// Uninstall the remote service afterwards.
    #[arg(long)]
    uninstall: bool,
    /// Run as SYSTEM.
    #[arg(long)]
    system: bool,
    /// Kill the helper after this many milliseconds.
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,
    /// Helper executable.
    #[arg(long, value_name = "PATH")]
    helper: Option<PathBuf>,
    /// Working directory for the helper.
    #[arg(long, value_name = "DIR")]
    working_dir: Option<PathBuf>,
    /// Print the helper command line and exit.
    #[arg(long)]
    dry_run: bool,
    /// Print the result as JSON instead of streaming lines.
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    /// Layer command-line flags over the file configuration.
    fn apply(&self, config: &mut AppConfig) {
        let connection = &mut config.connection;
        if let Some(host) = &self.host {
            connection.host.clone_from(host);
        }
        if let Some(username) = &self.username {
            connection.username.clone_from(username);
        }
        if let Some(password) = &self.password {
            connection.password.clone_from(password);
        }
        connection.options.reinstall |= self.reinstall;
        connection.options.uninstall |= self.uninstall;
        connection.options.system |= self.system;
        if self.timeout.is_some() {
            connection.timeout_ms = self.timeout;
        }
        if let Some(helper) = &self.helper {
            config.helper.path = from_current_dir(helper);
        }
        if let Some(dir) = &self.working_dir {
            config.helper.working_dir = Some(from_current_dir(dir));
        }
    }
}

/// Anchor a relative command-line path at the current directory.
///
/// Relative helper paths from the config file resolve against the
/// executable's directory instead.
fn from_current_dir(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
}

/// Result printed with `--json`.
#[derive(Serialize)]
struct JsonReport<'a> {
    success: bool,
    exit_code: Option<i32>,
    error: Option<String>,
    stdout: &'a str,
    stderr: &'a str,
}

impl<'a> JsonReport<'a> {
    fn new(result: &'a Result<ProcessOutcome, RunError>) -> Self {
        let outcome = match result {
            Ok(outcome) => Some(outcome),
            Err(e) => e.outcome(),
        };
        Self {
            success: result.is_ok(),
            exit_code: outcome.and_then(|o| o.exit_code),
            error: result.as_ref().err().map(ToString::to_string),
            stdout: outcome.map_or("", |o| o.stdout.as_str()),
            stderr: outcome.map_or("", |o| o.stderr.as_str()),
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Map a run result onto the process exit status.
fn exit_status(result: &Result<ProcessOutcome, RunError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(RunError::Spawn(_)) => EXIT_SPAWN_FAILED,
        Err(e) => e
            .exit_code()
            .and_then(|code| u8::try_from(code).ok())
            .filter(|code| *code != 0)
            .unwrap_or(1),
    }
}

async fn run(mut config: AppConfig, args: RunArgs) -> ExitCode {
    args.apply(&mut config);

    if config.connection.host.is_empty() {
        display::print_error("No target host: pass --host or set connection.host in the config file");
        return ExitCode::from(EXIT_USAGE);
    }

    let client = Client::with_helper(config.connection, config.helper);
    let request = client.request(args.command, None);

    if args.dry_run {
        display::print_args(
            &client.runner().program().display().to_string(),
            &client.invocation(&request).redacted_args(),
        );
        return ExitCode::SUCCESS;
    }

    if !args.json {
        client.on(|event| match event {
            ClientEvent::Stdout { line, .. } => display::print_line(OutputStream::Stdout, line),
            ClientEvent::Stderr { line, .. } => display::print_line(OutputStream::Stderr, line),
            ClientEvent::Error { .. } => {}
        });
        display::print_run_start(
            &client.config().host,
            client.identity().as_str(),
            &request.command,
        );
    }

    tracing::info!(run_id = %request.id, host = %client.config().host, "Starting run");

    let result = tokio::select! {
        result = client.execute(request) => result,
        _ = tokio::signal::ctrl_c() => {
            display::print_error("Interrupted");
            return ExitCode::from(EXIT_INTERRUPTED);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&JsonReport::new(&result)) {
            Ok(json) => println!("{json}"),
            Err(e) => display::print_error(&format!("Failed to encode result: {e}")),
        }
    } else {
        display::print_run_end(&result);
    }

    ExitCode::from(exit_status(&result))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .config
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match cli.command {
        Commands::Run(args) => run(config, args).await,
    }
}
