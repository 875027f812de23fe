// gridcalc CLI - drive an in-memory sheet from scripts

mod config;
mod exit_codes;
mod render;
mod script;

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::debug;

use config::{Config, OutputConfig, OutputFormat, Show};
use exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_SCRIPT, EXIT_SUCCESS, EXIT_USAGE};
use render::Printer;
use script::Interpreter;

#[derive(Parser)]
#[command(name = "gridcalc")]
#[command(about = "In-memory spreadsheet with lazily evaluated formulas")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/gridcalc/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "gridcalc_engine=trace" (overrides config and RUST_LOG)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a sheet script, one command per line
    #[command(after_help = "\
Commands:
  set <cell> <text>       Set a cell (text may be empty, '=...' is a formula)
  clear <cell>            Reset a cell to empty
  get <cell>              Print a cell's value and text
  print values|texts|both Print the sheet
  size                    Print the printable size
Lines starting with # are comments.

Examples:
  gridcalc run budget.grid
  printf 'set A1 =B1*2\\nset B1 21\\nget A1\\n' | gridcalc run
  gridcalc run budget.grid --format json")]
    Run {
        /// Script file (omit to read from stdin)
        script: Option<PathBuf>,

        /// Output format (overrides config)
        #[arg(long, short = 'f')]
        format: Option<OutputFormat>,
    },

    /// Build a small demo sheet and print it
    Example {
        /// Output format (overrides config)
        #[arg(long, short = 'f')]
        format: Option<OutputFormat>,

        /// Which rendering to print (overrides config)
        #[arg(long)]
        show: Option<Show>,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  gridcalc-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(err: io::Error) -> Self {
        Self::new(EXIT_ERROR, err.to_string())
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Level precedence: `--log-level`, then the config file, then `RUST_LOG`, then "warn".
fn init_logging(flag: Option<&str>, config: Option<&str>) {
    let mut builder = match flag.or(config) {
        Some(filters) => {
            let mut builder = env_logger::Builder::new();
            builder.parse_filters(filters);
            builder
        }
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")),
    };
    builder.format_timestamp(None).target(env_logger::Target::Stderr).init();
}

fn cmd_run(script: Option<PathBuf>, output: &OutputConfig) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut errors = io::stderr();
    let mut interpreter = Interpreter::new(output);

    let summary = match script {
        Some(path) => {
            let file = File::open(&path).map_err(|e| {
                CliError::args(format!("cannot open script {}: {}", path.display(), e))
                    .with_hint("omit SCRIPT to read commands from stdin")
            })?;
            debug!("running script {}", path.display());
            interpreter.run(BufReader::new(file), &mut out, &mut errors)
        }
        None => {
            debug!("running script from stdin");
            interpreter.run(io::stdin().lock(), &mut out, &mut errors)
        }
    }
    .map_err(CliError::io)?;

    out.flush().map_err(CliError::io)?;

    if summary.is_success() {
        Ok(())
    } else {
        Err(CliError::new(
            EXIT_SCRIPT,
            format!("{} of {} commands failed", summary.failures.len(), summary.commands),
        ))
    }
}

fn cmd_example(output: &OutputConfig) -> Result<(), CliError> {
    let sheet = script::example_sheet().map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    Printer::new(output)
        .sheet(&sheet, output.show, &mut out)
        .and_then(|()| out.flush())
        .map_err(CliError::io)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("hint:  fix the file or pass --config with another path");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    init_logging(cli.log_level.as_deref(), config.log_level.as_deref());

    let mut output = config.output;
    let result = match cli.command {
        Commands::Run { script, format } => {
            if let Some(format) = format {
                output.format = format;
            }
            cmd_run(script, &output)
        }
        Commands::Example { format, show } => {
            if let Some(format) = format {
                output.format = format;
            }
            if let Some(show) = show {
                output.show = show;
            }
            cmd_example(&output)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
