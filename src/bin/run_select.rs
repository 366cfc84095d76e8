//! Command line front end for build selection
//!
//! Usage:
//!   run-select --history builds.yaml --job app
//!   run-select --history builds.yaml --job app --selector '(status :build-status "successful")'
//!   run-select --history builds.yaml --job deploy --selector '(triggering)' --origin app#12
//!   run-select --history builds.yaml --job app --selector '(parameterized :parameter "SEL")' \
//!       --var 'SEL=(permalink :id "lastBuild")' --verbose
//!
//! The selected build is printed to stdout as JSON. Console messages and
//! diagnostics go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use run_selector::run_model::{BuildRef, InMemoryHistory};
use run_selector::{
    ExecutionContext, SelectRun, SelectorError, SettingsLoader, Variables, CONFIG_ENV_VAR,
};

#[derive(Parser, Debug)]
#[command(name = "run-select")]
#[command(about = "Select a build from a job's history")]
struct Args {
    /// Build history file (YAML, or JSON with a .json extension)
    #[arg(long)]
    history: PathBuf,

    /// Job to select from
    #[arg(short, long)]
    job: String,

    /// Selector expression; defaults to the latest stable build
    #[arg(short, long)]
    selector: Option<String>,

    /// Filter expression; defaults to accepting every build
    #[arg(short, long)]
    filter: Option<String>,

    /// Build that started this request, as job#number
    #[arg(long)]
    origin: Option<BuildRef>,

    /// Variable binding NAME=VALUE, repeatable
    #[arg(long = "var", value_parser = parse_binding)]
    vars: Vec<(String, String)>,

    /// Selector settings file
    #[arg(long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Log every candidate the selector visits
    #[arg(short, long)]
    verbose: bool,
}

fn parse_binding(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "run_selector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let loader = match &args.config {
        Some(path) => SettingsLoader::new(path),
        None => SettingsLoader::from_env(),
    };
    let settings = loader.load()?;
    let history = InMemoryHistory::load(&args.history)?;

    let request = SelectRun::new(args.job.as_str())
        .with_expressions(args.selector.as_deref(), args.filter.as_deref())
        .context("Invalid selector or filter expression")?;

    let variables: Variables = args.vars.iter().cloned().collect();
    let verbose = args.verbose || settings.verbose;
    let mut ctx = ExecutionContext::new(&history)
        .with_variables(variables)
        .with_verbose(verbose)
        .with_settings(Arc::new(settings));
    if let Some(origin) = &args.origin {
        ctx = ctx.with_origin(origin.clone());
    }

    match request.execute(&mut ctx) {
        Ok(build) => {
            println!("{}", serde_json::to_string_pretty(build)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ SelectorError::NoBuildFound { .. }) => {
            eprintln!("{}", e);
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}
