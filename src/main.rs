use anyhow::{anyhow, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod diff;
mod evidence;
mod pipeline;
mod report;
mod runner;
mod structural;

use cli::RootArgs;
use config::AuditConfig;
use diff::GitDiff;
use pipeline::{Collaborators, StageObserver};
use runner::{OutputRoute, ProcessTest};

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);
    match run(&args) {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code(pipeline::EXIT_ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &RootArgs) -> Result<i32> {
    let config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => AuditConfig::default(),
    };
    config::validate_config(&config)?;

    if args.print_config {
        println!("{}", config::config_json(&config)?);
        return Ok(pipeline::EXIT_SUCCESS);
    }

    let root = args.root.as_path();
    if !root.is_dir() {
        return Err(anyhow!("audit root is not a directory: {}", root.display()));
    }
    tracing::debug!(root = %root.display(), "starting hotfix gate");

    let route = if args.json {
        OutputRoute::Stderr
    } else {
        OutputRoute::Inherit
    };
    let diff = GitDiff::new(root, &config.diff.base_revision);
    let reproduction = ProcessTest::new(config.reproduction.argv()?, root)
        .with_timeout(config.reproduction.timeout_seconds)
        .with_route(route);
    let invariants = ProcessTest::new(config.invariants.argv()?, root)
        .with_timeout(config.invariants.timeout_seconds)
        .with_route(route);
    let collaborators = Collaborators {
        diff: &diff,
        reproduction: &reproduction,
        invariants: &invariants,
    };

    let mut console = report::Console;
    let mut silent = pipeline::Silent;
    let observer: &mut dyn StageObserver = if args.json {
        &mut silent
    } else {
        &mut console
    };
    let outcome = pipeline::run_pipeline(&config, root, &collaborators, observer);

    if args.json {
        println!("{}", report::render_json(&outcome)?);
    } else {
        print!("{}", report::render_summary(&outcome));
    }
    Ok(outcome.exit_code)
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code)
        .map(ExitCode::from)
        .unwrap_or(ExitCode::FAILURE)
}
