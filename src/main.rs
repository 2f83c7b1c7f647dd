//! Model checker binary.
//!
//! ```text
//! stateless-mc [--config=<file.toml>] [--cfg=model-check/<key>:<value>]...
//!              [--log=<filter>] [--log-format=text|json] [--stats-json=<file>]
//!              (--scenario=<file.toml> | <program> [args...])
//! ```
//!
//! With `--scenario`, the scripted program runs inside the checker. Otherwise
//! `<program>` is started and checked over the control socket.
//!
//! The exit code tells what was found: 0 when nothing, 1 for a property violation,
//! 3 for a deadlock, 5 for a non-determinism, 6 for a data race, 63 for a crash.

use stateless_mc::app::Scenario;
use stateless_mc::config::SYSTEM_STATISTICS_ENV;
use stateless_mc::observability::init_tracing;
use stateless_mc::{CheckerConfig, ExplorationContext, InProcessApp, McError, ProcessApp, RemoteApp};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Exit code of usage and checker failures
const FAILURE: i32 = 64;

struct Args {
    config: CheckerConfig,
    scenario: Option<PathBuf>,
    stats_json: Option<PathBuf>,
    program: Option<PathBuf>,
    program_args: Vec<String>,
}

fn parse_args() -> Result<Args, McError> {
    let mut argv = std::env::args().skip(1).peekable();
    let mut flags = Vec::new();
    let mut config_file = None;
    let mut scenario = None;
    let mut stats_json = None;

    while let Some(arg) = argv.next_if(|a| a.starts_with("--")) {
        if let Some(path) = arg.strip_prefix("--config=") {
            config_file = Some(PathBuf::from(path));
        } else if let Some(path) = arg.strip_prefix("--scenario=") {
            scenario = Some(PathBuf::from(path));
        } else if let Some(path) = arg.strip_prefix("--stats-json=") {
            stats_json = Some(PathBuf::from(path));
        } else if let Some(filter) = arg.strip_prefix("--log=") {
            flags.push(format!("log:{}", filter));
        } else if let Some(format) = arg.strip_prefix("--log-format=") {
            flags.push(format!("log-format:{}", format));
        } else {
            flags.push(arg);
        }
    }

    let mut config = match &config_file {
        Some(path) => CheckerConfig::from_file(path)?,
        None => CheckerConfig::default(),
    };
    for flag in &flags {
        config.apply_flag(flag)?;
    }
    config.apply_env();
    config.validate()?;

    let program = argv.next().map(PathBuf::from);
    Ok(Args {
        config,
        scenario,
        stats_json,
        program,
        program_args: argv.collect(),
    })
}

fn run(args: Args) -> Result<i32, McError> {
    let remote: Box<dyn RemoteApp> = match (&args.scenario, args.program) {
        (Some(path), _) => {
            let scenario = Scenario::from_file(path)?;
            info!("Checking the scenario {}", path.display());
            Box::new(InProcessApp::scripted(Arc::new(scenario))?)
        }
        (None, Some(program)) => {
            info!("Checking {}", program.display());
            Box::new(ProcessApp::spawn(program, args.program_args, &args.config)?)
        }
        (None, None) => {
            return Err(McError::Internal(
                "nothing to check: give a program or --scenario=<file>".to_string(),
            ))
        }
    };

    let mut ctx = ExplorationContext::new(args.config, remote)?;
    let outcome = ctx.run()?;
    if let Some(path) = &args.stats_json {
        let json = serde_json::to_string_pretty(&ctx.stats())
            .map_err(|e| McError::Internal(format!("cannot serialize the statistics: {}", e)))?;
        std::fs::write(path, json)?;
    }
    if outcome.bug().is_none() {
        info!("No property violation found.");
    }
    Ok(outcome.exit_status().code())
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("stateless-mc: {}", e);
            eprintln!(
                "usage: stateless-mc [--config=<file>] [--cfg=model-check/<key>:<value>]... (--scenario=<file> | <program> [args...])"
            );
            eprintln!(
                "       set {} to get a memory report at the end",
                SYSTEM_STATISTICS_ENV
            );
            std::process::exit(FAILURE);
        }
    };
    init_tracing(&args.config.log);

    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            error!("Model checking failed: {}", e);
            FAILURE
        }
    };
    std::process::exit(code);
}
