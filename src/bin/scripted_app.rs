//! Scripted program served to the checker.
//!
//! ```text
//! stateless-mc [--cfg=...]... scripted-app <scenario.toml>
//! ```
//!
//! Started by the checker with the control socket in `SIMGRID_MC_SOCKET_FD`. Run
//! on its own, it executes the scenario once, always scheduling the lowest enabled
//! actor.

use stateless_mc::app::{CheckedProgram, Scenario, ScriptedProgram};
use stateless_mc::observability::{init_tracing, LogConfig};
use stateless_mc::remote::protocol::SOCKET_FD_ENV;
use stateless_mc::remote::AppSide;
use stateless_mc::McError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

fn run(path: PathBuf) -> Result<(), McError> {
    let scenario = Arc::new(Scenario::from_file(&path)?);
    let mut program = ScriptedProgram::new(scenario);

    if std::env::var_os(SOCKET_FD_ENV).is_some() {
        return AppSide::from_env(Box::new(program))?.run();
    }

    info!("Running {} without checker", path.display());
    program.run_local_steps()?;
    loop {
        let Some(actor) = program.actors().into_iter().find(|a| a.enabled) else {
            break;
        };
        let t = program.execute(actor.aid, 0)?;
        info!("Actor {} ==> simcall: {}", t.aid, t);
        program.run_local_steps()?;
    }
    if program.is_deadlocked() {
        for line in program.describe_actors() {
            info!("{}", line);
        }
        return Err(McError::Internal("the scenario deadlocked".to_string()));
    }
    program.finalize();
    Ok(())
}

fn main() {
    init_tracing(&LogConfig::default());
    let Some(path) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: scripted-app <scenario.toml>");
        std::process::exit(64);
    };
    if let Err(e) = run(path) {
        error!("{}", e);
        std::process::exit(1);
    }
}
