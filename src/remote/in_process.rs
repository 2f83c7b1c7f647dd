use super::{ActorStatus, CheckpointId, RemoteApp, ReplayedStep};
use crate::app::{CheckedProgram, Scenario, ScriptedProgram};
use crate::error::McError;
use crate::rng::DeterministicRng;
use crate::transition::{Aid, Transition};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

type ProgramFactory = Box<dyn Fn() -> Box<dyn CheckedProgram> + Send>;

/// Runs the checked program inside the checker process.
///
/// Restoring the initial state rebuilds the program from its factory, checkpoints are
/// plain clones.
pub struct InProcessApp {
    factory: ProgramFactory,
    current: Box<dyn CheckedProgram>,
    checkpoints: BTreeMap<CheckpointId, Box<dyn CheckedProgram>>,
    next_checkpoint: CheckpointId,
}

impl InProcessApp {
    pub fn new<F>(factory: F) -> Result<Self, McError>
    where
        F: Fn() -> Box<dyn CheckedProgram> + Send + 'static,
    {
        let mut current = factory();
        current.run_local_steps()?;
        Ok(InProcessApp {
            factory: Box::new(factory),
            current,
            checkpoints: BTreeMap::new(),
            next_checkpoint: 1,
        })
    }

    pub fn scripted(scenario: Arc<Scenario>) -> Result<Self, McError> {
        Self::new(move || Box::new(ScriptedProgram::new(Arc::clone(&scenario))))
    }

    /// The program in its current state.
    pub fn program(&self) -> &dyn CheckedProgram {
        self.current.as_ref()
    }

    fn step_with_status(&mut self, aid: Aid, times: u32) -> Result<ReplayedStep, McError> {
        let transition = self.current.execute(aid, times)?;
        self.current.run_local_steps()?;
        Ok(ReplayedStep {
            transition: Arc::new(transition),
            actors: self.current.actors_status(true),
        })
    }
}

impl RemoteApp for InProcessApp {
    fn get_actors_status(&mut self, want_transitions: bool) -> Result<Vec<ActorStatus>, McError> {
        Ok(self.current.actors_status(want_transitions))
    }

    fn handle_simcall(
        &mut self,
        aid: Aid,
        times_considered: u32,
        want_transition: bool,
    ) -> Result<Option<Transition>, McError> {
        let transition = self.current.execute(aid, times_considered)?;
        Ok(want_transition.then_some(transition))
    }

    fn wait_for_requests(&mut self) -> Result<(), McError> {
        self.current.run_local_steps()
    }

    fn check_deadlock(&mut self, verbose: bool) -> Result<bool, McError> {
        let deadlock = self.current.is_deadlocked();
        if deadlock && verbose {
            for line in self.current.describe_actors() {
                info!("{}", line);
            }
        }
        Ok(deadlock)
    }

    fn replay_sequence(
        &mut self,
        silent: &[(Aid, u32)],
        with_status: &[(Aid, u32)],
    ) -> Result<Vec<ReplayedStep>, McError> {
        for &(aid, times) in silent {
            self.current.execute(aid, times)?;
            self.current.run_local_steps()?;
        }
        with_status
            .iter()
            .map(|&(aid, times)| self.step_with_status(aid, times))
            .collect()
    }

    fn go_one_way(
        &mut self,
        random_seed: Option<u64>,
        want_transitions: bool,
    ) -> Result<Vec<ReplayedStep>, McError> {
        let mut rng = random_seed.map(DeterministicRng::new);
        let mut steps = Vec::new();
        loop {
            let enabled: Vec<Aid> = self
                .current
                .actors()
                .into_iter()
                .filter(|a| a.enabled)
                .map(|a| a.aid)
                .collect();
            let pick = match rng.as_mut() {
                Some(rng) => rng.choose(&enabled).copied(),
                None => enabled.first().copied(),
            };
            let Some(aid) = pick else {
                break;
            };
            let mut step = self.step_with_status(aid, 0)?;
            if !want_transitions {
                step.actors.iter_mut().for_each(|a| a.transitions.clear());
            }
            steps.push(step);
        }
        debug!(steps = steps.len(), "one-way run finished");
        Ok(steps)
    }

    fn clone_checker_side(&mut self) -> Result<CheckpointId, McError> {
        let id = self.next_checkpoint;
        self.next_checkpoint += 1;
        self.checkpoints.insert(id, self.current.clone());
        Ok(id)
    }

    fn restore_checker_side(&mut self, from: Option<CheckpointId>) -> Result<(), McError> {
        self.current = match from {
            Some(id) => self
                .checkpoints
                .get(&id)
                .cloned()
                .ok_or_else(|| McError::Internal(format!("unknown checkpoint {}", id)))?,
            None => {
                let mut program = (self.factory)();
                program.run_local_steps()?;
                program
            }
        };
        Ok(())
    }

    fn release_checkpoint(&mut self, id: CheckpointId) {
        self.checkpoints.remove(&id);
    }

    fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    fn finalize_app(&mut self, _terminate_asap: bool) -> Result<(), McError> {
        self.current.finalize();
        Ok(())
    }

    fn get_maxpid(&mut self) -> Result<u32, McError> {
        Ok(self.current.max_pid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping() -> Arc<Scenario> {
        Arc::new(
            Scenario::from_toml_str(
                r#"
                [[actors]]
                ops = [{ op = "send", mailbox = 1 }]
                [[actors]]
                ops = [{ op = "recv", mailbox = 1 }]
                "#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_checkpoint_survives_further_steps() {
        let mut app = InProcessApp::scripted(ping()).unwrap();
        app.handle_simcall(Aid(1), 0, false).unwrap();
        app.wait_for_requests().unwrap();
        let checkpoint = app.clone_checker_side().unwrap();
        app.handle_simcall(Aid(2), 0, false).unwrap();
        app.wait_for_requests().unwrap();
        assert!(app.get_actors_status(false).unwrap()[0].enabled);

        app.restore_checker_side(Some(checkpoint)).unwrap();
        let status = app.get_actors_status(false).unwrap();
        assert!(!status[0].enabled, "sender waits for a receiver again");
        app.release_checkpoint(checkpoint);
        assert_eq!(app.checkpoint_count(), 0);
    }

    #[test]
    fn test_replay_reports_with_status_steps_only() {
        let mut app = InProcessApp::scripted(ping()).unwrap();
        let steps = app
            .replay_sequence(&[(Aid(1), 0)], &[(Aid(2), 0)])
            .unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].transition.aid, Aid(2));
        assert!(steps[0].actors.iter().all(|a| a.enabled));
    }

    #[test]
    fn test_go_one_way_runs_to_completion() {
        let mut app = InProcessApp::scripted(ping()).unwrap();
        let steps = app.go_one_way(None, false).unwrap();
        assert_eq!(steps.len(), 4);
        assert!(steps.last().unwrap().actors.is_empty());
        assert!(!app.check_deadlock(false).unwrap());
    }
}
