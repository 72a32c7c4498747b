use tracing::debug;

use crate::error::PreflightError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightState {
    Pending,
    Running,
    Passed,
    Failed,
}

impl PreflightState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed)
    }
}

/// A named validation run before any command is dispatched.
pub struct PreflightStep<'a> {
    name: &'static str,
    check: Box<dyn FnMut() -> Result<(), PreflightError> + 'a>,
}

impl<'a> PreflightStep<'a> {
    pub fn new<F>(name: &'static str, check: F) -> Self
    where
        F: FnMut() -> Result<(), PreflightError> + 'a,
    {
        Self {
            name,
            check: Box::new(check),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Runs steps in declaration order and stops at the first failure.
///
/// Steps run at most once; running again after a terminal state replays the
/// recorded outcome.
pub struct PreflightChecker<'a> {
    steps: Vec<PreflightStep<'a>>,
    state: PreflightState,
    completed: Vec<&'static str>,
    failed_step: Option<&'static str>,
    failure: Option<PreflightError>,
}

impl<'a> PreflightChecker<'a> {
    pub fn new(steps: Vec<PreflightStep<'a>>) -> Self {
        Self {
            steps,
            state: PreflightState::Pending,
            completed: Vec::new(),
            failed_step: None,
            failure: None,
        }
    }

    pub fn state(&self) -> PreflightState {
        self.state
    }

    pub fn completed_steps(&self) -> &[&'static str] {
        &self.completed
    }

    pub fn failed_step(&self) -> Option<&'static str> {
        self.failed_step
    }

    pub fn run(&mut self) -> Result<(), PreflightError> {
        if self.state.is_terminal() {
            return match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            };
        }

        self.state = PreflightState::Running;
        for step in &mut self.steps {
            if let Err(err) = (step.check)() {
                debug!(step = step.name, error = %err, "preflight step failed");
                self.state = PreflightState::Failed;
                self.failed_step = Some(step.name);
                self.failure = Some(err.clone());
                return Err(err);
            }
            debug!(step = step.name, "preflight step passed");
            self.completed.push(step.name);
        }

        self.state = PreflightState::Passed;
        Ok(())
    }
}
