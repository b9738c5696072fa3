use std::fmt;

use tracing::{debug, warn};

use super::{ConstrainedSolver, Iterate, Problem, SolveStatus};
use crate::error::OptimError;

/// Runs solvers one after another, each starting where the previous one
/// stopped.
///
/// A cheap first stage (say a [`ConstantPenalty`](super::ConstantPenalty)
/// solve) can land close to the feasible set before a more accurate stage
/// takes over. The combined sequence yields every iterate of every stage,
/// numbered consecutively. Only iterates of the last stage that runs carry a
/// final status.
pub struct Multistage {
    first: Box<dyn ConstrainedSolver>,
    rest: Vec<Box<dyn ConstrainedSolver>>,
}

impl Multistage {
    pub fn new(first: impl ConstrainedSolver + 'static) -> Self {
        Multistage {
            first: Box::new(first),
            rest: Vec::new(),
        }
    }

    /// Append a stage.
    pub fn then(mut self, next: impl ConstrainedSolver + 'static) -> Self {
        self.rest.push(Box::new(next));
        self
    }

    /// Number of stages, always at least one.
    pub fn stages(&self) -> usize {
        1 + self.rest.len()
    }
}

impl fmt::Debug for Multistage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multistage").field("stages", &self.stages()).finish()
    }
}

impl ConstrainedSolver for Multistage {
    fn solve<'a>(&'a self, problem: &Problem<'a>) -> Result<Box<dyn Iterator<Item = Iterate> + 'a>, OptimError> {
        let current = self.first.solve(problem)?;
        Ok(Box::new(Stages {
            remaining: &self.rest,
            problem: problem.clone(),
            current,
            stage: 0,
            last_x: None,
            iteration: 0,
        }))
    }
}

struct Stages<'a> {
    remaining: &'a [Box<dyn ConstrainedSolver>],
    problem: Problem<'a>,
    current: Box<dyn Iterator<Item = Iterate> + 'a>,
    stage: usize,
    last_x: Option<Vec<f64>>,
    iteration: usize,
}

impl<'a> Stages<'a> {
    /// Start the next stage from `x`. Returns false when no stage is left or
    /// the next one cannot start; in both cases the sequence ends.
    fn advance(&mut self, x: Vec<f64>) -> bool {
        let remaining: &'a [Box<dyn ConstrainedSolver>] = self.remaining;
        let Some((next, rest)) = remaining.split_first() else {
            return false;
        };
        self.remaining = rest;
        self.stage += 1;

        let started = self
            .problem
            .restarted(x)
            .and_then(|problem| next.solve(&problem));
        match started {
            Ok(iter) => {
                debug!(stage = self.stage, "starting next stage");
                self.current = iter;
                true
            }
            Err(err) => {
                warn!(stage = self.stage, %err, "stage could not start, stopping");
                self.remaining = &[];
                false
            }
        }
    }
}

impl Iterator for Stages<'_> {
    type Item = Iterate;

    fn next(&mut self) -> Option<Iterate> {
        loop {
            if let Some(mut it) = self.current.next() {
                if it.status != SolveStatus::InProgress && self.advance(it.x.clone()) {
                    it.status = SolveStatus::InProgress;
                    self.last_x = None;
                } else {
                    self.last_x = Some(it.x.clone());
                }
                it.iteration = self.iteration;
                self.iteration += 1;
                return Some(it);
            }

            // A stage ended without a final iterate; continue from its last
            // point, or from the start if it produced none.
            let x = self.last_x.take().unwrap_or_else(|| self.problem.start.clone());
            if !self.advance(x) {
                return None;
            }
        }
    }
}
