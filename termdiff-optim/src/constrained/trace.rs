use std::fmt;
use std::sync::{Arc, Mutex};

use termdiff::{Expr, Graph, Var};
use tracing::trace;

use super::{AugmentedLagrangian, ConstrainedSolver, Iterate, Problem};
use crate::error::OptimError;

/// Owned copy of a [`Problem`], detached from the caller's graph.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProblemSnapshot {
    pub graph: Graph,
    pub objective: Expr,
    pub constraints: Vec<Expr>,
    pub variables: Vec<Var>,
    pub start: Vec<f64>,
}

impl ProblemSnapshot {
    pub fn of(problem: &Problem<'_>) -> Self {
        ProblemSnapshot {
            graph: problem.graph.clone(),
            objective: problem.objective,
            constraints: problem.constraints.clone(),
            variables: problem.variables.clone(),
            start: problem.start.clone(),
        }
    }

    /// Borrow the snapshot as a problem that can be solved again.
    pub fn problem(&self) -> Problem<'_> {
        Problem {
            graph: &self.graph,
            objective: self.objective,
            constraints: self.constraints.clone(),
            variables: self.variables.clone(),
            start: self.start.clone(),
        }
    }
}

/// Receives every problem a [`Minimizer`] is asked to solve, before solving
/// starts.
pub trait TraceSink: Send + Sync {
    fn record(&self, problem: &ProblemSnapshot);
}

/// Keeps recorded problems in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    problems: Mutex<Vec<ProblemSnapshot>>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    /// Recorded problems, oldest first.
    pub fn problems(&self) -> Vec<ProblemSnapshot> {
        match self.problems.lock() {
            Ok(problems) => problems.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.problems.lock() {
            Ok(problems) => problems.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TraceSink for MemorySink {
    fn record(&self, problem: &ProblemSnapshot) {
        let mut problems = match self.problems.lock() {
            Ok(problems) => problems,
            Err(poisoned) => poisoned.into_inner(),
        };
        problems.push(problem.clone());
    }
}

/// A solver plus an optional sink that sees each problem before it is solved.
pub struct Minimizer {
    solver: Box<dyn ConstrainedSolver>,
    sink: Option<Arc<dyn TraceSink>>,
}

impl Minimizer {
    pub fn new(solver: impl ConstrainedSolver + 'static) -> Self {
        Minimizer {
            solver: Box::new(solver),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn record(&self, problem: &Problem<'_>) {
        if let Some(sink) = &self.sink {
            trace!(
                nodes = problem.graph.len(),
                constraints = problem.constraints.len(),
                "recording problem"
            );
            sink.record(&ProblemSnapshot::of(problem));
        }
    }
}

impl Default for Minimizer {
    fn default() -> Self {
        Minimizer::new(AugmentedLagrangian::default())
    }
}

impl fmt::Debug for Minimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Minimizer")
            .field("traced", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl ConstrainedSolver for Minimizer {
    fn solve<'a>(&'a self, problem: &Problem<'a>) -> Result<Box<dyn Iterator<Item = Iterate> + 'a>, OptimError> {
        self.record(problem);
        self.solver.solve(problem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constrained::SolveStatus;

    #[test]
    fn sink_sees_problem_before_solving() {
        let mut g = Graph::new();
        let x = g.variable();
        let f = g.square(x);
        let c = g.scope(|| x - 2.0);
        let problem = Problem::new(&g, f, vec![c], vec![x], vec![5.0]).unwrap();

        let sink = Arc::new(MemorySink::new());
        let minimizer = Minimizer::default().with_sink(sink.clone());
        let solution = minimizer.minimize(&problem).unwrap();
        assert_eq!(solution.status, SolveStatus::Converged);

        assert_eq!(sink.len(), 1);
        let recorded = &sink.problems()[0];
        assert_eq!(recorded.start, vec![5.0]);
        assert_eq!(recorded.graph.len(), g.len());

        // The snapshot solves to the same point.
        let again = Minimizer::default().minimize(&recorded.problem()).unwrap();
        assert_eq!(again.x, solution.x);
    }

    #[test]
    fn untraced_minimizer_records_nothing() {
        let mut g = Graph::new();
        let x = g.variable();
        let c = g.scope(|| x - 1.0);
        let problem = Problem::new(&g, x.expr(), vec![c], vec![x], vec![0.0]).unwrap();
        let minimizer = Minimizer::default();
        assert!(minimizer.minimize(&problem).is_ok());
        assert!(format!("{minimizer:?}").contains("traced: false"));
    }
}
