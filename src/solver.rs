//! The interface to external optimisation solvers.
//!
//! A [`Solver`] takes a fully assembled [`Program`] and returns variable values, duals and a
//! status. Solving is a single blocking call; the only way to stop it early is the time limit.
use crate::program::{FEASIBILITY_TOLERANCE, Program, VariableKind};
use anyhow::{Result, ensure};
use highs::{HighsModelStatus, RowProblem, Sense};
use log::{debug, warn};
use std::fmt;

/// The outcome of a solve
#[derive(Clone, PartialEq, Debug)]
pub enum SolveStatus {
    /// An optimal solution was found
    Optimal,
    /// The time limit was reached, but the best solution found is feasible
    TimeLimitFeasible,
    /// No feasible solution exists
    Infeasible,
    /// The objective can be improved without bound
    Unbounded,
    /// The solver failed for some other reason
    Error(String),
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimal => write!(f, "optimal"),
            Self::TimeLimitFeasible => write!(f, "time limit reached (feasible)"),
            Self::Infeasible => write!(f, "infeasible"),
            Self::Unbounded => write!(f, "unbounded"),
            Self::Error(msg) => write!(f, "error ({msg})"),
        }
    }
}

/// Options passed to the solver
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SolverOptions {
    /// Maximum wall-clock time to spend solving
    pub time_limit_seconds: Option<f64>,
    /// Relative optimality gap at which a MIP solve stops
    pub mip_rel_gap: Option<f64>,
    /// Whether to let the solver print its own progress output
    pub log_output: bool,
}

/// The raw result of a solve
#[derive(Clone, PartialEq, Debug)]
pub struct SolveResult {
    /// How the solve ended
    pub status: SolveStatus,
    /// Value of each variable, in column order (empty if no solution is available)
    pub columns: Vec<f64>,
    /// Activity of each constraint, in row order
    pub rows: Vec<f64>,
    /// Dual value of each constraint, in row order
    pub row_duals: Vec<f64>,
}

impl SolveResult {
    /// A result carrying no solution
    fn without_solution(status: SolveStatus) -> Self {
        Self {
            status,
            columns: Vec::new(),
            rows: Vec::new(),
            row_duals: Vec::new(),
        }
    }
}

/// Something that can solve a [`Program`]
pub trait Solver {
    /// Solve the program, blocking until finished or the time limit is reached.
    ///
    /// An `Err` is only returned if the solver could not be run at all; an unsuccessful solve is
    /// reported through [`SolveResult::status`].
    fn solve(&self, program: &Program, options: &SolverOptions) -> Result<SolveResult>;
}

/// Solves programs with the HiGHS library
#[derive(Default)]
pub struct HighsSolver;

impl Solver for HighsSolver {
    fn solve(&self, program: &Program, options: &SolverOptions) -> Result<SolveResult> {
        ensure!(
            !program.variables().is_empty(),
            "Cannot solve a problem with no variables"
        );

        let mut problem = RowProblem::default();
        let cols: Vec<_> = program
            .variables()
            .iter()
            .map(|def| match def.kind {
                VariableKind::Continuous => problem.add_column(def.cost, def.lower..=def.upper),
                VariableKind::Integer | VariableKind::Binary => {
                    problem.add_integer_column(def.cost, def.lower..=def.upper)
                }
            })
            .collect();

        for row in program.constraints() {
            let (lower, upper) = row.bounds();
            problem.add_row(
                lower..=upper,
                row.terms.iter().map(|(var, coeff)| (cols[var.index()], *coeff)),
            );
        }

        let mut model = problem.optimise(Sense::Minimise);
        model.set_option("output_flag", options.log_output);
        model.set_option("log_to_console", options.log_output);
        if let Some(time_limit) = options.time_limit_seconds {
            model.set_option("time_limit", time_limit);
        }
        if let Some(gap) = options.mip_rel_gap {
            model.set_option("mip_rel_gap", gap);
        }

        debug!(
            "Passing problem with {} columns and {} rows to HiGHS",
            program.variables().len(),
            program.constraints().len()
        );
        let solved = match model.try_solve() {
            Ok(solved) => solved,
            Err(status) => {
                return Ok(SolveResult::without_solution(SolveStatus::Error(
                    format!("{status:?}"),
                )));
            }
        };

        let status = solved.status();
        let status = match status {
            HighsModelStatus::Optimal => SolveStatus::Optimal,
            HighsModelStatus::Infeasible => SolveStatus::Infeasible,
            // Every column is bounded, so this can only be infeasibility
            HighsModelStatus::UnboundedOrInfeasible => SolveStatus::Infeasible,
            HighsModelStatus::Unbounded => SolveStatus::Unbounded,
            HighsModelStatus::ReachedTimeLimit => SolveStatus::TimeLimitFeasible,
            status => SolveStatus::Error(format!("{status:?}")),
        };
        if !matches!(status, SolveStatus::Optimal | SolveStatus::TimeLimitFeasible) {
            return Ok(SolveResult::without_solution(status));
        }

        let solution = solved.get_solution();
        let mut result = SolveResult {
            status,
            columns: solution.columns().to_vec(),
            rows: solution.rows().to_vec(),
            row_duals: solution.dual_rows().to_vec(),
        };

        // HiGHS reports a time-limited solve the same way whether or not it found a solution
        if result.status == SolveStatus::TimeLimitFeasible {
            if let Some(name) = program.first_violation(&result.columns, FEASIBILITY_TOLERANCE) {
                warn!("Time limit reached before a feasible solution was found ({name} violated)");
                result = SolveResult::without_solution(SolveStatus::Error(
                    "time limit reached without a feasible solution".into(),
                ));
            }
        }

        Ok(result)
    }
}
