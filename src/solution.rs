//! Interpreting the result of a solve.
use crate::model::parameters::SolverParameters;
use crate::program::{LinearExpr, Program, Variable};
use crate::project::ProjectID;
use crate::solver::{SolveResult, SolveStatus};
use anyhow::{Result, bail};
use indexmap::IndexSet;
use itertools::Itertools;
use log::warn;

/// A usable solution to a scenario's problem
#[derive(Debug)]
pub struct Solution {
    /// How the solve ended (either optimal or an accepted time-limited solve)
    pub status: SolveStatus,
    /// Value of the objective, constant offset included
    pub objective: f64,
    columns: Vec<f64>,
    rows: Vec<f64>,
    row_duals: Vec<f64>,
}

impl Solution {
    /// Check the outcome of a solve, turning any unusable status into an error.
    ///
    /// # Arguments
    ///
    /// * `program` - The program that was solved
    /// * `result` - The raw result from the solver
    /// * `parameters` - Solver parameters for the model
    /// * `flagged` - Projects flagged by the pre-solve checks, named if the problem is infeasible
    pub fn from_result(
        program: &Program,
        result: SolveResult,
        parameters: &SolverParameters,
        flagged: &IndexSet<ProjectID>,
    ) -> Result<Self> {
        match &result.status {
            SolveStatus::Optimal => {}
            SolveStatus::TimeLimitFeasible => {
                if !parameters.accept_time_limit_solution {
                    bail!(
                        "Solver reached the time limit before proving optimality. Set \
                        accept_time_limit_solution = true in model.toml to use the best solution \
                        found."
                    );
                }
                warn!("Using a solution which may not be optimal, as the time limit was reached");
            }
            SolveStatus::Infeasible => {
                if flagged.is_empty() {
                    bail!("The problem is infeasible");
                }
                bail!(
                    "The problem is infeasible. These projects were flagged before solving: {}",
                    flagged.iter().join(", ")
                );
            }
            status => bail!("Solver did not find a solution: {status}"),
        }

        Ok(Self {
            objective: program.objective_value(&result.columns),
            status: result.status,
            columns: result.columns,
            rows: result.rows,
            row_duals: result.row_duals,
        })
    }

    /// Value of a variable
    pub fn value(&self, var: Variable) -> f64 {
        self.columns[var.index()]
    }

    /// Values of all variables, in the order they were added to the program
    pub fn columns(&self) -> &[f64] {
        &self.columns
    }

    /// Value of a linear expression at the solution
    pub fn evaluate(&self, expr: &LinearExpr) -> f64 {
        expr.evaluate(&self.columns)
    }

    /// Iterate over constraints as `(name, activity, dual value)`
    pub fn iter_rows<'a>(
        &'a self,
        program: &'a Program,
    ) -> impl Iterator<Item = (&'a str, f64, f64)> {
        program
            .constraints()
            .iter()
            .zip(self.rows.iter().zip(&self.row_duals))
            .map(|(row, (value, dual))| (row.name.as_str(), *value, *dual))
    }
}
