//! Running scenarios end to end: load, check, formulate, solve and write results.
use crate::diagnostics::pre_solve_checks;
use crate::formulation::{Formulation, formulate};
use crate::input::load_model;
use crate::model::Model;
use crate::output::metadata::write_metadata;
use crate::output::{DataWriter, create_output_directory};
use crate::solution::Solution;
use crate::solver::{HighsSolver, Solver};
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::{LevelFilter, error, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the file which marks a directory as a scenario
const MODEL_FILE_NAME: &str = "model.toml";

/// Formulate and solve a loaded model.
///
/// # Arguments
///
/// * `model` - The scenario to solve
/// * `solver` - The solver to use
///
/// # Returns
///
/// The problem that was solved and its solution, or an error if no usable solution was found.
pub fn solve_model(model: &Model, solver: &impl Solver) -> Result<(Formulation, Solution)> {
    let flagged = pre_solve_checks(model);
    let formulation = formulate(model).context("Failed to formulate problem.")?;

    let log_output = ::log::max_level() != LevelFilter::Off;
    let options = model.parameters.solver.solver_options(log_output);
    info!(
        "Solving problem with {} variables and {} constraints",
        formulation.program.variables().len(),
        formulation.program.constraints().len()
    );
    let result = solver.solve(&formulation.program, &options)?;
    let solution = Solution::from_result(
        &formulation.program,
        result,
        &model.parameters.solver,
        &flagged,
    )?;
    info!(
        "Solve finished ({}), objective: {:.2}",
        solution.status, solution.objective
    );

    Ok((formulation, solution))
}

/// Solve a loaded model and write its results.
///
/// # Arguments
///
/// * `model` - The scenario to run
/// * `output_path` - An existing folder in which to save results
/// * `debug_model` - Whether to write extra files for debugging the model
pub fn run_model(model: &Model, output_path: &Path, debug_model: bool) -> Result<Solution> {
    let (formulation, solution) = solve_model(model, &HighsSolver)?;

    write_metadata(output_path, model, &formulation.program)
        .context("Failed to save metadata.")?;
    DataWriter::new(output_path, model, &formulation, &solution)
        .write_all(debug_model)
        .context("Failed to save results.")?;
    info!("Results saved to {}", output_path.display());

    Ok(solution)
}

/// Load, solve and write the results of the scenario in `model_path`.
pub fn run_scenario(model_path: &Path, output_path: &Path, debug_model: bool) -> Result<Solution> {
    let model = load_model(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    run_model(&model, output_path, debug_model)
}

/// Find the scenario directories directly inside `batch_dir`, in name order
pub fn find_scenarios(batch_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut scenarios = Vec::new();
    for entry in fs::read_dir(batch_dir)
        .with_context(|| format!("Could not read directory {}", batch_dir.display()))?
    {
        let path = entry?.path();
        if path.join(MODEL_FILE_NAME).is_file() {
            scenarios.push(path);
        }
    }
    scenarios.sort();

    ensure!(
        !scenarios.is_empty(),
        "No scenarios found in {}. Each scenario must be a directory containing {MODEL_FILE_NAME}.",
        batch_dir.display()
    );

    Ok(scenarios)
}

/// Run every scenario in `batch_dir`, one after another.
///
/// Each scenario is loaded and solved independently and writes to its own subfolder of
/// `output_path`. A failing scenario is logged and the rest still run.
///
/// # Returns
///
/// An error if any scenario failed.
pub fn run_batch(
    batch_dir: &Path,
    output_path: &Path,
    overwrite: bool,
    debug_model: bool,
) -> Result<()> {
    let scenarios = find_scenarios(batch_dir)?;
    info!("Found {} scenarios in {}", scenarios.len(), batch_dir.display());

    let mut failed = Vec::new();
    for model_path in &scenarios {
        let name = model_path
            .file_name()
            .context("Scenario cannot be in root folder")?
            .to_string_lossy()
            .into_owned();
        info!("Running scenario {name}");

        let scenario_output = output_path.join(&name);
        let result = create_output_directory(&scenario_output, overwrite)
            .context("Failed to create output directory.")
            .and_then(|_| run_scenario(model_path, &scenario_output, debug_model));
        if let Err(err) = result {
            error!("Scenario {name} failed: {err:?}");
            failed.push(name);
        }
    }

    ensure!(
        failed.is_empty(),
        "{} of {} scenarios failed: {}",
        failed.len(),
        scenarios.len(),
        failed.iter().join(", ")
    );
    info!("All {} scenarios completed", scenarios.len());

    Ok(())
}
