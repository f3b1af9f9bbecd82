//! The module responsible for writing output data to disk.
use crate::formulation::{CostComponent, Formulation};
use crate::model::Model;
use crate::program::Variable;
use crate::project::ProjectID;
use crate::solution::Solution;
use crate::timescale::{Month, TimepointID};
use crate::zone::ZoneID;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "portfolio_match_results";

/// The output file name for build decisions
const BUILD_FILE_NAME: &str = "build.csv";

/// The output file name for cumulative capacity
const CAPACITY_FILE_NAME: &str = "capacity.csv";

/// The output file name for generator dispatch
const DISPATCH_FILE_NAME: &str = "dispatch.csv";

/// The output file name for storage operation
const STORAGE_DISPATCH_FILE_NAME: &str = "storage_dispatch.csv";

/// The output file name for grid power
const SYSTEM_POWER_FILE_NAME: &str = "system_power.csv";

/// The output file name for annual costs
const COSTS_FILE_NAME: &str = "costs.csv";

/// The output file name for resource adequacy positions
const RESOURCE_ADEQUACY_FILE_NAME: &str = "resource_adequacy.csv";

/// The output file name for the run summary
const SUMMARY_FILE_NAME: &str = "summary.toml";

/// The output file name for constraint duals
const DUALS_FILE_NAME: &str = "debug_duals.csv";

/// Get the default output directory for the model in the specified directory
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory, optionally replacing an existing one.
///
/// # Returns
///
/// Whether an existing non-empty directory was overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if output_dir.is_dir() {
        if output_dir.read_dir()?.next().is_none() {
            // Empty, so nothing to lose
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite to replace it."
        );
        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// A row of the build decisions file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct BuildRow {
    project: ProjectID,
    build_year: u32,
    capacity: f64,
}

/// A row of the cumulative capacity file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CapacityRow {
    project: ProjectID,
    period: u32,
    capacity: f64,
    energy_capacity: f64,
}

/// A row of the generator dispatch file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct DispatchRow {
    project: ProjectID,
    timepoint: TimepointID,
    dispatch: f64,
    excess: f64,
    curtailment: f64,
}

/// A row of the storage operation file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StorageDispatchRow {
    project: ProjectID,
    timepoint: TimepointID,
    charge: f64,
    discharge: f64,
    state_of_charge: f64,
}

/// A row of the grid power file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SystemPowerRow {
    zone: ZoneID,
    timepoint: TimepointID,
    system_power: f64,
    load: f64,
}

/// A row of the annual costs file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CostRow {
    period: u32,
    component: String,
    annual_cost: f64,
}

/// A row of the resource adequacy file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ResourceAdequacyRow {
    period: u32,
    month: Month,
    available: f64,
    open_position: f64,
    flexible_available: Option<f64>,
    flexible_open_position: Option<f64>,
}

/// A row of the constraint duals file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct DualRow {
    constraint: String,
    value: f64,
    dual: f64,
}

/// Overall results of a run
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Summary {
    /// How the solve ended
    status: String,
    /// Objective value (present value of all costs, $)
    objective: f64,
    /// Present value of each cost component ($)
    costs: BTreeMap<String, f64>,
}

/// An object for writing the results of a solved scenario to file
pub struct DataWriter<'a> {
    output_path: &'a Path,
    model: &'a Model,
    formulation: &'a Formulation,
    solution: &'a Solution,
}

impl<'a> DataWriter<'a> {
    /// Create a writer for a solved scenario
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `model` - The model that was solved
    /// * `formulation` - The problem that was solved
    /// * `solution` - The solution found
    pub fn new(
        output_path: &'a Path,
        model: &'a Model,
        formulation: &'a Formulation,
        solution: &'a Solution,
    ) -> Self {
        Self {
            output_path,
            model,
            formulation,
            solution,
        }
    }

    /// Open a CSV writer for a file in the output folder
    fn new_writer(&self, file_name: &str) -> Result<csv::Writer<File>> {
        let file_path = self.output_path.join(file_name);
        csv::Writer::from_path(&file_path)
            .with_context(|| format!("Could not create {}", file_path.display()))
    }

    /// Write all results.
    ///
    /// # Arguments
    ///
    /// * `save_debug_info` - Whether to include extra files for debugging the model
    pub fn write_all(&self, save_debug_info: bool) -> Result<()> {
        self.write_builds()?;
        self.write_capacity()?;
        self.write_dispatch()?;
        self.write_storage_dispatch()?;
        self.write_system_power()?;
        self.write_costs()?;
        self.write_resource_adequacy()?;
        self.write_summary()?;
        if save_debug_info {
            self.write_duals()?;
        }

        Ok(())
    }

    /// Write capacity built in each year
    fn write_builds(&self) -> Result<()> {
        let mut writer = self.new_writer(BUILD_FILE_NAME)?;
        for (project, build_year, var) in self.formulation.variables.build.iter_builds() {
            writer.serialize(BuildRow {
                project: project.clone(),
                build_year,
                capacity: self.solution.value(var),
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write cumulative capacity in each period
    fn write_capacity(&self) -> Result<()> {
        let build = &self.formulation.variables.build;
        let mut writer = self.new_writer(CAPACITY_FILE_NAME)?;
        for project in self.model.projects.values() {
            for period in self.model.iter_periods() {
                writer.serialize(CapacityRow {
                    project: project.id.clone(),
                    period: period.id,
                    capacity: self
                        .solution
                        .evaluate(&build.capacity(&project.id, period.start)),
                    energy_capacity: self
                        .solution
                        .evaluate(&build.energy_capacity(project, period.start)),
                })?;
            }
        }
        writer.flush()?;

        Ok(())
    }

    /// Write generator dispatch, excess and curtailment
    fn write_dispatch(&self) -> Result<()> {
        let dispatch = &self.formulation.variables.dispatch;
        let optional_value =
            |var: Option<Variable>| var.map_or(0.0, |var| self.solution.value(var));

        let mut writer = self.new_writer(DISPATCH_FILE_NAME)?;
        for (project, timepoint, var) in dispatch.iter_dispatch() {
            writer.serialize(DispatchRow {
                project: project.clone(),
                timepoint: timepoint.clone(),
                dispatch: self.solution.value(var),
                excess: optional_value(dispatch.excess(project, timepoint)),
                curtailment: optional_value(dispatch.curtailment(project, timepoint)),
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write storage charging, discharging and state of charge
    fn write_storage_dispatch(&self) -> Result<()> {
        let mut writer = self.new_writer(STORAGE_DISPATCH_FILE_NAME)?;
        for (project, timepoint, vars) in self.formulation.variables.storage.iter() {
            writer.serialize(StorageDispatchRow {
                project: project.clone(),
                timepoint: timepoint.clone(),
                charge: self.solution.value(vars.charge),
                discharge: self.solution.value(vars.discharge),
                state_of_charge: self.solution.value(vars.state_of_charge),
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write grid power alongside load
    fn write_system_power(&self) -> Result<()> {
        let mut writer = self.new_writer(SYSTEM_POWER_FILE_NAME)?;
        for (zone, timepoint, var) in self.formulation.variables.balance.iter_system_power() {
            writer.serialize(SystemPowerRow {
                zone: zone.clone(),
                timepoint: timepoint.clone(),
                system_power: self.solution.value(var),
                load: self.model.zone(zone).demand(timepoint).value(),
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write undiscounted annual costs by period and component
    fn write_costs(&self) -> Result<()> {
        let mut writer = self.new_writer(COSTS_FILE_NAME)?;
        for (component, period, expr) in self.formulation.costs.iter() {
            writer.serialize(CostRow {
                period,
                component: component.to_string(),
                annual_cost: self.solution.evaluate(expr),
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write capacity available against each RA requirement, if RA is active
    fn write_resource_adequacy(&self) -> Result<()> {
        let Some(ra) = &self.formulation.variables.resource_adequacy else {
            return Ok(());
        };

        let mut writer = self.new_writer(RESOURCE_ADEQUACY_FILE_NAME)?;
        for (key, available) in &ra.available {
            let (period, month) = *key;
            writer.serialize(ResourceAdequacyRow {
                period,
                month,
                available: self.solution.evaluate(available),
                open_position: ra
                    .open_position
                    .get(key)
                    .map_or(0.0, |var| self.solution.value(*var)),
                flexible_available: ra
                    .flexible_available
                    .get(key)
                    .map(|expr| self.solution.evaluate(expr)),
                flexible_open_position: ra
                    .flexible_open_position
                    .get(key)
                    .map(|var| self.solution.value(*var)),
            })?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write the status, objective and present value of each cost component
    fn write_summary(&self) -> Result<()> {
        let mut costs: IndexMap<CostComponent, f64> = IndexMap::new();
        for period in self.model.iter_periods() {
            let factor = self.model.discount_factor(period);
            for (component, _, expr) in self
                .formulation
                .costs
                .iter()
                .filter(|(_, p, _)| *p == period.id)
            {
                *costs.entry(component).or_default() += factor * self.solution.evaluate(expr);
            }
        }
        let summary = Summary {
            status: self.solution.status.to_string(),
            objective: self.solution.objective,
            costs: costs
                .into_iter()
                .map(|(component, cost)| (component.to_string(), cost))
                .collect(),
        };
        let file_path = self.output_path.join(SUMMARY_FILE_NAME);
        fs::write(&file_path, toml::to_string(&summary)?)?;

        Ok(())
    }

    /// Write the activity and dual value of every constraint
    fn write_duals(&self) -> Result<()> {
        let mut writer = self.new_writer(DUALS_FILE_NAME)?;
        for (name, value, dual) in self.solution.iter_rows(&self.formulation.program) {
            writer.serialize(DualRow {
                constraint: name.to_string(),
                value,
                dual,
            })?;
        }
        writer.flush()?;

        Ok(())
    }
}
