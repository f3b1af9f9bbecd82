//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
//!
//! These parameters choose which optional parts of the formulation are active for a run.
use crate::input::{input_err_msg, read_toml};
use crate::solver::SolverOptions;
use crate::units::MoneyPerEnergy;
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_resource_adequacy, bool, true);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// How the clean energy goal is measured
    #[serde(default)]
    pub goal_type: GoalType,
    /// How simultaneous charging and discharging of storage is prevented
    #[serde(default)]
    pub storage_exclusivity: StorageExclusivity,
    /// How state of charge is treated at the start of each timeseries
    #[serde(default)]
    pub storage_boundary: StorageBoundary,
    /// Whether RECs from excess generation are resold
    #[serde(default)]
    pub sell_excess_recs: ExcessSale,
    /// Whether surplus resource adequacy capacity is resold
    #[serde(default)]
    pub sell_excess_ra: ExcessSale,
    /// Whether emissions are priced in the objective
    #[serde(default)]
    pub emissions_optimization: bool,
    /// Whether resource adequacy obligations are modelled (when RA inputs are present)
    #[serde(default = "default_resource_adequacy")]
    pub resource_adequacy: bool,
    /// Whether midterm reliability requirements are enforced
    #[serde(default)]
    pub midterm_reliability: bool,
    /// Whether a congestion cost is applied to delivered generation
    #[serde(default)]
    pub congestion_pricing: bool,
    /// Whether annual excess generation is capped
    #[serde(default)]
    pub annual_excess_limit: bool,
    /// Whether excess generation in each timepoint is capped
    #[serde(default)]
    pub hourly_excess_limit: bool,
    /// How mutually exclusive project variants are handled
    #[serde(default)]
    pub select_variants: VariantSelection,
    /// Curtailment is only allowed when the nodal price is at or below this value
    #[serde(default)]
    pub curtailment_price_threshold: MoneyPerEnergy,
    /// Year to which costs are discounted (defaults to the start of the first period)
    pub base_financial_year: Option<u32>,
    /// Annual discount rate applied to costs
    #[serde(default)]
    pub discount_rate: f64,
    /// Options for the solver
    #[serde(default)]
    pub solver: SolverParameters,
}

/// Options for the solver, from the `[solver]` table
#[derive(Debug, Deserialize, PartialEq, Default)]
pub struct SolverParameters {
    /// Maximum time to spend solving
    pub time_limit_seconds: Option<f64>,
    /// Relative optimality gap for mixed-integer problems
    pub mip_rel_gap: Option<f64>,
    /// Whether to accept a feasible but possibly suboptimal solution when the time limit is hit
    #[serde(default)]
    pub accept_time_limit_solution: bool,
}

/// How the clean energy goal is measured
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Clone, Copy, Default)]
pub enum GoalType {
    /// Annual clean generation must be at least the target
    #[default]
    #[string = "annual"]
    Annual,
    /// Annual clean generation must equal the target
    #[string = "annual_equality"]
    AnnualEquality,
    /// Grid power must not exceed the untargeted share of demand
    #[string = "hourly"]
    Hourly,
}

/// How simultaneous charging and discharging is prevented
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Clone, Copy, Default)]
pub enum StorageExclusivity {
    /// Charge plus discharge may not exceed power capacity
    #[default]
    #[string = "continuous"]
    Continuous,
    /// A binary variable selects charging or discharging in each timepoint
    #[string = "binary"]
    Binary,
}

/// State-of-charge boundary condition at the start of each timeseries
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Clone, Copy, Default)]
pub enum StorageBoundary {
    /// The first timepoint follows on from the last
    #[default]
    #[string = "cyclic"]
    Cyclic,
    /// The first timepoint's state of charge is unconstrained by the recursion
    #[string = "free"]
    Free,
}

/// Whether surplus products are resold
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Clone, Copy, Default)]
pub enum ExcessSale {
    /// Surplus is kept and has no value
    #[default]
    #[string = "hold"]
    Hold,
    /// Surplus is resold
    #[string = "sell"]
    Sell,
}

/// How mutually exclusive project variants are selected
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Clone, Copy, Default)]
pub enum VariantSelection {
    /// Variant groups are ignored
    #[default]
    #[string = "none"]
    None,
    /// Exactly one variant may be built (mixed-integer)
    #[string = "binary"]
    Binary,
    /// Linear relaxation of variant selection
    #[string = "relaxed"]
    Relaxed,
}

/// Check that the `discount_rate` parameter is valid
fn check_discount_rate(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && (0.0..1.0).contains(&value),
        "discount_rate must be a finite number between 0 and 1"
    );

    Ok(())
}

/// Check that the `curtailment_price_threshold` parameter is valid
fn check_curtailment_price_threshold(value: MoneyPerEnergy) -> Result<()> {
    ensure!(
        value.is_finite(),
        "curtailment_price_threshold must be a finite number"
    );
    ensure!(
        value <= MoneyPerEnergy(0.0),
        "curtailment_price_threshold cannot be positive, as curtailment is only allowed when \
        prices are zero or negative"
    );

    Ok(())
}

impl SolverParameters {
    /// Validate solver parameters
    fn validate(&self) -> Result<()> {
        if let Some(time_limit) = self.time_limit_seconds {
            ensure!(
                time_limit.is_finite() && time_limit > 0.0,
                "time_limit_seconds must be a finite number greater than zero"
            );
        }
        if let Some(gap) = self.mip_rel_gap {
            ensure!(
                (0.0..=1.0).contains(&gap),
                "mip_rel_gap must be between 0 and 1"
            );
        }

        Ok(())
    }

    /// Options to pass to the solver
    pub fn solver_options(&self, log_output: bool) -> SolverOptions {
        SolverOptions {
            time_limit_seconds: self.time_limit_seconds,
            mip_rel_gap: self.mip_rel_gap,
            log_output,
        }
    }
}

impl Default for ModelParameters {
    /// The parameters used for an empty `model.toml`
    fn default() -> Self {
        toml::from_str("").expect("Cannot create model parameters from empty TOML file")
    }
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_discount_rate(self.discount_rate)?;
        check_curtailment_price_threshold(self.curtailment_price_threshold)?;
        self.solver.validate()?;

        if self.goal_type == GoalType::AnnualEquality && self.annual_excess_limit {
            warn!(
                "annual_excess_limit has no effect when goal_type is 'annual_equality', as \
                generation is already fixed to the target"
            );
        }
        if self.midterm_reliability && !self.resource_adequacy {
            warn!("midterm_reliability is ignored because resource_adequacy is disabled");
        }

        Ok(())
    }
}
