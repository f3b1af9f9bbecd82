//! Assembly of the optimisation problem for a model.
//!
//! The problem is built in stages. Each stage adds its own variables and constraints to a
//! [`Program`] and registers its cost terms, then hands back typed handles to the variables it
//! created. Later stages take those handles as arguments, so they cannot be run before the stages
//! they depend on:
//!
//! 1. [`build`]: capacity decisions
//! 2. [`dispatch`]: generation, excess generation and curtailment
//! 3. [`storage`]: charging, discharging and state of charge
//! 4. [`balance`]: zonal energy balance and the clean energy target
//! 5. [`pricing`]: wholesale, congestion and hedge terms
//! 6. [`resource_adequacy`] (optional): capacity obligations
//! 7. [`emissions`] (optional): carbon cost
//! 8. [`objective`]: discounting and summing all registered cost terms
use crate::model::Model;
use crate::program::Program;
use anyhow::Result;
use log::debug;

pub mod balance;
pub mod build;
pub mod dispatch;
pub mod emissions;
pub mod objective;
pub mod pricing;
pub mod resource_adequacy;
pub mod storage;

use balance::BalanceVariables;
use build::BuildVariables;
use dispatch::DispatchVariables;
pub use objective::{CostComponent, CostTerms};
use resource_adequacy::ResourceAdequacyVariables;
use storage::StorageVariables;

/// Handles to every variable in the problem, grouped by the stage that created them
pub struct Variables {
    /// Capacity decisions
    pub build: BuildVariables,
    /// Generator dispatch
    pub dispatch: DispatchVariables,
    /// Storage operation
    pub storage: StorageVariables,
    /// Grid power
    pub balance: BalanceVariables,
    /// Resource adequacy positions, if RA is active
    pub resource_adequacy: Option<ResourceAdequacyVariables>,
}

/// A fully assembled problem, ready to be solved
pub struct Formulation {
    /// The program to pass to the solver
    pub program: Program,
    /// Handles for reading results back out
    pub variables: Variables,
    /// Annual cost terms by component and period, before discounting
    pub costs: CostTerms,
}

/// Build the optimisation problem for a model.
///
/// # Arguments
///
/// * `model` - The model to formulate
///
/// # Returns
///
/// The assembled problem, or an error if the model's data cannot be expressed as a problem.
pub fn formulate(model: &Model) -> Result<Formulation> {
    let mut program = Program::default();
    let mut costs = CostTerms::default();

    let build = build::add_build(&mut program, &mut costs, model);
    let dispatch = dispatch::add_dispatch(&mut program, &mut costs, model, &build);
    let storage = storage::add_storage(&mut program, &mut costs, model, &build, &dispatch);
    let balance = balance::add_balance(&mut program, &mut costs, model, &dispatch, &storage);
    pricing::add_pricing_terms(&mut costs, model, &dispatch, &storage, &balance);

    let resource_adequacy = match model.active_resource_adequacy() {
        Some(inputs) => Some(resource_adequacy::add_resource_adequacy(
            &mut program,
            &mut costs,
            model,
            inputs,
            &build,
        )?),
        None => None,
    };

    if model.parameters.emissions_optimization {
        emissions::add_emissions_terms(&mut costs, model, &dispatch, &storage)?;
    }

    objective::set_objective(&mut program, &costs, model);
    debug!(
        "Formulated problem with {} variables and {} constraints",
        program.variables().len(),
        program.constraints().len()
    );

    Ok(Formulation {
        program,
        variables: Variables {
            build,
            dispatch,
            storage,
            balance,
            resource_adequacy,
        },
        costs,
    })
}
