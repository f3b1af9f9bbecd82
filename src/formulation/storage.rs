//! Storage operation: charging, discharging and state of charge.
use super::build::BuildVariables;
use super::dispatch::DispatchVariables;
use super::{CostComponent, CostTerms};
use crate::model::Model;
use crate::model::parameters::{StorageBoundary, StorageExclusivity};
use crate::program::{ConstraintSense, LinearExpr, Program, Variable};
use crate::project::{GenerationProject, ProjectID, StorageAttributes};
use crate::timescale::{Period, TimepointID};
use indexmap::IndexMap;

/// The variables describing one storage project in one timepoint
#[derive(Clone, Copy, Debug)]
pub struct StorageTimepointVariables {
    /// Power drawn to charge
    pub charge: Variable,
    /// Power delivered by discharging
    pub discharge: Variable,
    /// Energy stored at the end of the timepoint
    pub state_of_charge: Variable,
}

/// Handles to the storage variables
pub struct StorageVariables(IndexMap<(ProjectID, TimepointID), StorageTimepointVariables>);

impl StorageVariables {
    /// Get the variables for a storage project in a timepoint.
    ///
    /// # Panics
    ///
    /// If the project is not storage or is unknown.
    pub fn get(&self, project: &ProjectID, timepoint: &TimepointID) -> StorageTimepointVariables {
        *self
            .0
            .get(&(project.clone(), timepoint.clone()))
            .expect("No storage variables found for given project and timepoint")
    }

    /// Charge minus discharge for a project in a timepoint
    pub fn net_charge(&self, project: &ProjectID, timepoint: &TimepointID) -> LinearExpr {
        let vars = self.get(project, timepoint);
        LinearExpr::from(vars.charge) - LinearExpr::from(vars.discharge)
    }

    /// Iterate over all storage variables as `(project, timepoint, variables)`
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&ProjectID, &TimepointID, StorageTimepointVariables)> {
        self.0
            .iter()
            .map(|((project, timepoint), vars)| (project, timepoint, *vars))
    }
}

/// Add storage variables, operating limits and discharge costs
pub fn add_storage(
    program: &mut Program,
    costs: &mut CostTerms,
    model: &Model,
    build: &BuildVariables,
    dispatch: &DispatchVariables,
) -> StorageVariables {
    let mut variables = StorageVariables(IndexMap::new());
    for project in model.iter_storage() {
        for tp in model.timescale.iter_timepoints() {
            let name = |var: &str| format!("{var}[{},{}]", project.id, tp.id);
            let vars = StorageTimepointVariables {
                charge: program.add_non_negative(name("ChargeStorage")),
                discharge: program.add_non_negative(name("DischargeStorage")),
                state_of_charge: program.add_non_negative(name("StateOfCharge")),
            };
            variables.0.insert((project.id.clone(), tp.id.clone()), vars);
        }
    }

    for project in model.iter_storage() {
        let Some(storage) = project.storage() else {
            continue;
        };

        for period in model.iter_periods() {
            add_operating_limits(program, model, project, storage, period, build, &variables);
            add_hybrid_limits(
                program, model, project, storage, period, build, dispatch, &variables,
            );
            if let Some(cycles) = storage.max_annual_cycles {
                add_cycle_limit(
                    program, model, project, storage, period, cycles, build, &variables,
                );
            }

            for tp in model.iter_timepoints(period.id) {
                let vars = variables.get(&project.id, &tp.id);
                costs.add_term(
                    CostComponent::StorageDischargeCost,
                    period.id,
                    vars.discharge,
                    project.ppa_energy_cost.value() * tp.weight_in_year,
                );
            }
        }
    }

    add_zonal_charge_limits(program, model, dispatch, &variables);

    variables
}

/// State of charge tracking and power limits for one storage project in one period
fn add_operating_limits(
    program: &mut Program,
    model: &Model,
    project: &GenerationProject,
    storage: &StorageAttributes,
    period: &Period,
    build: &BuildVariables,
    variables: &StorageVariables,
) {
    let id = &project.id;
    let efficiency = storage.one_way_efficiency();
    let retention = 1.0 - storage.leakage_loss.value();
    let capacity = build.capacity(id, period.start);
    let energy_capacity = build.energy_capacity(project, period.start);
    let charge_ratio = storage.charge_to_discharge_ratio.value();

    // Big M for charge/discharge exclusivity
    let max_power = project.capacity_limit.value() * charge_ratio.max(1.0);

    for tp in model.iter_timepoints(period.id) {
        let t = &tp.id;
        let vars = variables.get(id, t);

        // With a free boundary, each timeseries starts from its own initial state of charge
        let free_start =
            tp.is_first && model.parameters.storage_boundary == StorageBoundary::Free;
        let previous_soc = if free_start {
            let ts = &tp.timeseries;
            let initial = program.add_non_negative(format!("InitialStateOfCharge[{id},{ts}]"));
            program.add_constraint(
                format!("Max_Initial_State_Of_Charge[{id},{ts}]"),
                initial.into(),
                ConstraintSense::LessEqual,
                energy_capacity.clone(),
            );
            initial
        } else {
            variables.get(id, &tp.previous).state_of_charge
        };

        let duration = tp.duration.value();
        let mut stored = LinearExpr::term(previous_soc, retention);
        stored.add_term(vars.charge, efficiency * duration);
        stored.add_term(vars.discharge, -duration / efficiency);
        program.add_constraint(
            format!("Track_State_Of_Charge[{id},{t}]"),
            vars.state_of_charge.into(),
            ConstraintSense::Equal,
            stored,
        );

        program.add_constraint(
            format!("Max_State_Of_Charge[{id},{t}]"),
            vars.state_of_charge.into(),
            ConstraintSense::LessEqual,
            energy_capacity.clone(),
        );
        program.add_constraint(
            format!("Max_Discharge[{id},{t}]"),
            vars.discharge.into(),
            ConstraintSense::LessEqual,
            capacity.clone(),
        );
        program.add_constraint(
            format!("Max_Charge[{id},{t}]"),
            vars.charge.into(),
            ConstraintSense::LessEqual,
            capacity.scaled(charge_ratio),
        );

        match model.parameters.storage_exclusivity {
            StorageExclusivity::Binary => {
                let charging = program.add_binary(format!("StorageChargeMode[{id},{t}]"));
                program.add_constraint(
                    format!("Charge_Mode[{id},{t}]"),
                    vars.charge.into(),
                    ConstraintSense::LessEqual,
                    LinearExpr::term(charging, max_power),
                );
                program.add_constraint(
                    format!("Discharge_Mode[{id},{t}]"),
                    vars.discharge.into(),
                    ConstraintSense::LessEqual,
                    LinearExpr::constant(max_power) - LinearExpr::term(charging, max_power),
                );
            }
            StorageExclusivity::Continuous => {
                program.add_constraint(
                    format!("Charge_Discharge_Limit[{id},{t}]"),
                    LinearExpr::from(vars.charge) + LinearExpr::from(vars.discharge),
                    ConstraintSense::LessEqual,
                    capacity.clone(),
                );
            }
        }
    }
}

/// Limit on the number of full discharge cycles per year, averaged over a period
#[allow(clippy::too_many_arguments)]
fn add_cycle_limit(
    program: &mut Program,
    model: &Model,
    project: &GenerationProject,
    storage: &StorageAttributes,
    period: &Period,
    max_annual_cycles: f64,
    build: &BuildVariables,
    variables: &StorageVariables,
) {
    let efficiency = storage.one_way_efficiency();
    let discharged: LinearExpr = model
        .iter_timepoints(period.id)
        .map(|tp| {
            let vars = variables.get(&project.id, &tp.id);
            (vars.discharge, tp.weight / efficiency)
        })
        .collect();

    program.add_constraint(
        format!("Max_Annual_Cycles[{},{}]", project.id, period.id),
        discharged,
        ConstraintSense::LessEqual,
        build
            .energy_capacity(project, period.start)
            .scaled(max_annual_cycles * period.length_years),
    );
}

/// Charging and interconnection limits for the storage half of a hybrid
#[allow(clippy::too_many_arguments)]
fn add_hybrid_limits(
    program: &mut Program,
    model: &Model,
    project: &GenerationProject,
    storage: &StorageAttributes,
    period: &Period,
    build: &BuildVariables,
    dispatch: &DispatchVariables,
    variables: &StorageVariables,
) {
    let Some(hybrid) = &storage.hybrid else {
        return;
    };

    let id = &project.id;
    let interconnection = build.capacity(&hybrid.generator, period.start);
    for tp in model.iter_timepoints(period.id) {
        let t = &tp.id;
        let vars = variables.get(id, t);
        let generation = dispatch.dispatch(&hybrid.generator, t);

        // Hybrid storage charges only from its own generator
        program.add_constraint(
            format!("Hybrid_Charge_Limit[{id},{t}]"),
            vars.charge.into(),
            ConstraintSense::LessEqual,
            generation.into(),
        );

        program.add_constraint(
            format!("Hybrid_Interconnect_Limit[{id},{t}]"),
            LinearExpr::from(generation) + LinearExpr::from(vars.discharge)
                - LinearExpr::from(vars.charge),
            ConstraintSense::LessEqual,
            interconnection.clone(),
        );
    }
}

/// Storage may only charge from generation in the same zone, not from grid power
fn add_zonal_charge_limits(
    program: &mut Program,
    model: &Model,
    dispatch: &DispatchVariables,
    variables: &StorageVariables,
) {
    for zone in model.zones.values() {
        if !model
            .iter_projects_in_zone(&zone.id)
            .any(GenerationProject::is_storage)
        {
            continue;
        }

        for tp in model.timescale.iter_timepoints() {
            let mut charging = LinearExpr::new();
            let mut generation = LinearExpr::new();
            for project in model.iter_projects_in_zone(&zone.id) {
                if project.is_storage() {
                    charging.add_term(variables.get(&project.id, &tp.id).charge, 1.0);
                } else {
                    generation.add_term(dispatch.dispatch(&project.id, &tp.id), 1.0);
                }
            }

            program.add_constraint(
                format!("Zonal_Charge_Limit[{},{}]", zone.id, tp.id),
                charging,
                ConstraintSense::LessEqual,
                generation,
            );
        }
    }
}
