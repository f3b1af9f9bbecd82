//! Zonal energy balance, the clean energy goal and excess generation.
use super::dispatch::DispatchVariables;
use super::storage::StorageVariables;
use super::{CostComponent, CostTerms};
use crate::model::Model;
use crate::model::parameters::{ExcessSale, GoalType};
use crate::program::{ConstraintSense, LinearExpr, Program, Variable};
use crate::timescale::TimepointID;
use crate::zone::ZoneID;
use indexmap::IndexMap;

/// Handles to the grid power variables
pub struct BalanceVariables {
    system_power: IndexMap<(ZoneID, TimepointID), Variable>,
}

impl BalanceVariables {
    /// Grid power bought for a zone in a timepoint.
    ///
    /// # Panics
    ///
    /// If the zone or timepoint is unknown.
    pub fn system_power(&self, zone: &ZoneID, timepoint: &TimepointID) -> Variable {
        self.system_power[&(zone.clone(), timepoint.clone())]
    }

    /// Iterate over grid power variables as `(zone, timepoint, variable)`
    pub fn iter_system_power(&self) -> impl Iterator<Item = (&ZoneID, &TimepointID, Variable)> {
        self.system_power
            .iter()
            .map(|((zone, timepoint), var)| (zone, timepoint, *var))
    }
}

/// Annual generation counted towards the goal in a period, net of storage losses (MWh/yr)
pub fn annual_generation(
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
    period: u32,
) -> LinearExpr {
    let mut expr = LinearExpr::new();
    for tp in model.iter_timepoints(period) {
        for project in model.iter_generators() {
            expr.add_scaled(&dispatch.total_generation(&project.id, &tp.id), tp.weight_in_year);
        }
        for project in model.iter_storage() {
            expr.add_scaled(&storage.net_charge(&project.id, &tp.id), -tp.weight_in_year);
        }
    }

    expr
}

/// Add grid power, the energy balance, the goal and excess generation rules
pub fn add_balance(
    program: &mut Program,
    costs: &mut CostTerms,
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
) -> BalanceVariables {
    let mut variables = BalanceVariables {
        system_power: IndexMap::new(),
    };
    for zone in model.zones.values() {
        for tp in model.timescale.iter_timepoints() {
            let var = program.add_non_negative(format!("SystemPower[{},{}]", zone.id, tp.id));
            variables
                .system_power
                .insert((zone.id.clone(), tp.id.clone()), var);
        }
    }

    add_energy_balance(program, model, dispatch, storage, &variables);
    match model.parameters.goal_type {
        GoalType::Annual => add_annual_goal(program, model, dispatch, storage, false),
        GoalType::AnnualEquality => add_annual_goal(program, model, dispatch, storage, true),
        GoalType::Hourly => add_hourly_goal(program, model, &variables),
    }
    if model.parameters.annual_excess_limit {
        add_annual_excess_limit(program, model, dispatch, storage);
    }
    if model.parameters.hourly_excess_limit {
        add_hourly_excess_limits(program, model, dispatch);
    }
    add_excess_costs(costs, model, dispatch, storage);

    variables
}

/// Supply must meet load plus storage charging in every zone and timepoint
fn add_energy_balance(
    program: &mut Program,
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
    variables: &BalanceVariables,
) {
    for zone in model.zones.values() {
        for tp in model.timescale.iter_timepoints() {
            let mut supply = LinearExpr::from(variables.system_power(&zone.id, &tp.id));
            for project in model.iter_projects_in_zone(&zone.id) {
                if project.is_storage() {
                    supply.add_scaled(&storage.net_charge(&project.id, &tp.id), -1.0);
                } else {
                    // Carbon capture consumes part of the project's own output
                    let delivered = 1.0 - project.ccs_energy_load.value();
                    supply.add_term(dispatch.dispatch(&project.id, &tp.id), delivered);
                }
            }

            program.add_constraint(
                format!("Zone_Energy_Balance[{},{}]", zone.id, tp.id),
                supply,
                ConstraintSense::Equal,
                LinearExpr::constant(zone.demand(&tp.id).value()),
            );
        }
    }
}

/// Annual clean generation must reach (or, with `equality`, exactly meet) the target
fn add_annual_goal(
    program: &mut Program,
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
    equality: bool,
) {
    let sense = if equality {
        ConstraintSense::Equal
    } else {
        ConstraintSense::GreaterEqual
    };

    for period in model.iter_periods() {
        let target = model.targets(period.id).renewable_target.value();
        program.add_constraint(
            format!("Renewable_Target[{}]", period.id),
            annual_generation(model, dispatch, storage, period.id),
            sense,
            LinearExpr::constant(target * model.annual_demand(period.id)),
        );
    }
}

/// Grid power may only make up the untargeted share of each zone's demand
fn add_hourly_goal(program: &mut Program, model: &Model, variables: &BalanceVariables) {
    for period in model.iter_periods() {
        let target = model.targets(period.id).renewable_target.value();
        for zone in model.zones.values() {
            let mut grid_power = LinearExpr::new();
            let mut demand = 0.0;
            for tp in model.iter_timepoints(period.id) {
                grid_power.add_term(variables.system_power(&zone.id, &tp.id), tp.weight_in_year);
                demand += zone.demand(&tp.id).value() * tp.weight_in_year;
            }

            program.add_constraint(
                format!("Hourly_Target[{},{}]", zone.id, period.id),
                grid_power,
                ConstraintSense::LessEqual,
                LinearExpr::constant((1.0 - target) * demand),
            );
        }
    }
}

/// Cap annual generation at demand plus the allowed excess
fn add_annual_excess_limit(
    program: &mut Program,
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
) {
    for period in model.iter_periods() {
        let limit = model.targets(period.id).excess_generation_limit.value();
        program.add_constraint(
            format!("Annual_Excess_Limit[{}]", period.id),
            annual_generation(model, dispatch, storage, period.id),
            ConstraintSense::LessEqual,
            LinearExpr::constant(model.annual_demand(period.id) * (1.0 + limit)),
        );
    }
}

/// Cap excess generation in each zone and timepoint as a share of load
fn add_hourly_excess_limits(program: &mut Program, model: &Model, dispatch: &DispatchVariables) {
    for period in model.iter_periods() {
        let limit = model.targets(period.id).excess_generation_limit.value();
        for zone in model.zones.values() {
            for tp in model.iter_timepoints(period.id) {
                let excess: LinearExpr = model
                    .iter_projects_in_zone(&zone.id)
                    .filter_map(|project| dispatch.excess(&project.id, &tp.id))
                    .map(|var| (var, 1.0))
                    .collect();
                if excess.has_no_terms() {
                    continue;
                }

                program.add_constraint(
                    format!("Hourly_Excess_Limit[{},{}]", zone.id, tp.id),
                    excess,
                    ConstraintSense::LessEqual,
                    LinearExpr::constant(zone.demand(&tp.id).value() * limit),
                );
            }
        }
    }
}

/// Excess generation penalty and certificate resale
fn add_excess_costs(
    costs: &mut CostTerms,
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
) {
    let sell_recs = model.parameters.sell_excess_recs == ExcessSale::Sell;

    for period in model.iter_periods() {
        let targets = model.targets(period.id);
        let penalty = targets.excessgen_penalty.value();

        let mut annual_excess = LinearExpr::new();
        for tp in model.iter_timepoints(period.id) {
            for project in model.iter_generators() {
                if let Some(excess) = dispatch.excess(&project.id, &tp.id) {
                    annual_excess.add_term(excess, tp.weight_in_year);
                }
            }
        }

        match model.parameters.goal_type {
            GoalType::Hourly if penalty != 0.0 => {
                costs.add(CostComponent::ExcessGenPenalty, period.id, &annual_excess, penalty);
            }
            GoalType::Annual if penalty != 0.0 => {
                let target = targets.renewable_target.value() * model.annual_demand(period.id);
                let over_target = annual_generation(model, dispatch, storage, period.id)
                    - LinearExpr::constant(target);
                costs.add(CostComponent::ExcessGenPenalty, period.id, &over_target, penalty);
            }
            _ => {}
        }

        if sell_recs && !annual_excess.has_no_terms() {
            costs.add(
                CostComponent::RecResale,
                period.id,
                &annual_excess,
                -targets.rec_resale_value.value(),
            );
        }
    }
}
