//! Resource adequacy (RA): monthly capacity obligations met by the portfolio or bought in.
//!
//! Each project's qualifying capacity is its built capacity scaled by an effective load-carrying
//! capability (ELCC). Any shortfall against a requirement is an open position bought at market,
//! and any surplus may be resold.
use super::build::BuildVariables;
use super::{CostComponent, CostTerms};
use crate::adequacy::{CapacityValue, ResourceAdequacy};
use crate::model::Model;
use crate::model::parameters::ExcessSale;
use crate::program::{ConstraintSense, LinearExpr, Program, Variable};
use crate::project::{EnergySourceID, GenerationProject, HybridPairing, ProjectKind};
use crate::timescale::{Month, Period};
use anyhow::{Context, Result};
use indexmap::IndexMap;

/// Handles to the RA variables, plus the capacity expressions they are measured against
#[derive(Default)]
pub struct ResourceAdequacyVariables {
    /// Qualifying capacity of the portfolio per (period, month)
    pub available: IndexMap<(u32, Month), LinearExpr>,
    /// Flexible capacity of the portfolio per (period, month)
    pub flexible_available: IndexMap<(u32, Month), LinearExpr>,
    /// RA bought at market per (period, month)
    pub open_position: IndexMap<(u32, Month), Variable>,
    /// Flexible RA bought at market per (period, month)
    pub flexible_open_position: IndexMap<(u32, Month), Variable>,
    /// Surplus flexible RA that is resold, per (period, month)
    pub sellable_flexible_excess: IndexMap<(u32, Month), Variable>,
}

/// Add RA requirements, open positions and their costs
pub fn add_resource_adequacy(
    program: &mut Program,
    costs: &mut CostTerms,
    model: &Model,
    inputs: &ResourceAdequacy,
    build: &BuildVariables,
) -> Result<ResourceAdequacyVariables> {
    let sell = model.parameters.sell_excess_ra == ExcessSale::Sell;
    let mut variables = ResourceAdequacyVariables::default();

    for (&(p, month), requirement) in &inputs.requirements {
        let Some(period) = model.timescale.periods.get(&p) else {
            continue;
        };

        let available = qualifying_capacity(model, inputs, build, period, month, |_| true)?;
        let open = program.add_non_negative(format!("RAOpenPosition[{p},{month}]"));
        program.add_constraint(
            format!("RA_Requirement[{p},{month}]"),
            available.clone() + LinearExpr::from(open),
            ConstraintSense::GreaterEqual,
            LinearExpr::constant(requirement.requirement.value()),
        );
        costs.add_term(CostComponent::RaOpenPosition, p, open, requirement.cost);
        if sell {
            let excess = ra_excess(&available, requirement.requirement.value(), open);
            costs.add(CostComponent::RaResale, p, &excess, -requirement.resell_value);
        }

        variables.available.insert((p, month), available);
        variables.open_position.insert((p, month), open);
    }

    for (&(p, month), requirement) in &inputs.flexible_requirements {
        let Some(period) = model.timescale.periods.get(&p) else {
            continue;
        };

        let available = flexible_capacity(model, build, period);
        let open = program.add_non_negative(format!("FlexRAOpenPosition[{p},{month}]"));
        program.add_constraint(
            format!("Flexible_RA_Requirement[{p},{month}]"),
            available.clone() + LinearExpr::from(open),
            ConstraintSense::GreaterEqual,
            LinearExpr::constant(requirement.requirement.value()),
        );
        costs.add_term(CostComponent::FlexRaOpenPosition, p, open, requirement.cost);

        // Flexible capacity can only be resold along with the system RA it also provides
        if sell {
            let system_requirement = &inputs.requirements[&(p, month)];
            let system_excess = ra_excess(
                &variables.available[&(p, month)],
                system_requirement.requirement.value(),
                variables.open_position[&(p, month)],
            );
            let flexible_excess = ra_excess(&available, requirement.requirement.value(), open);

            let sellable = program.add_non_negative(format!("SellableExcessFlexRA[{p},{month}]"));
            program.add_constraint(
                format!("Sellable_Flex_RA_System_Limit[{p},{month}]"),
                sellable.into(),
                ConstraintSense::LessEqual,
                system_excess,
            );
            program.add_constraint(
                format!("Sellable_Flex_RA_Flexible_Limit[{p},{month}]"),
                sellable.into(),
                ConstraintSense::LessEqual,
                flexible_excess,
            );
            costs.add_term(CostComponent::RaResale, p, sellable, -requirement.resell_value);
            variables
                .sellable_flexible_excess
                .insert((p, month), sellable);
        }

        variables.flexible_available.insert((p, month), available);
        variables.flexible_open_position.insert((p, month), open);
    }

    if model.parameters.midterm_reliability {
        add_midterm_reliability(program, model, inputs, build)?;
    }

    Ok(variables)
}

/// Capacity held above the requirement, counting what was bought
fn ra_excess(available: &LinearExpr, requirement: f64, open: Variable) -> LinearExpr {
    available.clone() + LinearExpr::from(open) - LinearExpr::constant(requirement)
}

/// Qualifying capacity of RA-eligible projects matching `filter`
fn qualifying_capacity<F>(
    model: &Model,
    inputs: &ResourceAdequacy,
    build: &BuildVariables,
    period: &Period,
    month: Month,
    filter: F,
) -> Result<LinearExpr>
where
    F: Fn(&GenerationProject) -> bool,
{
    let mut expr = LinearExpr::new();
    for project in model.projects.values() {
        if !project.is_ra_eligible || !filter(project) {
            continue;
        }

        let elcc = effective_elcc(model, inputs, project, period.id, month)?;
        if elcc == 0.0 {
            continue;
        }

        // The storage half of a hybrid is credited per unit of generator capacity
        let divisor = hybrid_pairing(project).map_or(1.0, HybridPairing::midpoint_ratio);
        expr.add_scaled(&build.capacity(&project.id, period.start), elcc / divisor);
    }

    Ok(expr)
}

/// Flexible capacity: storage counts for both its charging and discharging range
fn flexible_capacity(model: &Model, build: &BuildVariables, period: &Period) -> LinearExpr {
    let mut expr = LinearExpr::new();
    for project in model.iter_storage() {
        let Some(storage) = project.storage() else {
            continue;
        };
        if project.is_ra_eligible {
            expr.add_scaled(
                &build.capacity(&project.id, period.start),
                1.0 + storage.charge_to_discharge_ratio.value(),
            );
        }
    }

    expr
}

/// The pairing of a hybrid's storage half, if this is one
fn hybrid_pairing(project: &GenerationProject) -> Option<&HybridPairing> {
    project.storage().and_then(|storage| storage.hybrid.as_ref())
}

/// Look up a capacity value, with an error naming the missing key
fn capacity_value<'a>(
    inputs: &'a ResourceAdequacy,
    period: u32,
    source: &EnergySourceID,
    month: Month,
) -> Result<&'a CapacityValue> {
    inputs
        .capacity_value(period, source, month)
        .with_context(|| {
            format!(
                "No capacity value for energy source {source} in period {period}, month {month}"
            )
        })
}

/// Energy/power ratio and capacity ratio of a hybrid's storage half
fn hybrid_storage_ratios(project: &GenerationProject) -> Result<(f64, f64)> {
    let storage = project
        .storage()
        .with_context(|| format!("Hybrid partner {} is not a storage project", project.id))?;
    let pairing = storage
        .hybrid
        .as_ref()
        .with_context(|| format!("Storage project {} is not part of a hybrid", project.id))?;
    let energy_to_power = storage.energy_to_power_ratio.with_context(|| {
        format!(
            "Hybrid storage project {} must have a fixed energy/power ratio",
            project.id
        )
    })?;

    Ok((energy_to_power.value(), pairing.midpoint_ratio()))
}

/// Qualifying capacity per MW of nameplate for a project in a period and month.
///
/// The split between the two halves of a hybrid uses the midpoint of the permitted capacity ratio
/// rather than the built ratio, which keeps the expression linear.
pub fn effective_elcc(
    model: &Model,
    inputs: &ResourceAdequacy,
    project: &GenerationProject,
    period: u32,
    month: Month,
) -> Result<f64> {
    if !project.is_ra_eligible {
        return Ok(0.0);
    }

    if project.kind == ProjectKind::Dispatchable {
        return Ok(1.0);
    }

    if let Some(pairing) = hybrid_pairing(project) {
        let generator = &model.projects[&pairing.generator];
        let (energy_to_power, ratio) = hybrid_storage_ratios(project)?;
        let elcc = capacity_value(inputs, period, &project.energy_source, month)?
            .elcc
            .value();
        let production_factor =
            capacity_value(inputs, period, &generator.energy_source, month)?.production_factor;

        return Ok((ratio * elcc).min((ratio * energy_to_power).min(production_factor) / 4.0));
    }

    let value = capacity_value(inputs, period, &project.energy_source, month)?;
    let Some(storage_id) = &project.hybrid_storage else {
        return Ok(value.elcc.value());
    };

    // The generator half is credited only for production the storage cannot shift
    let (energy_to_power, ratio) = hybrid_storage_ratios(&model.projects[storage_id])?;
    let production_factor = value.production_factor;
    if production_factor == 0.0 {
        return Ok(0.0);
    }
    let shifted = (ratio * energy_to_power).min(production_factor);

    Ok(value.elcc.value() * (production_factor - shifted) / production_factor)
}

/// Minimum qualifying capacity from new firm resources and from long-duration storage
fn add_midterm_reliability(
    program: &mut Program,
    model: &Model,
    inputs: &ResourceAdequacy,
    build: &BuildVariables,
) -> Result<()> {
    let base_year = model.base_financial_year();
    for (&(p, month), requirement) in &inputs.midterm_requirements {
        let Some(period) = model.timescale.periods.get(&p) else {
            continue;
        };

        let new_firm = qualifying_capacity(model, inputs, build, period, month, |project| {
            project.kind == ProjectKind::Baseload && project.cod_year > base_year
        })?;
        program.add_constraint(
            format!("Midterm_Firm_Requirement[{p},{month}]"),
            new_firm,
            ConstraintSense::GreaterEqual,
            LinearExpr::constant(requirement.firm.value()),
        );

        let long_duration = qualifying_capacity(model, inputs, build, period, month, |project| {
            project
                .storage()
                .is_some_and(|storage| storage.is_long_duration())
        })?;
        program.add_constraint(
            format!("Midterm_LDES_Requirement[{p},{month}]"),
            long_duration,
            ConstraintSense::GreaterEqual,
            LinearExpr::constant(requirement.long_duration_storage.value()),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adequacy::{CapacityRequirement, MidtermRequirement};
    use crate::fixture::{assert_error, model, solar_project, storage_project};
    use crate::project::ProjectID;
    use crate::formulation::build::add_build;
    use crate::units::{Dimensionless, Hours, Power};
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::{fixture, rstest};
    use std::collections::HashMap;
    use std::rc::Rc;

    fn value(elcc: f64, production_factor: f64) -> CapacityValue {
        CapacityValue {
            elcc: Dimensionless(elcc),
            production_factor,
        }
    }

    #[fixture]
    fn inputs() -> ResourceAdequacy {
        ResourceAdequacy {
            requirements: indexmap! {
                (2020, 1) => CapacityRequirement {
                    requirement: Power(10.0),
                    cost: 5.0,
                    resell_value: 2.0,
                },
            },
            flexible_requirements: indexmap! {
                (2020, 1) => CapacityRequirement {
                    requirement: Power(3.0),
                    cost: 4.0,
                    resell_value: 1.0,
                },
            },
            capacity_values: HashMap::from([
                ((2020, "Solar".into(), 1), value(0.3, 4.0)),
                ((2020, "Battery".into(), 1), value(0.9, 0.0)),
            ]),
            midterm_requirements: IndexMap::new(),
        }
    }

    fn formulate_ra(
        model: &Model,
        inputs: &ResourceAdequacy,
    ) -> (Program, CostTerms, ResourceAdequacyVariables) {
        let mut program = Program::default();
        let mut costs = CostTerms::default();
        let build = add_build(&mut program, &mut costs, model);
        let mut ra_costs = CostTerms::default();
        let variables =
            add_resource_adequacy(&mut program, &mut ra_costs, model, inputs, &build).unwrap();
        (program, ra_costs, variables)
    }

    fn make_hybrid(
        model: &mut Model,
        mut solar_project: GenerationProject,
        mut storage_project: GenerationProject,
    ) {
        if let ProjectKind::Storage(storage) = &mut storage_project.kind {
            storage.hybrid = Some(HybridPairing {
                generator: solar_project.id.clone(),
                min_ratio: Dimensionless(0.5),
                max_ratio: Dimensionless(1.0),
            });
        }
        solar_project.hybrid_storage = Some(storage_project.id.clone());
        model.projects = indexmap! {
            solar_project.id.clone() => Rc::new(solar_project),
            storage_project.id.clone() => Rc::new(storage_project),
        };
    }

    #[rstest]
    fn test_standalone_elcc(model: Model, inputs: ResourceAdequacy) {
        let elcc = |id: &str| {
            let project = &model.projects[&ProjectID::new(id)];
            effective_elcc(&model, &inputs, project, 2020, 1).unwrap()
        };
        assert_eq!(elcc("solar"), 0.3);
        assert_eq!(elcc("battery"), 0.9);
    }

    #[rstest]
    fn test_hybrid_elcc(
        mut model: Model,
        inputs: ResourceAdequacy,
        solar_project: GenerationProject,
        storage_project: GenerationProject,
    ) {
        make_hybrid(&mut model, solar_project, storage_project);
        let elcc = |id: &str| {
            let project = &model.projects[&ProjectID::new(id)];
            effective_elcc(&model, &inputs, project, 2020, 1).unwrap()
        };

        // Midpoint ratio 0.75 of a 4 hour battery shifts 3 of the 4 hours of solar production
        assert_approx_eq!(f64, elcc("battery"), 0.675);
        assert_approx_eq!(f64, elcc("solar"), 0.3 * (4.0 - 3.0) / 4.0);
    }

    #[rstest]
    fn test_ineligible_and_dispatchable(
        model: Model,
        inputs: ResourceAdequacy,
        mut solar_project: GenerationProject,
    ) {
        solar_project.is_ra_eligible = false;
        assert_eq!(
            effective_elcc(&model, &inputs, &solar_project, 2020, 1).unwrap(),
            0.0
        );

        solar_project.is_ra_eligible = true;
        solar_project.kind = ProjectKind::Dispatchable;
        solar_project.energy_source = "Gas".into();
        assert_eq!(
            effective_elcc(&model, &inputs, &solar_project, 2020, 1).unwrap(),
            1.0
        );
    }

    #[rstest]
    fn test_missing_capacity_value(model: Model, mut solar_project: GenerationProject) {
        solar_project.energy_source = "Wind".into();
        assert_error!(
            effective_elcc(
                &model,
                &ResourceAdequacy::default(),
                &solar_project,
                2020,
                1
            ),
            "No capacity value for energy source Wind in period 2020, month 1"
        );
    }

    #[rstest]
    fn test_ra_requirement(model: Model, inputs: ResourceAdequacy) {
        let (program, costs, variables) = formulate_ra(&model, &inputs);

        let solar = program.find_variable("BuildGen[solar,2020]").unwrap();
        let battery = program.find_variable("BuildGen[battery,2020]").unwrap();
        let row = program.constraint(program.find_constraint("RA_Requirement[2020,1]").unwrap());
        assert_eq!(row.sense, ConstraintSense::GreaterEqual);
        assert_eq!(row.coefficient(solar), 0.3);
        assert_eq!(row.coefficient(battery), 0.9);
        assert_eq!(row.coefficient(variables.open_position[&(2020, 1)]), 1.0);
        assert_eq!(row.rhs, 10.0);

        // Flexible RA comes from storage charging and discharging range
        let flex = program.constraint(
            program
                .find_constraint("Flexible_RA_Requirement[2020,1]")
                .unwrap(),
        );
        assert_eq!(flex.coefficient(battery), 2.0);
        assert_eq!(flex.coefficient(solar), 0.0);

        // Surplus is held by default
        assert!(costs.has_component(CostComponent::RaOpenPosition));
        assert!(costs.has_component(CostComponent::FlexRaOpenPosition));
        assert!(!costs.has_component(CostComponent::RaResale));
        assert!(variables.sellable_flexible_excess.is_empty());
    }

    #[rstest]
    fn test_ra_resale(mut model: Model, inputs: ResourceAdequacy) {
        model.parameters.sell_excess_ra = ExcessSale::Sell;
        let (program, costs, variables) = formulate_ra(&model, &inputs);

        assert!(
            program
                .find_constraint("Sellable_Flex_RA_System_Limit[2020,1]")
                .is_some()
        );

        // 20 MW of solar gives 6 MW of RA, so buying 4 MW leaves no surplus
        let solar = program.find_variable("BuildGen[solar,2020]").unwrap();
        let mut values = vec![0.0; program.variables().len()];
        values[solar.index()] = 20.0;
        values[variables.open_position[&(2020, 1)].index()] = 4.0;
        let resale = costs.get(CostComponent::RaResale, 2020).unwrap();
        assert_approx_eq!(f64, resale.evaluate(&values), 0.0, epsilon = 1e-9);

        // 10 MW more is worth $2 per MW
        values[variables.open_position[&(2020, 1)].index()] = 14.0;
        assert_approx_eq!(f64, resale.evaluate(&values), -20.0, epsilon = 1e-9);
    }

    #[rstest]
    fn test_midterm_reliability(
        mut model: Model,
        mut inputs: ResourceAdequacy,
        mut solar_project: GenerationProject,
        mut storage_project: GenerationProject,
    ) {
        solar_project.kind = ProjectKind::Baseload;
        solar_project.cod_year = 2025;
        if let ProjectKind::Storage(storage) = &mut storage_project.kind {
            storage.energy_to_power_ratio = Some(Hours(8.0));
        }
        model.projects = indexmap! {
            solar_project.id.clone() => Rc::new(solar_project),
            storage_project.id.clone() => Rc::new(storage_project),
        };
        model.parameters.midterm_reliability = true;
        inputs.midterm_requirements = indexmap! {
            (2020, 1) => MidtermRequirement {
                firm: Power(5.0),
                long_duration_storage: Power(2.0),
            },
        };
        let (program, _, _) = formulate_ra(&model, &inputs);

        let solar = program.find_variable("BuildGen[solar,2020]").unwrap();
        let battery = program.find_variable("BuildGen[battery,2020]").unwrap();
        let firm = program.constraint(
            program
                .find_constraint("Midterm_Firm_Requirement[2020,1]")
                .unwrap(),
        );
        assert_eq!(firm.coefficient(solar), 0.3);
        assert_eq!(firm.coefficient(battery), 0.0);
        assert_eq!(firm.rhs, 5.0);

        let ldes = program.constraint(
            program
                .find_constraint("Midterm_LDES_Requirement[2020,1]")
                .unwrap(),
        );
        assert_eq!(ldes.coefficient(battery), 0.9);
        assert_eq!(ldes.coefficient(solar), 0.0);
    }
}
