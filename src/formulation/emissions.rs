//! Pricing the net emissions impact of the portfolio.
use super::dispatch::DispatchVariables;
use super::storage::StorageVariables;
use super::{CostComponent, CostTerms};
use crate::model::Model;
use crate::program::LinearExpr;
use crate::project::GenerationProject;
use crate::timescale::Timepoint;
use anyhow::{Context, Result};

/// Marginal grid emission rate for a project's region in a timepoint, if it has a region
fn marginal_rate(
    model: &Model,
    project: &GenerationProject,
    tp: &Timepoint,
) -> Result<Option<f64>> {
    let Some(region) = &project.emissions_region else {
        return Ok(None);
    };

    let rate = model
        .emission_rates
        .get(&(region.clone(), tp.id.clone()))
        .with_context(|| {
            format!(
                "No emission rate for region {region} in timepoint {} (project {})",
                tp.id, project.id
            )
        })?;

    Ok(Some(rate.value()))
}

/// Net annual emissions of the portfolio in a period (tonnes/yr).
///
/// Direct emissions from contracted generation, less emissions avoided on the grid by additional
/// generation, plus emissions from the grid power used to charge storage net of what its discharge
/// displaces.
pub fn annual_emissions(
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
    period: u32,
) -> Result<LinearExpr> {
    let mut expr = LinearExpr::new();
    for tp in model.iter_timepoints(period) {
        let weight = tp.weight_in_year;

        for project in model.iter_generators() {
            let generation = dispatch.total_generation(&project.id, &tp.id);
            let uncaptured = 1.0 - project.ccs_capture_efficiency.value();
            let mut factor = project.emission_factor.value() * uncaptured;
            if project.is_additional {
                factor -= marginal_rate(model, project, tp)?.unwrap_or(0.0);
            }
            expr.add_scaled(&generation, factor * weight);
        }

        for project in model.iter_storage() {
            if let Some(rate) = marginal_rate(model, project, tp)? {
                expr.add_scaled(&storage.net_charge(&project.id, &tp.id), rate * weight);
            }
        }
    }

    Ok(expr)
}

/// Register the internal carbon price on net emissions
pub fn add_emissions_terms(
    costs: &mut CostTerms,
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
) -> Result<()> {
    for period in model.iter_periods() {
        let price = model.targets(period.id).internal_carbon_price.value();
        if price == 0.0 {
            continue;
        }

        let emissions = annual_emissions(model, dispatch, storage, period.id)?;
        costs.add(CostComponent::Emissions, period.id, &emissions, price);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, model, solar_project};
    use crate::formulation::build::add_build;
    use crate::formulation::dispatch::add_dispatch;
    use crate::formulation::storage::add_storage;
    use crate::program::Program;
    use crate::project::ProjectKind;
    use crate::units::{Dimensionless, EmissionsPerEnergy, MoneyPerEmissions};
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::rstest;
    use std::rc::Rc;

    fn formulate(model: &Model) -> (Program, DispatchVariables, StorageVariables) {
        let mut program = Program::default();
        let mut costs = CostTerms::default();
        let build = add_build(&mut program, &mut costs, model);
        let dispatch = add_dispatch(&mut program, &mut costs, model, &build);
        let storage = add_storage(&mut program, &mut costs, model, &build, &dispatch);
        (program, dispatch, storage)
    }

    fn with_region(model: &mut Model, rate: f64) {
        for project in model.projects.values_mut() {
            Rc::make_mut(project).emissions_region = Some("CAISO".into());
        }
        model.emission_rates = model
            .timescale
            .timepoints
            .keys()
            .map(|tp| (("CAISO".into(), tp.clone()), EmissionsPerEnergy(rate)))
            .collect();
    }

    #[rstest]
    fn test_avoided_and_storage_emissions(mut model: Model) {
        with_region(&mut model, 0.4);
        let (program, dispatch, storage) = formulate(&model);

        let tp = model.timescale.timepoints.values().next().unwrap();
        let mut values = vec![0.0; program.variables().len()];
        values[dispatch.dispatch(&"solar".into(), &tp.id).index()] = 10.0;
        values[storage.get(&"battery".into(), &tp.id).charge.index()] = 5.0;

        // Solar is additional, so 10 MWh avoids 4 t, while charging 5 MWh adds 2 t
        let expr = annual_emissions(&model, &dispatch, &storage, 2020).unwrap();
        assert_approx_eq!(f64, expr.evaluate(&values), -2.0 * tp.weight_in_year);
    }

    #[rstest]
    fn test_direct_emissions_with_capture(mut model: Model, mut solar_project: GenerationProject) {
        solar_project.id = "gas".into();
        solar_project.kind = ProjectKind::Dispatchable;
        solar_project.is_additional = false;
        solar_project.emission_factor = EmissionsPerEnergy(0.5);
        solar_project.ccs_capture_efficiency = Dimensionless(0.9);
        model.projects = indexmap! {solar_project.id.clone() => Rc::new(solar_project)};
        model.targets.get_mut(&2020).unwrap().internal_carbon_price = MoneyPerEmissions(100.0);
        let (program, dispatch, storage) = formulate(&model);

        let tp = model.timescale.timepoints.values().next().unwrap();
        let mut values = vec![0.0; program.variables().len()];
        values[dispatch.dispatch(&"gas".into(), &tp.id).index()] = 10.0;

        let mut costs = CostTerms::default();
        add_emissions_terms(&mut costs, &model, &dispatch, &storage).unwrap();
        let expr = costs.get(CostComponent::Emissions, 2020).unwrap();
        assert_approx_eq!(
            f64,
            expr.evaluate(&values),
            10.0 * 0.5 * 0.1 * 100.0 * tp.weight_in_year,
            epsilon = 1e-3
        );
    }

    #[rstest]
    fn test_no_price_no_terms(mut model: Model) {
        with_region(&mut model, 0.4);
        let (_, dispatch, storage) = formulate(&model);

        let mut costs = CostTerms::default();
        add_emissions_terms(&mut costs, &model, &dispatch, &storage).unwrap();
        assert!(!costs.has_component(CostComponent::Emissions));
    }

    #[rstest]
    fn test_missing_rate(mut model: Model) {
        with_region(&mut model, 0.4);
        model.emission_rates.clear();
        let (_, dispatch, storage) = formulate(&model);

        let tp = model.timescale.timepoints.keys().next().unwrap();
        assert_error!(
            annual_emissions(&model, &dispatch, &storage, 2020),
            format!("No emission rate for region CAISO in timepoint {tp} (project solar)")
        );
    }
}
