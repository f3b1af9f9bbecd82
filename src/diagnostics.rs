//! Checks run before solving, to explain likely causes of an infeasible or degenerate result.
use crate::model::Model;
use crate::model::parameters::GoalType;
use crate::project::{GenerationProject, ProjectID, ProjectKind};
use indexmap::IndexSet;
use log::warn;

/// Generation-weighted average nodal price for a project in a period ($/MWh).
///
/// Returns `None` if the project cannot generate in the period.
fn average_realised_price(model: &Model, project: &GenerationProject, period: u32) -> Option<f64> {
    let (revenue, generation) = model.iter_timepoints(period).fold(
        (0.0, 0.0),
        |(revenue, generation), tp| {
            let energy = project.capacity_factor(&tp.id) * tp.weight_in_year;
            (
                revenue + energy * model.nodal_price(project, &tp.id),
                generation + energy,
            )
        },
    );

    (generation > 0.0).then(|| revenue / generation)
}

/// Annual generation available from predetermined capacity alone in a period (MWh/yr)
fn predetermined_generation(model: &Model, period: u32) -> f64 {
    let Some(period) = model.timescale.periods.get(&period) else {
        return 0.0;
    };

    model
        .iter_generators()
        .map(|project| {
            let capacity = project.predetermined_capacity_by(period.start).value()
                * project.availability(period.start);
            model
                .iter_timepoints(period.id)
                .map(|tp| capacity * project.capacity_factor(&tp.id) * tp.weight_in_year)
                .sum::<f64>()
        })
        .sum()
}

/// Look for projects likely to cause an infeasible or unbounded problem.
///
/// A warning is logged for each problem found.
///
/// # Returns
///
/// The projects that were flagged, so they can be named again if the solve fails.
pub fn pre_solve_checks(model: &Model) -> IndexSet<ProjectID> {
    let mut flagged = IndexSet::new();

    for period in model.iter_periods() {
        for project in model
            .iter_generators()
            .filter(|project| matches!(project.kind, ProjectKind::Variable | ProjectKind::Baseload))
        {
            let Some(price) = average_realised_price(model, project, period.id) else {
                continue;
            };

            let cost = project.ppa_energy_cost.value();
            if price > cost {
                warn!(
                    "Project {} sells at an average of {price:.2} $/MWh in period {} but costs \
                    {cost:.2} $/MWh, so will likely be built to its limit",
                    project.id, period.id
                );
                flagged.insert(project.id.clone());
            }
        }
    }

    if model.parameters.goal_type == GoalType::AnnualEquality {
        for period in model.iter_periods() {
            let target =
                model.targets(period.id).renewable_target.value() * model.annual_demand(period.id);
            let existing = predetermined_generation(model, period.id);
            if existing > target {
                warn!(
                    "Predetermined capacity can generate {existing:.0} MWh in period {}, above the \
                    target of {target:.0} MWh. The target is an equality, so curtailment or \
                    excess generation must absorb the difference",
                    period.id
                );
                flagged.extend(
                    model
                        .iter_generators()
                        .filter(|project| !project.predetermined.is_empty())
                        .map(|project| project.id.clone()),
                );
            }
        }
    }

    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use crate::units::{Dimensionless, MoneyPerEnergy, Power};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use std::rc::Rc;

    fn set_ppa_cost(model: &mut Model, cost: f64) {
        let project = model.projects.get_mut("solar").unwrap();
        Rc::make_mut(project).ppa_energy_cost = MoneyPerEnergy(cost);
    }

    #[rstest]
    fn test_average_realised_price(model: Model) {
        let project = &model.projects["solar"];
        let price = average_realised_price(&model, project, 2020).unwrap();
        assert_approx_eq!(f64, price, 20.0);
    }

    #[rstest]
    fn test_no_flags_for_expensive_project(model: Model) {
        // Solar costs 30 $/MWh and sells at 20 $/MWh
        assert!(pre_solve_checks(&model).is_empty());
    }

    #[rstest]
    fn test_flags_cheap_project(mut model: Model) {
        set_ppa_cost(&mut model, 10.0);
        let flagged = pre_solve_checks(&model);
        assert_eq!(flagged.len(), 1);
        assert!(flagged.contains("solar"));
    }

    #[rstest]
    fn test_flags_predetermined_overbuild(mut model: Model) {
        model.parameters.goal_type = GoalType::AnnualEquality;
        model.targets.get_mut(&2020).unwrap().renewable_target = Dimensionless(0.5);
        let project = model.projects.get_mut("solar").unwrap();

        // 10 MW at a capacity factor of 0.5 is 5 MW on average, above the 1 MW target
        Rc::make_mut(project).predetermined.insert(2020, Power(10.0));
        let flagged = pre_solve_checks(&model);
        assert!(flagged.contains("solar"));

        model.parameters.goal_type = GoalType::Annual;
        assert!(pre_solve_checks(&model).is_empty());
    }
}
