//! Wholesale settlement, congestion and hedge premium costs.
//!
//! Load is bought at its zone's settlement price, while contracted generation is sold at the
//! price of the node it injects at. Grid power bought to fill the gap between the two carries an
//! extra hedge premium.
use super::balance::BalanceVariables;
use super::dispatch::DispatchVariables;
use super::storage::StorageVariables;
use super::{CostComponent, CostTerms};
use crate::model::Model;

/// Register wholesale market cost terms
pub fn add_pricing_terms(
    costs: &mut CostTerms,
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
    balance: &BalanceVariables,
) {
    for period in model.iter_periods() {
        let p = period.id;
        for tp in model.iter_timepoints(p) {
            let t = &tp.id;
            let weight = tp.weight_in_year;

            for zone in model.zones.values() {
                let demand = zone.demand(t).value();
                costs.add_constant(
                    CostComponent::LoadCost,
                    p,
                    demand * model.zone_price(zone, t) * weight,
                );
                costs.add_term(
                    CostComponent::HedgePremium,
                    p,
                    balance.system_power(&zone.id, t),
                    zone.hedge_premium(t).value() * weight,
                );
            }

            for project in model.iter_generators() {
                let price = model.nodal_price(project, t);
                let generation = dispatch.dispatch(&project.id, t);
                costs.add_term(CostComponent::GeneratorRevenue, p, generation, -price * weight);
                if let Some(excess) = dispatch.excess(&project.id, t) {
                    costs.add_term(CostComponent::ExcessRevenue, p, excess, -price * weight);
                }

                if model.parameters.congestion_pricing {
                    let zone_price = model.zone_price(model.zone(&project.load_zone), t);
                    costs.add_term(
                        CostComponent::Congestion,
                        p,
                        generation,
                        (price - zone_price) * weight,
                    );
                }
            }

            for project in model.iter_storage() {
                let price = model.nodal_price(project, t);
                costs.add(
                    CostComponent::StorageArbitrage,
                    p,
                    &storage.net_charge(&project.id, t),
                    price * weight,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use crate::formulation::balance::add_balance;
    use crate::formulation::build::add_build;
    use crate::formulation::dispatch::add_dispatch;
    use crate::formulation::storage::add_storage;
    use crate::program::Program;
    use crate::project::{GenerationProject, ProjectID};
    use crate::timescale::TimepointID;
    use crate::units::MoneyPerEnergy;
    use crate::zone::PricingNode;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use std::rc::Rc;

    struct Formulated {
        program: Program,
        costs: CostTerms,
        dispatch: DispatchVariables,
        storage: StorageVariables,
        balance: BalanceVariables,
    }

    fn formulate_pricing(model: &Model) -> Formulated {
        let mut program = Program::default();
        let mut costs = CostTerms::default();
        let build = add_build(&mut program, &mut costs, model);
        let dispatch = add_dispatch(&mut program, &mut costs, model, &build);
        let storage = add_storage(&mut program, &mut costs, model, &build, &dispatch);
        let balance = add_balance(&mut program, &mut costs, model, &dispatch, &storage);
        let mut pricing_costs = CostTerms::default();
        add_pricing_terms(&mut pricing_costs, model, &dispatch, &storage, &balance);
        Formulated {
            program,
            costs: pricing_costs,
            dispatch,
            storage,
            balance,
        }
    }

    fn first_timepoint(model: &Model) -> TimepointID {
        model.timescale.timepoints.keys().next().unwrap().clone()
    }

    #[rstest]
    fn test_load_cost_is_constant(model: Model) {
        let f = formulate_pricing(&model);

        // 2 MW at $20/MWh in every hour of the year
        let expr = f.costs.get(CostComponent::LoadCost, 2020).unwrap();
        assert!(expr.has_no_terms());
        assert_approx_eq!(
            f64,
            expr.constant_value(),
            20.0 * model.annual_demand(2020),
            epsilon = 1e-6
        );
    }

    #[rstest]
    fn test_market_terms(model: Model) {
        let f = formulate_pricing(&model);

        let tp = first_timepoint(&model);
        let weight = model.timescale.timepoint(&tp).weight_in_year;
        let mut values = vec![0.0; f.program.variables().len()];
        values[f.dispatch.dispatch(&"solar".into(), &tp).index()] = 1.0;
        values[f.storage.get(&"battery".into(), &tp).charge.index()] = 2.0;
        values[f.balance.system_power(&"north".into(), &tp).index()] = 3.0;

        let value =
            |component: CostComponent| f.costs.get(component, 2020).unwrap().evaluate(&values);
        assert_approx_eq!(f64, value(CostComponent::GeneratorRevenue), -20.0 * weight);
        assert_approx_eq!(f64, value(CostComponent::StorageArbitrage), 40.0 * weight);
        assert_approx_eq!(f64, value(CostComponent::HedgePremium), 3.0 * weight);
        assert!(!f.costs.has_component(CostComponent::Congestion));
    }

    #[rstest]
    fn test_congestion(mut model: Model) {
        // Solar sells at a node priced $5 below where load is settled
        let tps: Vec<_> = model.timescale.timepoints.keys().cloned().collect();
        let node = PricingNode {
            id: "node2".into(),
            prices: tps.iter().map(|tp| (tp.clone(), MoneyPerEnergy(15.0))).collect(),
        };
        model.nodes.insert(node.id.clone(), Rc::new(node));
        let mut solar = GenerationProject::clone(&model.projects[&ProjectID::new("solar")]);
        solar.pricing_node = "node2".into();
        model.projects.insert(solar.id.clone(), Rc::new(solar));
        model.parameters.congestion_pricing = true;
        let f = formulate_pricing(&model);

        let tp = first_timepoint(&model);
        let weight = model.timescale.timepoint(&tp).weight_in_year;
        let mut values = vec![0.0; f.program.variables().len()];
        values[f.dispatch.dispatch(&"solar".into(), &tp).index()] = 1.0;

        let congestion = f.costs.get(CostComponent::Congestion, 2020).unwrap();
        assert_approx_eq!(f64, congestion.evaluate(&values), -5.0 * weight);
    }
}
