//! Cost components and the objective function.
use crate::model::Model;
use crate::program::{LinearExpr, Program, Variable};
use indexmap::IndexMap;
use serde::Serialize;
use strum::{Display, EnumIter};

/// A category of cost or revenue in the objective function.
///
/// Revenues are registered as negative costs.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Display, EnumIter, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CostComponent {
    /// Contract payments for energy from generators, curtailed energy included
    PpaEnergyCost,
    /// Contract payments for capacity
    PpaCapacityCost,
    /// Contract payments for energy discharged from storage
    StorageDischargeCost,
    /// Cost of buying load at the zone's settlement price
    LoadCost,
    /// Wholesale revenue from dispatched generation
    GeneratorRevenue,
    /// Wholesale revenue from excess generation
    ExcessRevenue,
    /// Net wholesale cost of charging minus discharging storage
    StorageArbitrage,
    /// Difference between nodal and load settlement prices on delivered energy
    Congestion,
    /// Premium paid on grid power
    HedgePremium,
    /// Penalty on generation above the target
    ExcessGenPenalty,
    /// Resale of certificates from excess generation
    RecResale,
    /// Purchases covering a resource adequacy shortfall
    RaOpenPosition,
    /// Purchases covering a flexible resource adequacy shortfall
    FlexRaOpenPosition,
    /// Resale of surplus resource adequacy capacity
    RaResale,
    /// Internal carbon price on net emissions
    Emissions,
}

/// Annual cost expressions, by component and period.
///
/// Expressions are in undiscounted dollars per year. Discounting is applied only when the
/// objective is set.
#[derive(Default, Debug)]
pub struct CostTerms(IndexMap<(CostComponent, u32), LinearExpr>);

impl CostTerms {
    /// Add `scale × expr` to the annual cost of a component in a period
    pub fn add(&mut self, component: CostComponent, period: u32, expr: &LinearExpr, scale: f64) {
        self.0
            .entry((component, period))
            .or_default()
            .add_scaled(expr, scale);
    }

    /// Add `coeff × var` to the annual cost of a component in a period
    pub fn add_term(&mut self, component: CostComponent, period: u32, var: Variable, coeff: f64) {
        self.0
            .entry((component, period))
            .or_default()
            .add_term(var, coeff);
    }

    /// Add a constant to the annual cost of a component in a period
    pub fn add_constant(&mut self, component: CostComponent, period: u32, value: f64) {
        self.0
            .entry((component, period))
            .or_default()
            .add_constant(value);
    }

    /// The annual cost expression for a component in a period, if any terms were registered
    pub fn get(&self, component: CostComponent, period: u32) -> Option<&LinearExpr> {
        self.0.get(&(component, period))
    }

    /// Iterate over registered expressions as `(component, period, annual cost)`
    pub fn iter(&self) -> impl Iterator<Item = (CostComponent, u32, &LinearExpr)> {
        self.0
            .iter()
            .map(|((component, period), expr)| (*component, *period, expr))
    }

    /// Whether any terms were registered for a component
    pub fn has_component(&self, component: CostComponent) -> bool {
        self.0.keys().any(|(c, _)| *c == component)
    }
}

/// Set the objective to the sum over periods of each period's discounted annual cost
pub fn set_objective(program: &mut Program, costs: &CostTerms, model: &Model) {
    for period in model.iter_periods() {
        let factor = model.discount_factor(period);
        for (_, _, expr) in costs.iter().filter(|(_, p, _)| *p == period.id) {
            program.add_to_objective(&expr.scaled(factor));
        }
    }
}
