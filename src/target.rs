//! Per-period procurement goals and the prices attached to them.
use crate::units::{Dimensionless, MoneyPerEmissions, MoneyPerEnergy};
use indexmap::IndexMap;

/// A map of [`PeriodTargets`], keyed by period
pub type PeriodTargetMap = IndexMap<u32, PeriodTargets>;

/// The clean energy goal for one period
#[derive(PartialEq, Debug, Clone)]
pub struct PeriodTargets {
    /// Fraction of demand to be matched by contracted generation
    pub renewable_target: Dimensionless,
    /// Permitted excess generation, as a fraction of demand
    pub excess_generation_limit: Dimensionless,
    /// Penalty per MWh of generation above the target
    pub excessgen_penalty: MoneyPerEnergy,
    /// Value of renewable energy certificates resold from excess generation
    pub rec_resale_value: MoneyPerEnergy,
    /// Internal price applied to net emissions
    pub internal_carbon_price: MoneyPerEmissions,
}
