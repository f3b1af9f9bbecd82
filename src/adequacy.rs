//! Resource adequacy obligations and the capacity value of each energy source.
use crate::project::EnergySourceID;
use crate::timescale::Month;
use crate::units::{Dimensionless, Power};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Cost of meeting, and value of exceeding, an RA obligation in one month
#[derive(PartialEq, Debug, Clone)]
pub struct CapacityRequirement {
    /// Capacity that must be held
    pub requirement: Power,
    /// Cost per MW-month of buying capacity to cover a shortfall
    pub cost: f64,
    /// Value per MW-month of reselling surplus capacity
    pub resell_value: f64,
}

/// Capacity value of an energy source in one period and month
#[derive(PartialEq, Debug, Clone)]
pub struct CapacityValue {
    /// Effective load-carrying capability, as a fraction of nameplate
    pub elcc: Dimensionless,
    /// Hours of production credited during peak hours
    pub production_factor: f64,
}

/// Midterm reliability requirements for one period and month
#[derive(PartialEq, Debug, Clone, Default)]
pub struct MidtermRequirement {
    /// Qualifying capacity required from new firm resources
    pub firm: Power,
    /// Qualifying capacity required from long-duration storage
    pub long_duration_storage: Power,
}

/// All resource adequacy inputs for a model
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ResourceAdequacy {
    /// System RA requirement per (period, month)
    pub requirements: IndexMap<(u32, Month), CapacityRequirement>,
    /// Flexible RA requirement per (period, month)
    pub flexible_requirements: IndexMap<(u32, Month), CapacityRequirement>,
    /// Capacity value per (period, energy source, month)
    pub capacity_values: HashMap<(u32, EnergySourceID, Month), CapacityValue>,
    /// Midterm reliability requirements per (period, month)
    pub midterm_requirements: IndexMap<(u32, Month), MidtermRequirement>,
}

impl ResourceAdequacy {
    /// Get the capacity value of an energy source, if provided
    pub fn capacity_value(
        &self,
        period: u32,
        source: &EnergySourceID,
        month: Month,
    ) -> Option<&CapacityValue> {
        self.capacity_values.get(&(period, source.clone(), month))
    }
}
