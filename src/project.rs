//! Generation and storage projects available for procurement.
use crate::id::define_id_type;
use crate::timescale::TimepointID;
use crate::units::{
    Dimensionless, EmissionsPerEnergy, Hours, MoneyPerEnergy, MoneyPerPowerYear, Power,
};
use crate::zone::{NodeID, ZoneID};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::rc::Rc;

define_id_type! {ProjectID, "project"}
define_id_type! {EnergySourceID, "energy source"}
define_id_type! {EmissionsRegionID, "emissions region"}
define_id_type! {VariantGroupID, "variant group"}

/// A map of [`GenerationProject`]s, keyed by project ID
pub type ProjectMap = IndexMap<ProjectID, Rc<GenerationProject>>;

/// Energy/power ratio at or above which storage counts as long-duration
pub const LONG_DURATION_STORAGE_HOURS: Hours = Hours(8.0);

/// Upper bound on energy/power ratio for storage without a fixed ratio
pub const DEFAULT_MAX_STORAGE_DURATION: Hours = Hours(24.0);

/// How a project's output is determined
#[derive(PartialEq, Debug, Clone)]
pub enum ProjectKind {
    /// Output follows a capacity factor profile and may be curtailed
    Variable,
    /// Output must follow its capacity factor profile exactly
    Baseload,
    /// Output can be chosen freely up to available capacity
    Dispatchable,
    /// Stores energy for later use
    Storage(StorageAttributes),
}

/// Physical parameters of a storage project
#[derive(PartialEq, Debug, Clone)]
pub struct StorageAttributes {
    /// Fraction of charged energy that can later be discharged
    pub roundtrip_efficiency: Dimensionless,
    /// Maximum charging power as a fraction of discharging power
    pub charge_to_discharge_ratio: Dimensionless,
    /// Fixed ratio between energy and power capacity, if any
    pub energy_to_power_ratio: Option<Hours>,
    /// Maximum number of full discharge cycles per year, if limited
    pub max_annual_cycles: Option<f64>,
    /// Fraction of stored energy lost in each timepoint
    pub leakage_loss: Dimensionless,
    /// The generator this storage is paired with, if it is the storage half of a hybrid
    pub hybrid: Option<HybridPairing>,
}

impl StorageAttributes {
    /// Efficiency of a single charge or discharge (the square root of the round-trip efficiency)
    pub fn one_way_efficiency(&self) -> f64 {
        self.roundtrip_efficiency.value().sqrt()
    }

    /// Whether this storage counts as long-duration storage
    pub fn is_long_duration(&self) -> bool {
        self.energy_to_power_ratio
            .is_some_and(|ratio| ratio >= LONG_DURATION_STORAGE_HOURS)
    }
}

/// Links the storage half of a hybrid project to its generator
#[derive(PartialEq, Debug, Clone)]
pub struct HybridPairing {
    /// The paired generator
    pub generator: ProjectID,
    /// Minimum ratio of storage power capacity to generator capacity
    pub min_ratio: Dimensionless,
    /// Maximum ratio of storage power capacity to generator capacity
    pub max_ratio: Dimensionless,
}

impl HybridPairing {
    /// The midpoint of the permitted capacity ratio range.
    ///
    /// Used where the actual ratio would make an expression nonlinear.
    pub fn midpoint_ratio(&self) -> f64 {
        (self.min_ratio.value() + self.max_ratio.value()) / 2.0
    }
}

/// A generation or storage project that can be contracted
#[derive(PartialEq, Debug, Clone)]
pub struct GenerationProject {
    /// Unique identifier for the project
    pub id: ProjectID,
    /// Technology name (e.g. `Solar_PV`)
    pub tech: String,
    /// Energy source, used to look up capacity values
    pub energy_source: EnergySourceID,
    /// The zone whose load this project serves
    pub load_zone: ZoneID,
    /// The node at which the project is settled
    pub pricing_node: NodeID,
    /// How the project's output is determined
    pub kind: ProjectKind,
    /// Maximum cumulative capacity
    pub capacity_limit: Power,
    /// If present, new builds must be zero or at least this size
    pub min_build_capacity: Option<Power>,
    /// If present, capacity is built in integer multiples of this size
    pub unit_size: Option<Power>,
    /// Group of mutually exclusive variants this project belongs to
    pub variant_group: Option<VariantGroupID>,
    /// The storage half of a hybrid, if this is a hybrid generator
    pub hybrid_storage: Option<ProjectID>,
    /// Whether the project's generation is additional to the existing system
    pub is_additional: bool,
    /// Whether the project can provide resource adequacy
    pub is_ra_eligible: bool,
    /// Fraction of time the project is unavailable due to unplanned outages
    pub forced_outage_rate: Dimensionless,
    /// Fraction of time the project is unavailable due to maintenance (baseload only)
    pub scheduled_outage_rate: Dimensionless,
    /// Fractional loss of output per year of age
    pub annual_degradation: Dimensionless,
    /// Commercial operation date
    pub cod_year: u32,
    /// Contract price per MWh generated
    pub ppa_energy_cost: MoneyPerEnergy,
    /// Contract price per MW of capacity per year
    pub ppa_capacity_cost: MoneyPerPowerYear,
    /// Direct emissions per MWh generated
    pub emission_factor: EmissionsPerEnergy,
    /// Fraction of direct emissions captured
    pub ccs_capture_efficiency: Dimensionless,
    /// Fraction of output consumed by carbon capture
    pub ccs_energy_load: Dimensionless,
    /// Region whose marginal emission rates apply to this project
    pub emissions_region: Option<EmissionsRegionID>,
    /// Capacity contracted ahead of time, keyed by build year
    pub predetermined: IndexMap<u32, Power>,
    /// Capacity factor in each timepoint (variable and baseload projects only)
    pub capacity_factors: HashMap<TimepointID, Dimensionless>,
}

impl GenerationProject {
    /// Storage attributes, if this is a storage project
    pub fn storage(&self) -> Option<&StorageAttributes> {
        match &self.kind {
            ProjectKind::Storage(storage) => Some(storage),
            _ => None,
        }
    }

    /// Whether this is a storage project
    pub fn is_storage(&self) -> bool {
        matches!(self.kind, ProjectKind::Storage(_))
    }

    /// Whether this is either half of a hybrid project
    pub fn is_hybrid(&self) -> bool {
        self.hybrid_storage.is_some()
            || self
                .storage()
                .is_some_and(|storage| storage.hybrid.is_some())
    }

    /// Fraction of nameplate capacity available in a period starting in `period_start`.
    ///
    /// Accounts for outages and, where the project degrades with age, its age at the start of the
    /// period.
    pub fn availability(&self, period_start: u32) -> f64 {
        let mut availability = 1.0 - self.forced_outage_rate.value();
        if self.kind == ProjectKind::Baseload {
            availability *= 1.0 - self.scheduled_outage_rate.value();
        }

        let age = period_start.saturating_sub(self.cod_year) as f64;
        availability *= (1.0 - self.annual_degradation.value() * age).max(0.0);

        availability
    }

    /// Capacity factor in the given timepoint.
    ///
    /// Dispatchable and storage projects have no profile and always return 1.
    pub fn capacity_factor(&self, timepoint: &TimepointID) -> f64 {
        match self.kind {
            ProjectKind::Variable | ProjectKind::Baseload => self
                .capacity_factors
                .get(timepoint)
                .map_or(1.0, |cf| cf.value()),
            ProjectKind::Dispatchable | ProjectKind::Storage(_) => 1.0,
        }
    }

    /// Total predetermined capacity built in or before `year`
    pub fn predetermined_capacity_by(&self, year: u32) -> Power {
        self.predetermined
            .iter()
            .filter(|(build_year, _)| **build_year <= year)
            .map(|(_, capacity)| *capacity)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{solar_project, storage_project};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(ProjectKind::Variable, 0.9)]
    #[case(ProjectKind::Baseload, 0.9 * 0.95)]
    #[case(ProjectKind::Dispatchable, 0.9)]
    fn test_availability_by_kind(
        mut solar_project: GenerationProject,
        #[case] kind: ProjectKind,
        #[case] expected: f64,
    ) {
        solar_project.kind = kind;
        solar_project.forced_outage_rate = Dimensionless(0.1);
        solar_project.scheduled_outage_rate = Dimensionless(0.05);
        assert_approx_eq!(f64, solar_project.availability(2020), expected);
    }

    #[rstest]
    #[case(2018, 1.0)]
    #[case(2020, 1.0)]
    #[case(2030, 0.95)]
    fn test_availability_degradation(
        mut solar_project: GenerationProject,
        #[case] period_start: u32,
        #[case] expected: f64,
    ) {
        solar_project.cod_year = 2020;
        solar_project.annual_degradation = Dimensionless(0.005);
        assert_approx_eq!(f64, solar_project.availability(period_start), expected);
    }

    #[rstest]
    fn test_capacity_factor_defaults(storage_project: GenerationProject) {
        assert_eq!(storage_project.capacity_factor(&"anything".into()), 1.0);
    }

    #[rstest]
    fn test_is_hybrid(storage_project: GenerationProject, solar_project: GenerationProject) {
        assert!(!solar_project.is_hybrid());
        assert!(!storage_project.is_hybrid());
        let mut hybrid = solar_project.clone();
        hybrid.hybrid_storage = Some("battery".into());
        assert!(hybrid.is_hybrid());
    }

    #[rstest]
    fn test_predetermined_capacity_by(mut solar_project: GenerationProject) {
        solar_project.predetermined.insert(2015, Power(5.0));
        solar_project.predetermined.insert(2025, Power(2.0));
        assert_eq!(solar_project.predetermined_capacity_by(2020), Power(5.0));
        assert_eq!(solar_project.predetermined_capacity_by(2025), Power(7.0));
    }

    #[test]
    fn test_midpoint_ratio() {
        let pairing = HybridPairing {
            generator: "solar".into(),
            min_ratio: Dimensionless(0.25),
            max_ratio: Dimensionless(0.75),
        };
        assert_approx_eq!(f64, pairing.midpoint_ratio(), 0.5);
    }
}
