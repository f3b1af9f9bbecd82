//! Fixtures for tests

use crate::model::{Model, ModelParameters};
use crate::project::{GenerationProject, ProjectKind, StorageAttributes};
use crate::target::PeriodTargets;
use crate::timescale::{Period, Timepoint, TimepointID, Timescale, Timeseries};
use crate::units::{
    Dimensionless, EmissionsPerEnergy, Hours, MoneyPerEmissions, MoneyPerEnergy,
    MoneyPerPowerYear, Power,
};
use crate::zone::{LoadZone, LoadZoneMap, PricingNode, PricingNodeMap};
use chrono::NaiveDate;
use indexmap::{IndexMap, indexmap};
use rstest::fixture;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Number of times the sampled day is repeated to fill a year
const SCALE_TO_PERIOD: f64 = 2190.0;

#[fixture]
pub fn period() -> Period {
    Period {
        id: 2020,
        start: 2020,
        length_years: 1.0,
    }
}

/// One period of four one-hour timepoints on 1 January, scaled to a full year
#[fixture]
pub fn timescale(period: Period) -> Timescale {
    let ids: Vec<TimepointID> = (1..=4).map(|i| format!("tp{i}").into()).collect();
    let series = Timeseries {
        id: "2020_jan".into(),
        period: period.id,
        duration_of_tp: Hours(1.0),
        scale_to_period: SCALE_TO_PERIOD,
        timepoints: ids.clone(),
    };

    let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let timepoints = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let previous = if i == 0 { ids.len() - 1 } else { i - 1 };
            let timepoint = Timepoint {
                id: id.clone(),
                timestamp: day.and_hms_opt(i as u32, 0, 0).unwrap(),
                timeseries: series.id.clone(),
                period: period.id,
                duration: Hours(1.0),
                weight: SCALE_TO_PERIOD,
                weight_in_year: SCALE_TO_PERIOD / period.length_years,
                previous: ids[previous].clone(),
                is_first: i == 0,
            };
            (id.clone(), timepoint)
        })
        .collect();

    Timescale {
        periods: indexmap! {period.id => period},
        timeseries: indexmap! {series.id.clone() => series},
        timepoints,
    }
}

fn constant_series<T: Copy>(timescale: &Timescale, value: T) -> HashMap<TimepointID, T> {
    timescale
        .timepoints
        .keys()
        .map(|id| (id.clone(), value))
        .collect()
}

#[fixture]
pub fn nodes(timescale: Timescale) -> PricingNodeMap {
    let node = PricingNode {
        id: "node1".into(),
        prices: constant_series(&timescale, MoneyPerEnergy(20.0)),
    };
    indexmap! {node.id.clone() => Rc::new(node)}
}

#[fixture]
pub fn zones(timescale: Timescale) -> LoadZoneMap {
    let zone = LoadZone {
        id: "north".into(),
        load_pricing_node: "node1".into(),
        demand: constant_series(&timescale, Power(2.0)),
        hedge_premium: constant_series(&timescale, MoneyPerEnergy(1.0)),
    };
    indexmap! {zone.id.clone() => Rc::new(zone)}
}

#[fixture]
pub fn solar_project(timescale: Timescale) -> GenerationProject {
    GenerationProject {
        id: "solar".into(),
        tech: "Solar_PV".into(),
        energy_source: "Solar".into(),
        load_zone: "north".into(),
        pricing_node: "node1".into(),
        kind: ProjectKind::Variable,
        capacity_limit: Power(1000.0),
        min_build_capacity: None,
        unit_size: None,
        variant_group: None,
        hybrid_storage: None,
        is_additional: true,
        is_ra_eligible: true,
        forced_outage_rate: Dimensionless(0.0),
        scheduled_outage_rate: Dimensionless(0.0),
        annual_degradation: Dimensionless(0.0),
        cod_year: 2020,
        ppa_energy_cost: MoneyPerEnergy(30.0),
        ppa_capacity_cost: MoneyPerPowerYear(0.0),
        emission_factor: EmissionsPerEnergy(0.0),
        ccs_capture_efficiency: Dimensionless(0.0),
        ccs_energy_load: Dimensionless(0.0),
        emissions_region: None,
        predetermined: IndexMap::new(),
        capacity_factors: constant_series(&timescale, Dimensionless(0.5)),
    }
}

/// A standalone four hour battery
#[fixture]
pub fn storage_project(solar_project: GenerationProject) -> GenerationProject {
    GenerationProject {
        id: "battery".into(),
        tech: "Battery_Storage".into(),
        energy_source: "Battery".into(),
        kind: ProjectKind::Storage(StorageAttributes {
            roundtrip_efficiency: Dimensionless(0.81),
            charge_to_discharge_ratio: Dimensionless(1.0),
            energy_to_power_ratio: Some(Hours(4.0)),
            max_annual_cycles: None,
            leakage_loss: Dimensionless(0.0),
            hybrid: None,
        }),
        is_additional: false,
        ppa_energy_cost: MoneyPerEnergy(0.0),
        capacity_factors: HashMap::new(),
        ..solar_project
    }
}

#[fixture]
pub fn model(
    timescale: Timescale,
    zones: LoadZoneMap,
    nodes: PricingNodeMap,
    solar_project: GenerationProject,
    storage_project: GenerationProject,
) -> Model {
    let targets = PeriodTargets {
        renewable_target: Dimensionless(1.0),
        excess_generation_limit: Dimensionless(0.0),
        excessgen_penalty: MoneyPerEnergy(0.0),
        rec_resale_value: MoneyPerEnergy(0.0),
        internal_carbon_price: MoneyPerEmissions(0.0),
    };

    Model {
        model_path: PathBuf::new(),
        parameters: ModelParameters::default(),
        timescale,
        zones,
        nodes,
        projects: indexmap! {
            solar_project.id.clone() => Rc::new(solar_project),
            storage_project.id.clone() => Rc::new(storage_project),
        },
        targets: indexmap! {2020 => targets},
        resource_adequacy: None,
        emission_rates: HashMap::new(),
    }
}
