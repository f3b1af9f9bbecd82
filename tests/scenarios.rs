//! Integration tests which solve small scenarios written to a temporary directory.
use itertools::Itertools;
use portfolio_match::formulation::Formulation;
use portfolio_match::input::load_model;
use portfolio_match::model::Model;
use portfolio_match::project::ProjectID;
use portfolio_match::scenario::solve_model;
use portfolio_match::solution::Solution;
use portfolio_match::solver::{HighsSolver, SolveStatus};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

const TOLERANCE: f64 = 1e-5;
const PERIOD: u32 = 2030;
const NUM_TIMEPOINTS: usize = 20;

/// Each timepoint stands for this many hours of the year
const TIMEPOINT_WEIGHT: f64 = 8760.0 / NUM_TIMEPOINTS as f64;

const PROJECTS_HEADER: &str = "generation_project,gen_tech,gen_energy_source,gen_load_zone,\
    gen_pricing_node,gen_capacity_limit_mw,gen_is_variable,gen_is_storage,ppa_energy_cost,\
    ppa_capacity_cost,storage_roundtrip_efficiency,storage_energy_to_power_ratio,\
    storage_hybrid_generation_project,storage_hybrid_min_capacity_ratio,\
    storage_hybrid_max_capacity_ratio";

/// A 10 MW wind farm and a battery which costs nothing to contract
const WIND_AND_BATTERY: &[&str] = &[
    "wind,Wind,Wind,zone,node,10,true,false,20,0,,,,,",
    "battery,Battery,Battery,zone,node,10,false,true,0,0,0.81,4,,,",
];

fn timepoint_id(index: usize) -> String {
    format!("tp{:02}", index + 1)
}

/// Write a one-period scenario with one zone, one pricing node and a flat 2 MW load.
///
/// Every variable project has a flat capacity factor of 0.3 and the grid hedge premium is $5/MWh.
fn write_scenario(
    dir: &Path,
    parameters: &str,
    projects: &[&str],
    prices: &[f64],
    target_row: &str,
) {
    assert_eq!(prices.len(), NUM_TIMEPOINTS);
    let tps = (0..NUM_TIMEPOINTS).map(timepoint_id).collect_vec();
    let per_timepoint = |prefix: &str, values: &mut dyn Iterator<Item = String>| {
        tps.iter()
            .zip(values)
            .map(|(tp, value)| format!("{prefix},{tp},{value}\n"))
            .collect::<String>()
    };

    let timepoints: String = tps
        .iter()
        .enumerate()
        .map(|(hour, tp)| format!("{tp},{PERIOD}-06-01 {hour:02}:00,day\n"))
        .collect();
    let capacity_factors: String = projects
        .iter()
        .filter(|row| row.split(',').nth(6) == Some("true"))
        .map(|row| {
            let id = row.split(',').next().unwrap_or_default();
            per_timepoint(id, &mut std::iter::repeat_with(|| "0.3".to_string()))
        })
        .collect();

    let files = [
        ("model.toml", format!("resource_adequacy = false\n{parameters}\n")),
        (
            "periods.csv",
            format!("period,period_start,period_length_years\n{PERIOD},{PERIOD},1\n"),
        ),
        (
            "timeseries.csv",
            format!(
                "timeseries,period,ts_duration_of_tp,ts_num_tps,ts_scale_to_period\n\
                day,{PERIOD},1,{NUM_TIMEPOINTS},{TIMEPOINT_WEIGHT}\n"
            ),
        ),
        (
            "timepoints.csv",
            format!("timepoint_id,timestamp,timeseries\n{timepoints}"),
        ),
        ("pricing_nodes.csv", "pricing_node\nnode\n".to_string()),
        (
            "nodal_prices.csv",
            format!(
                "pricing_node,timepoint,nodal_price\n{}",
                per_timepoint("node", &mut prices.iter().map(f64::to_string))
            ),
        ),
        (
            "load_zones.csv",
            "load_zone,load_pricing_node\nzone,node\n".to_string(),
        ),
        (
            "loads.csv",
            format!(
                "load_zone,timepoint,zone_demand_mw\n{}",
                per_timepoint("zone", &mut std::iter::repeat_with(|| "2".to_string()))
            ),
        ),
        (
            "hedge_premium_cost.csv",
            format!(
                "load_zone,timepoint,hedge_premium_cost\n{}",
                per_timepoint("zone", &mut std::iter::repeat_with(|| "5".to_string()))
            ),
        ),
        (
            "renewable_target.csv",
            format!(
                "period,renewable_target,excess_generation_limit,excessgen_penalty,\
                rec_resale_value,internal_carbon_price\n{PERIOD},{target_row}\n"
            ),
        ),
        (
            "generation_projects.csv",
            format!("{PROJECTS_HEADER}\n{}\n", projects.join("\n")),
        ),
        (
            "variable_capacity_factors.csv",
            format!("generation_project,timepoint,variable_capacity_factor\n{capacity_factors}"),
        ),
    ];
    for (name, contents) in files {
        fs::write(dir.join(name), contents).unwrap();
    }
}

fn solve(dir: &Path) -> (Model, Formulation, Solution) {
    let model = load_model(dir).unwrap();
    let (formulation, solution) = solve_model(&model, &HighsSolver).unwrap();
    assert_eq!(solution.status, SolveStatus::Optimal);
    assert_eq!(
        formulation
            .program
            .first_violation(solution.columns(), TOLERANCE),
        None
    );
    (model, formulation, solution)
}

/// Solve the wind and battery scenario with flat $30/MWh prices and a 100% annual target
fn solve_flat_wind(
    parameters: &str,
    excess_limit: &str,
) -> (TempDir, Model, Formulation, Solution) {
    let dir = tempdir().unwrap();
    write_scenario(
        dir.path(),
        parameters,
        WIND_AND_BATTERY,
        &[30.0; NUM_TIMEPOINTS],
        &format!("1.0,{excess_limit},,,"),
    );
    let (model, formulation, solution) = solve(dir.path());
    (dir, model, formulation, solution)
}

fn capacity(formulation: &Formulation, solution: &Solution, project: &str) -> f64 {
    solution.evaluate(&formulation.variables.build.capacity(&ProjectID::new(project), PERIOD))
}

/// Check that storage never holds more than its energy capacity, nor less than nothing
fn assert_state_of_charge_within_capacity(
    model: &Model,
    formulation: &Formulation,
    solution: &Solution,
) {
    let variables = &formulation.variables;
    let mut checked = 0;
    for period in model.iter_periods() {
        for project in model.iter_storage() {
            let energy_capacity =
                solution.evaluate(&variables.build.energy_capacity(project, period.start));
            for tp in model.iter_timepoints(period.id) {
                let vars = variables.storage.get(&project.id, &tp.id);
                let soc = solution.value(vars.state_of_charge);
                assert!(soc >= -TOLERANCE, "{} holds {soc} MWh at {}", project.id, tp.id);
                assert!(
                    soc <= energy_capacity + TOLERANCE,
                    "{} holds {soc} MWh at {} with {energy_capacity} MWh of capacity",
                    project.id,
                    tp.id
                );
                checked += 1;
            }
        }
    }
    assert!(checked > 0);
}

/// Generation beyond the load is sold as excess rather than curtailed or bought from the grid
#[test]
fn test_surplus_generation_is_excess() {
    let (_dir, model, formulation, solution) = solve_flat_wind("", "");
    let variables = &formulation.variables;
    let wind = ProjectID::new("wind");
    assert!((capacity(&formulation, &solution, "wind") - 10.0).abs() < TOLERANCE);

    let mut annual_excess = 0.0;
    for tp in model.iter_timepoints(PERIOD) {
        let curtailment = variables.dispatch.curtailment(&wind, &tp.id).unwrap();
        assert!(solution.value(curtailment).abs() < TOLERANCE);
        let excess = variables.dispatch.excess(&wind, &tp.id).unwrap();
        annual_excess += solution.value(excess) * tp.weight_in_year;
    }
    for (_, _, system_power) in variables.balance.iter_system_power() {
        assert!(solution.value(system_power).abs() < TOLERANCE);
    }

    // 10 MW at a capacity factor of 0.3 less the 2 MW load, for every hour of the year
    let expected = (10.0 * 0.3 - 2.0) * 8760.0;
    assert!((annual_excess - expected).abs() < 1e-6 * expected);
}

/// A 5% annual excess cap holds generation to 105% of demand, so less wind is built
#[test]
fn test_annual_excess_cap_limits_build() {
    let (_dir, _, uncapped, uncapped_solution) = solve_flat_wind("", "");
    let (_dir, _, capped, capped_solution) =
        solve_flat_wind("annual_excess_limit = true", "0.05");

    let uncapped_build = capacity(&uncapped, &uncapped_solution, "wind");
    let capped_build = capacity(&capped, &capped_solution, "wind");
    assert!(capped_build < uncapped_build - 1.0);
    assert!((capped_build - 2.0 * 1.05 / 0.3).abs() < 1e-4);
    assert!(capped_solution.objective > uncapped_solution.objective);
}

/// With a curtailment threshold of zero, output is only withheld when prices are negative
#[test]
fn test_curtailment_only_when_prices_negative() {
    let negative = [3, 14];
    let prices = (0..NUM_TIMEPOINTS)
        .map(|i| if negative.contains(&i) { -10.0 } else { 30.0 })
        .collect_vec();

    let dir = tempdir().unwrap();
    write_scenario(
        dir.path(),
        "curtailment_price_threshold = 0.0",
        &WIND_AND_BATTERY[..1],
        &prices,
        "0.5,,,,",
    );
    fs::write(
        dir.path().join("gen_build_predetermined.csv"),
        format!("generation_project,build_year,gen_predetermined_cap\nwind,{PERIOD},10\n"),
    )
    .unwrap();
    let (model, formulation, solution) = solve(dir.path());

    let wind = ProjectID::new("wind");
    let curtailed = model
        .iter_timepoints(PERIOD)
        .map(|tp| {
            let var = formulation.variables.dispatch.curtailment(&wind, &tp.id).unwrap();
            solution.value(var)
        })
        .collect_vec();
    for (i, value) in curtailed.iter().enumerate() {
        if negative.contains(&i) {
            assert!(*value > TOLERANCE, "no curtailment at {}", timepoint_id(i));
        } else {
            assert!(value.abs() < TOLERANCE, "{value} MW curtailed at {}", timepoint_id(i));
        }
    }
}

/// The storage half of a hybrid is built within its capacity ratio of the generator half
#[test]
fn test_hybrid_storage_within_ratio() {
    let dir = tempdir().unwrap();
    write_scenario(
        dir.path(),
        "",
        &[
            "pv,Solar,Solar,zone,node,10,true,false,20,0,,,,,",
            "pv_battery,Battery,Battery,zone,node,20,false,true,0,0,0.81,4,pv,0.25,0.5",
        ],
        &[30.0; NUM_TIMEPOINTS],
        "1.0,,,,",
    );
    let (model, formulation, solution) = solve(dir.path());

    let generator = capacity(&formulation, &solution, "pv");
    let storage = capacity(&formulation, &solution, "pv_battery");
    assert!(generator > 1.0);
    assert!(storage >= 0.25 * generator - TOLERANCE);
    assert!(storage <= 0.5 * generator + TOLERANCE);
    assert_state_of_charge_within_capacity(&model, &formulation, &solution);
}

/// Storage in the bundled demos stays within its energy capacity
#[test]
fn test_demo_state_of_charge_within_capacity() {
    for name in ["simple", "hourly"] {
        let (model, formulation, solution) = solve(&PathBuf::from("demos").join(name));
        assert_state_of_charge_within_capacity(&model, &formulation, &solution);
    }
}
