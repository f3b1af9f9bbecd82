//! Code for reading resource adequacy requirements and capacity values.
use super::*;
use crate::adequacy::{CapacityRequirement, CapacityValue, MidtermRequirement, ResourceAdequacy};
use crate::project::{EnergySourceID, ProjectKind, ProjectMap};
use crate::timescale::Month;
use crate::units::{Dimensionless, Power};
use indexmap::IndexMap;
use serde::Deserialize;

const RA_REQUIREMENT_FILE_NAME: &str = "ra_requirement.csv";
const FLEXIBLE_RA_REQUIREMENT_FILE_NAME: &str = "flexible_ra_requirement.csv";
const CAPACITY_VALUE_FILE_NAME: &str = "ra_capacity_value.csv";
const MIDTERM_REQUIREMENT_FILE_NAME: &str = "midterm_reliability_requirement.csv";

#[derive(PartialEq, Debug, Deserialize)]
struct RequirementRaw {
    period: u32,
    month: Month,
    ra_requirement: f64,
    ra_cost: f64,
    ra_resell_value: Option<f64>,
}

#[derive(PartialEq, Debug, Deserialize)]
struct FlexibleRequirementRaw {
    period: u32,
    month: Month,
    flexible_ra_requirement: f64,
    flexible_ra_cost: f64,
    flexible_ra_resell_value: Option<f64>,
}

#[derive(PartialEq, Debug, Deserialize)]
struct CapacityValueRaw {
    period: u32,
    gen_energy_source: String,
    month: Month,
    #[serde(deserialize_with = "deserialise_proportion")]
    elcc: f64,
    ra_production_factor: Option<f64>,
}

#[derive(PartialEq, Debug, Deserialize)]
struct MidtermRequirementRaw {
    period: u32,
    month: Month,
    midterm_firm_requirement: f64,
    midterm_ldes_requirement: f64,
}

/// Read resource adequacy inputs, if the model has an RA requirement file.
///
/// Returns `None` if there is no RA requirement file. Inputs are read and checked even when RA is
/// switched off in the model parameters.
pub fn read_resource_adequacy(
    model_dir: &Path,
    timescale: &Timescale,
    projects: &ProjectMap,
    parameters: &ModelParameters,
) -> Result<Option<ResourceAdequacy>> {
    let file_path = model_dir.join(RA_REQUIREMENT_FILE_NAME);
    if !file_path.exists() {
        ensure!(
            !(parameters.resource_adequacy && parameters.midterm_reliability),
            "midterm_reliability is enabled but {RA_REQUIREMENT_FILE_NAME} was not found"
        );
        return Ok(None);
    }

    let rows = read_csv::<RequirementRaw>(&file_path)?.map(|raw| {
        (
            raw.period,
            raw.month,
            raw.ra_requirement,
            raw.ra_cost,
            raw.ra_resell_value,
        )
    });
    let requirements =
        read_requirements_from_iter(rows, timescale).with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(FLEXIBLE_RA_REQUIREMENT_FILE_NAME);
    let rows = read_csv_optional::<FlexibleRequirementRaw>(&file_path)?.map(|raw| {
        (
            raw.period,
            raw.month,
            raw.flexible_ra_requirement,
            raw.flexible_ra_cost,
            raw.flexible_ra_resell_value,
        )
    });
    let flexible_requirements = read_requirements_from_iter(rows, timescale)
        .and_then(|flexible| {
            if let Some((period, month)) = flexible
                .keys()
                .find(|key| !requirements.contains_key(*key))
            {
                bail!(
                    "Flexible RA requirement for period {period}, month {month} has no matching \
                    system RA requirement"
                );
            }
            Ok(flexible)
        })
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(MIDTERM_REQUIREMENT_FILE_NAME);
    let midterm_requirements = if parameters.midterm_reliability {
        read_midterm_requirements_from_iter(read_csv(&file_path)?, timescale)
            .with_context(|| input_err_msg(&file_path))?
    } else {
        IndexMap::new()
    };

    let file_path = model_dir.join(CAPACITY_VALUE_FILE_NAME);
    let capacity_values = read_capacity_values_from_iter(read_csv(&file_path)?, timescale)
        .with_context(|| input_err_msg(&file_path))?;

    let resource_adequacy = ResourceAdequacy {
        requirements,
        flexible_requirements,
        capacity_values,
        midterm_requirements,
    };
    check_capacity_values(&resource_adequacy, projects)
        .with_context(|| input_err_msg(&file_path))?;

    Ok(Some(resource_adequacy))
}

/// Check that a (period, month) pair refers to a known period and a valid month
fn check_period_month(timescale: &Timescale, period: u32, month: Month) -> Result<()> {
    ensure!(
        timescale.periods.contains_key(&period),
        "Unknown period {period}"
    );
    ensure!(
        (1..=12).contains(&month),
        "Invalid month {month} (must be between 1 and 12)"
    );

    Ok(())
}

fn read_requirements_from_iter<I>(
    iter: I,
    timescale: &Timescale,
) -> Result<IndexMap<(u32, Month), CapacityRequirement>>
where
    I: Iterator<Item = (u32, Month, f64, f64, Option<f64>)>,
{
    let mut requirements = HashMap::new();
    for (period, month, requirement, cost, resell_value) in iter {
        check_period_month(timescale, period, month)?;
        ensure!(
            requirement.is_finite() && requirement >= 0.0,
            "Requirement for period {period}, month {month} must be a non-negative number"
        );
        ensure!(
            cost.is_finite() && cost >= 0.0,
            "Cost for period {period}, month {month} must be a non-negative number"
        );
        let resell_value = resell_value.unwrap_or(0.0);
        ensure!(
            resell_value.is_finite() && resell_value >= 0.0,
            "Resell value for period {period}, month {month} must be a non-negative number"
        );

        // Otherwise capacity could be bought from the market and resold at a profit
        ensure!(
            resell_value <= cost,
            "Resell value for period {period}, month {month} cannot exceed the cost"
        );

        let value = CapacityRequirement {
            requirement: Power(requirement),
            cost,
            resell_value,
        };
        try_insert(&mut requirements, (period, month), value)?;
    }

    Ok(requirements
        .into_iter()
        .sorted_by_key(|(key, _)| *key)
        .collect())
}

fn read_midterm_requirements_from_iter<I>(
    iter: I,
    timescale: &Timescale,
) -> Result<IndexMap<(u32, Month), MidtermRequirement>>
where
    I: Iterator<Item = MidtermRequirementRaw>,
{
    let mut requirements = HashMap::new();
    for raw in iter {
        check_period_month(timescale, raw.period, raw.month)?;
        for value in [raw.midterm_firm_requirement, raw.midterm_ldes_requirement] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "Midterm requirements for period {}, month {} must be non-negative numbers",
                raw.period,
                raw.month
            );
        }

        let value = MidtermRequirement {
            firm: Power(raw.midterm_firm_requirement),
            long_duration_storage: Power(raw.midterm_ldes_requirement),
        };
        try_insert(&mut requirements, (raw.period, raw.month), value)?;
    }

    Ok(requirements
        .into_iter()
        .sorted_by_key(|(key, _)| *key)
        .collect())
}

fn read_capacity_values_from_iter<I>(
    iter: I,
    timescale: &Timescale,
) -> Result<HashMap<(u32, EnergySourceID, Month), CapacityValue>>
where
    I: Iterator<Item = CapacityValueRaw>,
{
    let mut values = HashMap::new();
    for raw in iter {
        check_period_month(timescale, raw.period, raw.month)?;
        let production_factor = raw.ra_production_factor.unwrap_or(0.0);
        ensure!(
            production_factor.is_finite() && production_factor >= 0.0,
            "ra_production_factor for {} in period {}, month {} must be a non-negative number",
            raw.gen_energy_source,
            raw.period,
            raw.month
        );

        let value = CapacityValue {
            elcc: Dimensionless(raw.elcc),
            production_factor,
        };
        let key = (
            raw.period,
            EnergySourceID::new(&raw.gen_energy_source),
            raw.month,
        );
        try_insert(&mut values, key, value)?;
    }

    Ok(values)
}

/// Check that every RA-eligible project has a capacity value wherever one will be needed
fn check_capacity_values(
    resource_adequacy: &ResourceAdequacy,
    projects: &ProjectMap,
) -> Result<()> {
    let keys = resource_adequacy
        .requirements
        .keys()
        .chain(resource_adequacy.midterm_requirements.keys())
        .unique();

    for (period, month) in keys {
        for project in projects.values().filter(|project| project.is_ra_eligible) {
            if project.kind == ProjectKind::Dispatchable {
                continue;
            }

            let mut sources = vec![&project.energy_source];
            if let Some(hybrid) = project.storage().and_then(|storage| storage.hybrid.as_ref()) {
                sources.push(&projects[&hybrid.generator].energy_source);
            }

            for source in sources {
                ensure!(
                    resource_adequacy
                        .capacity_value(*period, source, *month)
                        .is_some(),
                    "No capacity value given for energy source {source} (project {}) in period \
                    {period}, month {month}",
                    project.id
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, solar_project, timescale};
    use crate::project::GenerationProject;
    use indexmap::indexmap;
    use rstest::rstest;
    use std::iter;
    use std::rc::Rc;

    #[rstest]
    fn test_read_requirements_from_iter(timescale: Timescale) {
        let rows = [(2020, 8, 100.0, 5.0, Some(1.0)), (2020, 1, 80.0, 5.0, None)];
        let requirements = read_requirements_from_iter(rows.into_iter(), &timescale).unwrap();

        // Sorted by (period, month)
        assert_eq!(
            requirements.keys().copied().collect_vec(),
            vec![(2020, 1), (2020, 8)]
        );
        assert_eq!(requirements[&(2020, 1)].resell_value, 0.0);
        assert_eq!(requirements[&(2020, 8)].requirement, Power(100.0));
    }

    #[rstest]
    #[case((2020, 13, 10.0, 5.0, None), "Invalid month 13 (must be between 1 and 12)")]
    #[case((2030, 1, 10.0, 5.0, None), "Unknown period 2030")]
    #[case(
        (2020, 1, 10.0, 5.0, Some(6.0)),
        "Resell value for period 2020, month 1 cannot exceed the cost"
    )]
    fn test_read_requirements_invalid(
        timescale: Timescale,
        #[case] row: (u32, Month, f64, f64, Option<f64>),
        #[case] msg: &str,
    ) {
        assert_error!(
            read_requirements_from_iter(iter::once(row), &timescale),
            msg
        );
    }

    #[rstest]
    fn test_check_capacity_values(solar_project: GenerationProject, timescale: Timescale) {
        let mut project = solar_project;
        project.is_ra_eligible = true;
        let projects: ProjectMap = indexmap! {project.id.clone() => Rc::new(project)};

        let mut resource_adequacy = ResourceAdequacy {
            requirements: read_requirements_from_iter(
                iter::once((2020, 1, 10.0, 5.0, None)),
                &timescale,
            )
            .unwrap(),
            ..Default::default()
        };
        assert!(check_capacity_values(&resource_adequacy, &projects).is_err());

        let raw = CapacityValueRaw {
            period: 2020,
            gen_energy_source: "Solar".into(),
            month: 1,
            elcc: 0.3,
            ra_production_factor: Some(2.0),
        };
        resource_adequacy.capacity_values =
            read_capacity_values_from_iter(iter::once(raw), &timescale).unwrap();
        assert!(check_capacity_values(&resource_adequacy, &projects).is_ok());
    }
}
