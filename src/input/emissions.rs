//! Code for reading marginal grid emission rates.
use super::*;
use crate::project::{EmissionsRegionID, ProjectMap};
use crate::units::EmissionsPerEnergy;
use indexmap::IndexSet;
use serde::Deserialize;

const EMISSION_RATES_FILE_NAME: &str = "emissions_rates.csv";

#[derive(PartialEq, Debug, Deserialize)]
struct EmissionRateRaw {
    emissions_region: String,
    timepoint: String,
    lrmer: f64,
}

/// Read long-run marginal emission rates for each emissions region.
///
/// The file is optional. When emissions are being optimised, every region referenced by a project
/// must have a rate for every timepoint.
pub fn read_emission_rates(
    model_dir: &Path,
    timescale: &Timescale,
    projects: &ProjectMap,
    parameters: &ModelParameters,
) -> Result<HashMap<(EmissionsRegionID, TimepointID), EmissionsPerEnergy>> {
    let file_path = model_dir.join(EMISSION_RATES_FILE_NAME);
    let required_regions: IndexSet<_> = if parameters.emissions_optimization {
        projects
            .values()
            .filter_map(|project| project.emissions_region.clone())
            .collect()
    } else {
        IndexSet::new()
    };

    read_emission_rates_from_iter(
        read_csv_optional(&file_path)?,
        timescale,
        &required_regions,
    )
    .with_context(|| input_err_msg(&file_path))
}

fn read_emission_rates_from_iter<I>(
    iter: I,
    timescale: &Timescale,
    required_regions: &IndexSet<EmissionsRegionID>,
) -> Result<HashMap<(EmissionsRegionID, TimepointID), EmissionsPerEnergy>>
where
    I: Iterator<Item = EmissionRateRaw>,
{
    let rows = iter.collect_vec();
    let regions: IndexSet<EmissionsRegionID> = rows
        .iter()
        .map(|raw| raw.emissions_region.as_str().into())
        .collect();

    let rows = rows.into_iter().map(|raw| -> Result<_> {
        ensure!(
            raw.lrmer.is_finite() && raw.lrmer >= 0.0,
            "lrmer for region {} in timepoint {} must be a non-negative number",
            raw.emissions_region,
            raw.timepoint
        );
        Ok((
            raw.emissions_region,
            raw.timepoint,
            EmissionsPerEnergy(raw.lrmer),
        ))
    });
    let series = read_timepoint_series(
        rows.collect::<Result<Vec<_>>>()?.into_iter(),
        &regions,
        timescale,
    )?;

    for region in required_regions {
        let rates = series
            .get(region)
            .with_context(|| format!("No emission rates given for region {region}"))?;
        check_timepoint_coverage(
            rates,
            timescale,
            &format!("emission rate for region {region}"),
        )?;
    }

    Ok(series
        .into_iter()
        .flat_map(|(region, rates)| {
            rates
                .into_iter()
                .map(move |(timepoint, rate)| ((region.clone(), timepoint), rate))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, timescale};
    use rstest::rstest;

    fn rates_raw(timescale: &Timescale, region: &str) -> Vec<EmissionRateRaw> {
        timescale
            .timepoints
            .keys()
            .map(|tp| EmissionRateRaw {
                emissions_region: region.into(),
                timepoint: tp.to_string(),
                lrmer: 0.4,
            })
            .collect()
    }

    #[rstest]
    fn test_read_emission_rates_from_iter(timescale: Timescale) {
        let required: IndexSet<_> = [EmissionsRegionID::new("CAISO")].into_iter().collect();
        let rates = read_emission_rates_from_iter(
            rates_raw(&timescale, "CAISO").into_iter(),
            &timescale,
            &required,
        )
        .unwrap();
        assert_eq!(rates.len(), timescale.timepoints.len());
        let tp = timescale.timepoints.keys().next().unwrap().clone();
        assert_eq!(rates[&("CAISO".into(), tp)], EmissionsPerEnergy(0.4));
    }

    #[rstest]
    fn test_read_emission_rates_missing_region(timescale: Timescale) {
        let required: IndexSet<_> = [EmissionsRegionID::new("PJM")].into_iter().collect();
        assert_error!(
            read_emission_rates_from_iter(
                rates_raw(&timescale, "CAISO").into_iter(),
                &timescale,
                &required
            ),
            "No emission rates given for region PJM"
        );
    }

    #[rstest]
    fn test_read_emission_rates_incomplete(timescale: Timescale) {
        let required: IndexSet<_> = [EmissionsRegionID::new("CAISO")].into_iter().collect();
        let mut rows = rates_raw(&timescale, "CAISO");
        rows.pop();
        assert!(read_emission_rates_from_iter(rows.into_iter(), &timescale, &required).is_err());

        // Incomplete series are fine for regions no project needs
        let rows = rates_raw(&timescale, "CAISO").into_iter().skip(1);
        assert!(read_emission_rates_from_iter(rows, &timescale, &IndexSet::new()).is_ok());
    }

    #[rstest]
    fn test_read_emission_rates_negative(timescale: Timescale) {
        let mut rows = rates_raw(&timescale, "CAISO");
        rows[0].lrmer = -1.0;
        assert!(
            read_emission_rates_from_iter(rows.into_iter(), &timescale, &IndexSet::new()).is_err()
        );
    }
}
