//! Code for reading periods, timeseries and timepoints.
use super::*;
use crate::timescale::{Period, Timepoint, Timeseries, TimeseriesID};
use crate::units::Hours;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::Deserialize;

const PERIODS_FILE_NAME: &str = "periods.csv";
const TIMESERIES_FILE_NAME: &str = "timeseries.csv";
const TIMEPOINTS_FILE_NAME: &str = "timepoints.csv";

/// The format of the `timestamp` column in the timepoints file
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(PartialEq, Debug, Deserialize)]
struct PeriodRaw {
    period: u32,
    period_start: u32,
    period_length_years: f64,
}

#[derive(PartialEq, Debug, Deserialize)]
struct TimeseriesRaw {
    timeseries: String,
    period: u32,
    ts_duration_of_tp: f64,
    ts_num_tps: usize,
    ts_scale_to_period: f64,
}

#[derive(PartialEq, Debug, Deserialize)]
struct TimepointRaw {
    timepoint_id: String,
    timestamp: String,
    timeseries: String,
}

/// Read the model's time indexing from the periods, timeseries and timepoints files.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn read_timescale(model_dir: &Path) -> Result<Timescale> {
    let file_path = model_dir.join(PERIODS_FILE_NAME);
    let periods =
        read_periods_from_iter(read_csv(&file_path)?).with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(TIMESERIES_FILE_NAME);
    let timeseries = read_timeseries_from_iter(read_csv(&file_path)?, &periods)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(TIMEPOINTS_FILE_NAME);
    read_timepoints_from_iter(read_csv(&file_path)?, periods, timeseries)
        .with_context(|| input_err_msg(&file_path))
}

fn read_periods_from_iter<I>(iter: I) -> Result<IndexMap<u32, Period>>
where
    I: Iterator<Item = PeriodRaw>,
{
    let periods: Vec<_> = iter
        .map(|raw| -> Result<_> {
            ensure!(
                raw.period_length_years.is_finite() && raw.period_length_years > 0.0,
                "Length of period {} must be a positive number",
                raw.period
            );

            Ok(Period {
                id: raw.period,
                start: raw.period_start,
                length_years: raw.period_length_years,
            })
        })
        .try_collect()?;

    ensure!(
        is_sorted_and_unique(periods.iter().map(|period| period.start)),
        "Periods must be unique and listed in increasing order of start year"
    );
    ensure!(
        is_sorted_and_unique(periods.iter().map(|period| period.id)),
        "Period labels must be unique and increasing"
    );

    Ok(periods
        .into_iter()
        .map(|period| (period.id, period))
        .collect())
}

fn read_timeseries_from_iter<I>(
    iter: I,
    periods: &IndexMap<u32, Period>,
) -> Result<IndexMap<TimeseriesID, (Timeseries, usize)>>
where
    I: Iterator<Item = TimeseriesRaw>,
{
    let mut map = IndexMap::new();
    for raw in iter {
        let id = TimeseriesID::new(&raw.timeseries);
        ensure!(
            periods.contains_key(&raw.period),
            "Timeseries {id} refers to unknown period {}",
            raw.period
        );
        ensure!(
            raw.ts_duration_of_tp.is_finite() && raw.ts_duration_of_tp > 0.0,
            "ts_duration_of_tp for timeseries {id} must be a positive number"
        );
        ensure!(
            raw.ts_scale_to_period.is_finite() && raw.ts_scale_to_period > 0.0,
            "ts_scale_to_period for timeseries {id} must be a positive number"
        );
        ensure!(
            raw.ts_num_tps > 0,
            "Timeseries {id} must have at least one timepoint"
        );

        let timeseries = Timeseries {
            id: id.clone(),
            period: raw.period,
            duration_of_tp: Hours(raw.ts_duration_of_tp),
            scale_to_period: raw.ts_scale_to_period,
            timepoints: Vec::new(),
        };
        ensure!(
            map.insert(id.clone(), (timeseries, raw.ts_num_tps))
                .is_none(),
            "Duplicate timeseries {id}"
        );
    }

    for period in periods.keys() {
        ensure!(
            map.values().any(|(timeseries, _)| timeseries.period == *period),
            "Period {period} has no timeseries"
        );
    }

    Ok(map)
}

fn read_timepoints_from_iter<I>(
    iter: I,
    periods: IndexMap<u32, Period>,
    mut timeseries: IndexMap<TimeseriesID, (Timeseries, usize)>,
) -> Result<Timescale>
where
    I: Iterator<Item = TimepointRaw>,
{
    let mut timestamps = HashMap::new();
    for raw in iter {
        let id = TimepointID::new(&raw.timepoint_id);
        let timestamp = NaiveDateTime::parse_from_str(&raw.timestamp, TIMESTAMP_FORMAT)
            .with_context(|| {
                format!(
                    "Invalid timestamp '{}' for timepoint {id} (expected YYYY-MM-DD HH:MM)",
                    raw.timestamp
                )
            })?;
        let (series, _) = timeseries
            .get_mut(raw.timeseries.as_str())
            .with_context(|| {
                format!(
                    "Timepoint {id} refers to unknown timeseries {}",
                    raw.timeseries
                )
            })?;
        try_insert(&mut timestamps, id.clone(), timestamp)?;
        series.timepoints.push(id);
    }

    let mut timepoints = IndexMap::new();
    for (series, num_tps) in timeseries.values() {
        ensure!(
            series.timepoints.len() == *num_tps,
            "Timeseries {} should have {num_tps} timepoints, but {} were found",
            series.id,
            series.timepoints.len()
        );

        let period = &periods[&series.period];
        let weight = series.duration_of_tp.value() * series.scale_to_period;
        let count = series.timepoints.len();
        for (i, id) in series.timepoints.iter().enumerate() {
            let previous = &series.timepoints[(i + count - 1) % count];
            timepoints.insert(
                id.clone(),
                Timepoint {
                    id: id.clone(),
                    timestamp: timestamps[id],
                    timeseries: series.id.clone(),
                    period: series.period,
                    duration: series.duration_of_tp,
                    weight,
                    weight_in_year: weight / period.length_years,
                    previous: previous.clone(),
                    is_first: i == 0,
                },
            );
        }
    }

    Ok(Timescale {
        periods,
        timeseries: timeseries
            .into_iter()
            .map(|(id, (series, _))| (id, series))
            .collect(),
        timepoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use std::iter;

    fn periods_raw() -> Vec<PeriodRaw> {
        vec![
            PeriodRaw {
                period: 2020,
                period_start: 2020,
                period_length_years: 5.0,
            },
            PeriodRaw {
                period: 2025,
                period_start: 2025,
                period_length_years: 5.0,
            },
        ]
    }

    fn timeseries_raw(num_tps: usize) -> Vec<TimeseriesRaw> {
        [2020, 2025]
            .into_iter()
            .map(|period| TimeseriesRaw {
                timeseries: format!("ts{period}"),
                period,
                ts_duration_of_tp: 1.0,
                ts_num_tps: num_tps,
                ts_scale_to_period: 365.0 * 5.0,
            })
            .collect()
    }

    fn timepoints_raw() -> Vec<TimepointRaw> {
        [2020, 2025]
            .into_iter()
            .flat_map(|period| {
                (0..2).map(move |hour| TimepointRaw {
                    timepoint_id: format!("{period}_{hour}"),
                    timestamp: format!("{period}-07-01 0{hour}:00"),
                    timeseries: format!("ts{period}"),
                })
            })
            .collect()
    }

    #[test]
    fn test_read_timescale_from_iter() {
        let periods = read_periods_from_iter(periods_raw().into_iter()).unwrap();
        let timeseries =
            read_timeseries_from_iter(timeseries_raw(2).into_iter(), &periods).unwrap();
        let timescale =
            read_timepoints_from_iter(timepoints_raw().into_iter(), periods, timeseries).unwrap();

        assert_eq!(timescale.timepoints.len(), 4);
        let tp = timescale.timepoint(&"2025_1".into());
        assert_eq!(tp.period, 2025);
        assert_eq!(tp.month(), 7);
        assert_eq!(tp.previous, "2025_0".into());
        assert!(!tp.is_first);
        assert_approx_eq!(f64, tp.weight, 365.0 * 5.0);
        assert_approx_eq!(f64, tp.weight_in_year, 365.0);
        assert_approx_eq!(f64, timescale.hours_in_year(2020), 730.0);
    }

    #[test]
    fn test_read_periods_out_of_order() {
        let mut raw = periods_raw();
        raw.reverse();
        assert_error!(
            read_periods_from_iter(raw.into_iter()),
            "Periods must be unique and listed in increasing order of start year"
        );
    }

    #[test]
    fn test_read_periods_bad_length() {
        let raw = PeriodRaw {
            period: 2020,
            period_start: 2020,
            period_length_years: 0.0,
        };
        assert_error!(
            read_periods_from_iter(iter::once(raw)),
            "Length of period 2020 must be a positive number"
        );
    }

    #[test]
    fn test_read_timeseries_missing_period() {
        let periods = read_periods_from_iter(periods_raw().into_iter()).unwrap();
        let mut raw = timeseries_raw(2);
        raw.pop();
        assert_error!(
            read_timeseries_from_iter(raw.into_iter(), &periods),
            "Period 2025 has no timeseries"
        );
    }

    #[test]
    fn test_read_timepoints_wrong_count() {
        let periods = read_periods_from_iter(periods_raw().into_iter()).unwrap();
        let timeseries =
            read_timeseries_from_iter(timeseries_raw(3).into_iter(), &periods).unwrap();
        assert_error!(
            read_timepoints_from_iter(timepoints_raw().into_iter(), periods, timeseries),
            "Timeseries ts2020 should have 3 timepoints, but 2 were found"
        );
    }

    #[test]
    fn test_read_timepoints_bad_timestamp() {
        let periods = read_periods_from_iter(periods_raw().into_iter()).unwrap();
        let timeseries =
            read_timeseries_from_iter(timeseries_raw(2).into_iter(), &periods).unwrap();
        let mut raw = timepoints_raw();
        raw[0].timestamp = "2020/07/01".into();
        assert!(read_timepoints_from_iter(raw.into_iter(), periods, timeseries).is_err());
    }
}
