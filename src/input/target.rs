//! Code for reading the clean energy goal for each period.
use super::*;
use crate::target::{PeriodTargetMap, PeriodTargets};
use crate::units::{Dimensionless, MoneyPerEmissions, MoneyPerEnergy};
use serde::Deserialize;

const TARGETS_FILE_NAME: &str = "renewable_target.csv";

#[derive(PartialEq, Debug, Deserialize)]
struct PeriodTargetsRaw {
    period: u32,
    #[serde(deserialize_with = "deserialise_proportion")]
    renewable_target: f64,
    excess_generation_limit: Option<f64>,
    excessgen_penalty: Option<f64>,
    rec_resale_value: Option<f64>,
    internal_carbon_price: Option<f64>,
}

/// Read targets for every period.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `timescale` - The model's time indexing
pub fn read_targets(model_dir: &Path, timescale: &Timescale) -> Result<PeriodTargetMap> {
    let file_path = model_dir.join(TARGETS_FILE_NAME);
    read_targets_from_iter(read_csv(&file_path)?, timescale)
        .with_context(|| input_err_msg(&file_path))
}

fn read_targets_from_iter<I>(iter: I, timescale: &Timescale) -> Result<PeriodTargetMap>
where
    I: Iterator<Item = PeriodTargetsRaw>,
{
    let mut targets = HashMap::new();
    for raw in iter {
        ensure!(
            timescale.periods.contains_key(&raw.period),
            "Unknown period {}",
            raw.period
        );

        let excess_generation_limit = raw.excess_generation_limit.unwrap_or(0.0);
        ensure!(
            excess_generation_limit.is_finite() && excess_generation_limit >= 0.0,
            "excess_generation_limit for period {} must be a non-negative number",
            raw.period
        );
        for (value, field) in [
            (raw.excessgen_penalty, "excessgen_penalty"),
            (raw.rec_resale_value, "rec_resale_value"),
            (raw.internal_carbon_price, "internal_carbon_price"),
        ] {
            ensure!(
                value.is_none_or(f64::is_finite),
                "{field} for period {} must be a finite number",
                raw.period
            );
        }

        let period_targets = PeriodTargets {
            renewable_target: Dimensionless(raw.renewable_target),
            excess_generation_limit: Dimensionless(excess_generation_limit),
            excessgen_penalty: MoneyPerEnergy(raw.excessgen_penalty.unwrap_or(0.0)),
            rec_resale_value: MoneyPerEnergy(raw.rec_resale_value.unwrap_or(0.0)),
            internal_carbon_price: MoneyPerEmissions(raw.internal_carbon_price.unwrap_or(0.0)),
        };
        try_insert(&mut targets, raw.period, period_targets)?;
    }

    // Store in period order
    timescale
        .periods
        .keys()
        .map(|period| -> Result<_> {
            let period_targets = targets
                .remove(period)
                .with_context(|| format!("No targets given for period {period}"))?;
            Ok((*period, period_targets))
        })
        .try_collect()
}
