//! Common routines for handling input data.
use crate::id::{IDCollection, IDLike};
use crate::model::{Model, ModelParameters};
use crate::timescale::{TimepointID, Timescale};
use anyhow::{Context, Result, bail, ensure};
use itertools::Itertools;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Debug;
use std::fs;
use std::hash::Hash;
use std::path::Path;

mod adequacy;
use adequacy::read_resource_adequacy;
mod emissions;
use emissions::read_emission_rates;
mod project;
use project::read_projects;
mod target;
use target::read_targets;
mod timescale;
use timescale::read_timescale;
mod zone;
use zone::{read_load_zones, read_pricing_nodes};

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<impl Iterator<Item = T>> {
    let vec = read_csv_internal(file_path)?;
    if vec.is_empty() {
        bail!("CSV file {} cannot be empty", file_path.display());
    }

    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file.
///
/// The file may be empty or absent, in which case no items are returned.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<T: DeserializeOwned>(file_path: &Path) -> Result<impl Iterator<Item = T>> {
    if !file_path.exists() {
        return Ok(Vec::new().into_iter());
    }

    let vec = read_csv_internal(file_path)?;
    Ok(vec.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Read an f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Deserialize::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value is not between 0 and 1"))?;
    }

    Ok(value)
}

/// Read an optional f64, checking that it is between 0 and 1 when present
pub fn deserialise_proportion_opt<'de, D>(deserialiser: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = Deserialize::deserialize(deserialiser)?;
    if value.is_some_and(|value| !(0.0..=1.0).contains(&value)) {
        Err(serde::de::Error::custom("Value is not between 0 and 1"))?;
    }

    Ok(value)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Check whether an iterator contains values that are sorted and unique
pub fn is_sorted_and_unique<T, I>(iter: I) -> bool
where
    T: PartialOrd + Clone,
    I: IntoIterator<Item = T>,
{
    iter.into_iter().tuple_windows().all(|(a, b)| a < b)
}

/// Inserts a key-value pair into a `HashMap` if the key does not already exist.
///
/// If the key already exists, an error is returned.
pub fn try_insert<K, V>(map: &mut HashMap<K, V>, key: K, value: V) -> Result<()>
where
    K: Eq + Hash + Debug,
{
    match map.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(value);
            Ok(())
        }
        Entry::Occupied(entry) => bail!("Duplicate entry for {:?}", entry.key()),
    }
}

/// Group rows of a per-timepoint series by entity.
///
/// Entities and timepoints are checked against the known IDs and no (entity, timepoint) pair may
/// appear twice. Coverage is not checked here, as not every series needs to be complete.
fn read_timepoint_series<ID, V, I>(
    iter: I,
    ids: &impl IDCollection<ID>,
    timescale: &Timescale,
) -> Result<HashMap<ID, HashMap<TimepointID, V>>>
where
    ID: IDLike,
    V: Debug,
    I: Iterator<Item = (String, String, V)>,
{
    let mut map: HashMap<ID, HashMap<TimepointID, V>> = HashMap::new();
    for (id, timepoint, value) in iter {
        let id = ids.get_id_by_str(&id)?;
        let timepoint = timescale.timepoint_id(&timepoint)?;
        let series = map.entry(id.clone()).or_default();
        ensure!(
            !series.contains_key(&timepoint),
            "Duplicate entry for {id} in timepoint {timepoint}"
        );
        series.insert(timepoint, value);
    }

    Ok(map)
}

/// Check that a per-timepoint series has an entry for every timepoint
fn check_timepoint_coverage<V>(
    series: &HashMap<TimepointID, V>,
    timescale: &Timescale,
    description: &str,
) -> Result<()> {
    if let Some(missing) = timescale
        .timepoints
        .keys()
        .find(|timepoint| !series.contains_key(*timepoint))
    {
        bail!("Missing {description} for timepoint {missing}");
    }

    Ok(())
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The loaded [`Model`], or an error naming the offending file if any input is invalid.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let timescale = read_timescale(model_dir)?;
    let nodes = read_pricing_nodes(model_dir, &timescale)?;
    let zones = read_load_zones(model_dir, &nodes, &timescale)?;
    let projects = read_projects(model_dir, &zones, &nodes, &timescale)?;
    let targets = read_targets(model_dir, &timescale)?;
    let resource_adequacy =
        read_resource_adequacy(model_dir, &timescale, &projects, &parameters)?;
    let emission_rates = read_emission_rates(model_dir, &timescale, &projects, &parameters)?;

    Ok(Model {
        model_path: model_dir.to_path_buf(),
        parameters,
        timescale,
        zones,
        nodes,
        projects,
        targets,
        resource_adequacy,
        emission_rates,
    })
}
