//! Code for reading generation and storage projects.
use super::zone::check_node_has_prices;
use super::*;
use crate::project::{
    EmissionsRegionID, EnergySourceID, GenerationProject, HybridPairing, ProjectID, ProjectKind,
    ProjectMap, StorageAttributes, VariantGroupID,
};
use crate::units::{
    Dimensionless, EmissionsPerEnergy, Hours, MoneyPerEnergy, MoneyPerPowerYear, Power,
};
use crate::zone::{LoadZoneMap, PricingNodeMap};
use indexmap::IndexMap;
use serde::Deserialize;
use std::rc::Rc;

const PROJECTS_FILE_NAME: &str = "generation_projects.csv";
const PREDETERMINED_FILE_NAME: &str = "gen_build_predetermined.csv";
const VARIABLE_CAPACITY_FACTORS_FILE_NAME: &str = "variable_capacity_factors.csv";
const BASELOAD_CAPACITY_FACTORS_FILE_NAME: &str = "baseload_capacity_factors.csv";

/// Capacity limit used when none is given
const DEFAULT_CAPACITY_LIMIT: Power = Power(1000.0);

#[derive(PartialEq, Debug, Deserialize, Clone)]
struct GenerationProjectRaw {
    generation_project: String,
    gen_tech: String,
    gen_energy_source: String,
    gen_load_zone: String,
    gen_pricing_node: String,
    gen_capacity_limit_mw: Option<f64>,
    gen_min_build_capacity: Option<f64>,
    gen_unit_size: Option<f64>,
    gen_variant_group: Option<String>,
    gen_is_variable: Option<bool>,
    gen_is_baseload: Option<bool>,
    gen_is_storage: Option<bool>,
    gen_is_additional: Option<bool>,
    gen_is_ra_eligible: Option<bool>,
    #[serde(default, deserialize_with = "deserialise_proportion_opt")]
    gen_forced_outage_rate: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion_opt")]
    gen_scheduled_outage_rate: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion_opt")]
    gen_annual_degradation: Option<f64>,
    cod_year: Option<u32>,
    ppa_energy_cost: Option<f64>,
    ppa_capacity_cost: Option<f64>,
    gen_emission_factor: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion_opt")]
    gen_ccs_capture_efficiency: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion_opt")]
    gen_ccs_energy_load: Option<f64>,
    gen_emissions_region: Option<String>,
    #[serde(default, deserialize_with = "deserialise_proportion_opt")]
    storage_roundtrip_efficiency: Option<f64>,
    storage_charge_to_discharge_ratio: Option<f64>,
    storage_energy_to_power_ratio: Option<f64>,
    storage_max_annual_cycles: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_proportion_opt")]
    storage_leakage_loss: Option<f64>,
    storage_hybrid_generation_project: Option<String>,
    storage_hybrid_min_capacity_ratio: Option<f64>,
    storage_hybrid_max_capacity_ratio: Option<f64>,
}

#[derive(PartialEq, Debug, Deserialize)]
struct PredeterminedBuildRaw {
    generation_project: String,
    build_year: u32,
    gen_predetermined_cap: f64,
}

#[derive(PartialEq, Debug, Deserialize)]
struct VariableCapacityFactorRaw {
    generation_project: String,
    timepoint: String,
    variable_capacity_factor: f64,
}

#[derive(PartialEq, Debug, Deserialize)]
struct BaseloadCapacityFactorRaw {
    generation_project: String,
    timepoint: String,
    baseload_capacity_factor: f64,
}

/// Check that an optional quantity, if given, is a finite number greater than zero
fn check_positive(value: Option<f64>, field: &str) -> Result<()> {
    if let Some(value) = value {
        ensure!(
            value.is_finite() && value > 0.0,
            "{field} must be a finite number greater than zero"
        );
    }

    Ok(())
}

/// Check that an optional quantity, if given, is a finite number
fn check_finite(value: Option<f64>, field: &str) -> Result<()> {
    if let Some(value) = value {
        ensure!(value.is_finite(), "{field} must be a finite number");
    }

    Ok(())
}

impl GenerationProjectRaw {
    /// Work out the project kind from the kind flags and storage columns
    fn kind(&self) -> Result<ProjectKind> {
        let is_variable = self.gen_is_variable.unwrap_or(false);
        let is_baseload = self.gen_is_baseload.unwrap_or(false);
        let is_storage = self.gen_is_storage.unwrap_or(false);
        ensure!(
            [is_variable, is_baseload, is_storage]
                .into_iter()
                .filter(|flag| *flag)
                .count()
                <= 1,
            "A project can be at most one of variable, baseload or storage"
        );

        if !is_storage {
            ensure!(
                self.storage_hybrid_generation_project.is_none(),
                "Only storage projects can be paired with a generator"
            );
        }

        if is_variable {
            return Ok(ProjectKind::Variable);
        }
        if is_baseload {
            return Ok(ProjectKind::Baseload);
        }
        if !is_storage {
            return Ok(ProjectKind::Dispatchable);
        }

        let roundtrip_efficiency = self.storage_roundtrip_efficiency.unwrap_or(1.0);
        ensure!(
            roundtrip_efficiency > 0.0,
            "storage_roundtrip_efficiency must be greater than zero"
        );
        check_positive(
            self.storage_charge_to_discharge_ratio,
            "storage_charge_to_discharge_ratio",
        )?;
        check_positive(
            self.storage_energy_to_power_ratio,
            "storage_energy_to_power_ratio",
        )?;
        check_positive(self.storage_max_annual_cycles, "storage_max_annual_cycles")?;
        let leakage_loss = self.storage_leakage_loss.unwrap_or(0.0);
        ensure!(
            leakage_loss < 1.0,
            "storage_leakage_loss must be less than one"
        );

        let hybrid = self
            .storage_hybrid_generation_project
            .as_ref()
            .map(|generator| -> Result<_> {
                let (Some(min_ratio), Some(max_ratio)) = (
                    self.storage_hybrid_min_capacity_ratio,
                    self.storage_hybrid_max_capacity_ratio,
                ) else {
                    bail!(
                        "Hybrid storage must have storage_hybrid_min_capacity_ratio and \
                        storage_hybrid_max_capacity_ratio"
                    );
                };
                ensure!(
                    min_ratio.is_finite() && max_ratio.is_finite() && min_ratio >= 0.0,
                    "Hybrid capacity ratios must be finite, non-negative numbers"
                );
                ensure!(
                    min_ratio <= max_ratio,
                    "storage_hybrid_min_capacity_ratio cannot be greater than \
                    storage_hybrid_max_capacity_ratio"
                );
                ensure!(
                    max_ratio > 0.0,
                    "storage_hybrid_max_capacity_ratio must be greater than zero"
                );
                ensure!(
                    self.storage_energy_to_power_ratio.is_some(),
                    "Hybrid storage must have a fixed storage_energy_to_power_ratio"
                );

                Ok(HybridPairing {
                    generator: ProjectID::new(generator),
                    min_ratio: Dimensionless(min_ratio),
                    max_ratio: Dimensionless(max_ratio),
                })
            })
            .transpose()?;

        Ok(ProjectKind::Storage(StorageAttributes {
            roundtrip_efficiency: Dimensionless(roundtrip_efficiency),
            charge_to_discharge_ratio: Dimensionless(
                self.storage_charge_to_discharge_ratio.unwrap_or(1.0),
            ),
            energy_to_power_ratio: self.storage_energy_to_power_ratio.map(Hours),
            max_annual_cycles: self.storage_max_annual_cycles,
            leakage_loss: Dimensionless(leakage_loss),
            hybrid,
        }))
    }
}

/// Read projects, their predetermined builds and their capacity factors.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `zones` - All load zones
/// * `nodes` - All pricing nodes
/// * `timescale` - The model's time indexing
pub fn read_projects(
    model_dir: &Path,
    zones: &LoadZoneMap,
    nodes: &PricingNodeMap,
    timescale: &Timescale,
) -> Result<ProjectMap> {
    let default_cod_year = timescale
        .iter_periods()
        .next()
        .map_or(0, |period| period.start);

    let file_path = model_dir.join(PROJECTS_FILE_NAME);
    let mut projects =
        read_projects_from_iter(read_csv(&file_path)?, zones, nodes, default_cod_year)
            .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(PREDETERMINED_FILE_NAME);
    read_predetermined_from_iter(read_csv_optional(&file_path)?, &mut projects, timescale)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(VARIABLE_CAPACITY_FACTORS_FILE_NAME);
    let rows = read_csv_optional::<VariableCapacityFactorRaw>(&file_path)?.map(|raw| {
        (
            raw.generation_project,
            raw.timepoint,
            raw.variable_capacity_factor,
        )
    });
    read_capacity_factors_from_iter(rows, &mut projects, timescale, &ProjectKind::Variable)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(BASELOAD_CAPACITY_FACTORS_FILE_NAME);
    let rows = read_csv_optional::<BaseloadCapacityFactorRaw>(&file_path)?.map(|raw| {
        (
            raw.generation_project,
            raw.timepoint,
            raw.baseload_capacity_factor,
        )
    });
    read_capacity_factors_from_iter(rows, &mut projects, timescale, &ProjectKind::Baseload)
        .with_context(|| input_err_msg(&file_path))?;

    Ok(projects
        .into_iter()
        .map(|(id, project)| (id, Rc::new(project)))
        .collect())
}

fn read_projects_from_iter<I>(
    iter: I,
    zones: &LoadZoneMap,
    nodes: &PricingNodeMap,
    default_cod_year: u32,
) -> Result<IndexMap<ProjectID, GenerationProject>>
where
    I: Iterator<Item = GenerationProjectRaw>,
{
    let mut projects = IndexMap::new();
    for raw in iter {
        let id = ProjectID::new(&raw.generation_project);
        let project = read_project(raw, zones, nodes, default_cod_year)
            .with_context(|| format!("Invalid data for project {id}"))?;
        ensure!(
            projects.insert(id.clone(), project).is_none(),
            "Duplicate project {id}"
        );
    }

    link_hybrid_projects(&mut projects)?;

    Ok(projects)
}

fn read_project(
    raw: GenerationProjectRaw,
    zones: &LoadZoneMap,
    nodes: &PricingNodeMap,
    default_cod_year: u32,
) -> Result<GenerationProject> {
    let kind = raw.kind()?;
    let load_zone = zones.get_id_by_str(&raw.gen_load_zone)?;
    let pricing_node = check_node_has_prices(nodes, &raw.gen_pricing_node)?;

    check_positive(raw.gen_capacity_limit_mw, "gen_capacity_limit_mw")?;
    check_positive(raw.gen_min_build_capacity, "gen_min_build_capacity")?;
    check_positive(raw.gen_unit_size, "gen_unit_size")?;
    check_finite(raw.ppa_energy_cost, "ppa_energy_cost")?;
    check_finite(raw.ppa_capacity_cost, "ppa_capacity_cost")?;
    let emission_factor = raw.gen_emission_factor.unwrap_or(0.0);
    ensure!(
        emission_factor.is_finite() && emission_factor >= 0.0,
        "gen_emission_factor must be a finite, non-negative number"
    );

    let capacity_limit = raw
        .gen_capacity_limit_mw
        .map_or(DEFAULT_CAPACITY_LIMIT, Power);
    if let Some(min_build) = raw.gen_min_build_capacity {
        ensure!(
            Power(min_build) <= capacity_limit,
            "gen_min_build_capacity cannot be greater than gen_capacity_limit_mw"
        );
    }

    Ok(GenerationProject {
        id: ProjectID::new(&raw.generation_project),
        tech: raw.gen_tech,
        energy_source: EnergySourceID::new(&raw.gen_energy_source),
        load_zone,
        pricing_node,
        kind,
        capacity_limit,
        min_build_capacity: raw.gen_min_build_capacity.map(Power),
        unit_size: raw.gen_unit_size.map(Power),
        variant_group: raw.gen_variant_group.as_deref().map(VariantGroupID::new),
        hybrid_storage: None,
        is_additional: raw.gen_is_additional.unwrap_or(false),
        is_ra_eligible: raw.gen_is_ra_eligible.unwrap_or(false),
        forced_outage_rate: Dimensionless(raw.gen_forced_outage_rate.unwrap_or(0.0)),
        scheduled_outage_rate: Dimensionless(raw.gen_scheduled_outage_rate.unwrap_or(0.0)),
        annual_degradation: Dimensionless(raw.gen_annual_degradation.unwrap_or(0.0)),
        cod_year: raw.cod_year.unwrap_or(default_cod_year),
        ppa_energy_cost: MoneyPerEnergy(raw.ppa_energy_cost.unwrap_or(0.0)),
        ppa_capacity_cost: MoneyPerPowerYear(raw.ppa_capacity_cost.unwrap_or(0.0)),
        emission_factor: EmissionsPerEnergy(emission_factor),
        ccs_capture_efficiency: Dimensionless(raw.gen_ccs_capture_efficiency.unwrap_or(0.0)),
        ccs_energy_load: Dimensionless(raw.gen_ccs_energy_load.unwrap_or(0.0)),
        emissions_region: raw
            .gen_emissions_region
            .as_deref()
            .map(EmissionsRegionID::new),
        predetermined: IndexMap::new(),
        capacity_factors: HashMap::new(),
    })
}

/// Point each hybrid generator at its storage half, checking that pairings are valid
fn link_hybrid_projects(projects: &mut IndexMap<ProjectID, GenerationProject>) -> Result<()> {
    let pairings: Vec<_> = projects
        .values()
        .filter_map(|project| {
            let hybrid = project.storage()?.hybrid.as_ref()?;
            Some((project.id.clone(), hybrid.generator.clone()))
        })
        .collect();

    for (storage_id, generator_id) in pairings {
        let generator = projects.get_mut(&generator_id).with_context(|| {
            format!("Hybrid storage {storage_id} is paired with unknown project {generator_id}")
        })?;
        ensure!(
            !generator.is_storage(),
            "Hybrid storage {storage_id} cannot be paired with storage project {generator_id}"
        );
        if let Some(existing) = &generator.hybrid_storage {
            bail!("Generator {generator_id} is paired with both {existing} and {storage_id}");
        }
        generator.hybrid_storage = Some(storage_id.clone());
    }

    for project in projects.values() {
        let Some(storage_id) = &project.hybrid_storage else {
            continue;
        };
        let storage = &projects[storage_id];
        ensure!(
            storage.load_zone == project.load_zone,
            "Hybrid storage {storage_id} must be in the same load zone as its generator {}",
            project.id
        );
    }

    Ok(())
}

fn read_predetermined_from_iter<I>(
    iter: I,
    projects: &mut IndexMap<ProjectID, GenerationProject>,
    timescale: &Timescale,
) -> Result<()>
where
    I: Iterator<Item = PredeterminedBuildRaw>,
{
    let last_period_start = timescale
        .iter_periods()
        .last()
        .map_or(0, |period| period.start);

    for raw in iter {
        let project = projects
            .get_mut(raw.generation_project.as_str())
            .with_context(|| format!("Unknown project {}", raw.generation_project))?;
        ensure!(
            raw.gen_predetermined_cap.is_finite() && raw.gen_predetermined_cap >= 0.0,
            "Predetermined capacity for project {} must be a non-negative number",
            project.id
        );
        ensure!(
            raw.build_year <= last_period_start,
            "Predetermined build for project {} in {} is after the start of the last period",
            project.id,
            raw.build_year
        );
        ensure!(
            project
                .predetermined
                .insert(raw.build_year, Power(raw.gen_predetermined_cap))
                .is_none(),
            "Duplicate predetermined build for project {} in {}",
            project.id,
            raw.build_year
        );
    }

    for project in projects.values_mut() {
        project.predetermined.sort_keys();
        let total: Power = project.predetermined.values().copied().sum();
        ensure!(
            total <= project.capacity_limit,
            "Predetermined capacity for project {} ({} MW) exceeds its capacity limit ({} MW)",
            project.id,
            total.value(),
            project.capacity_limit.value()
        );
    }

    Ok(())
}

/// Read capacity factors for projects of the given kind.
///
/// Variable projects need a complete series. Baseload projects may have no series at all (in
/// which case a capacity factor of one is used) but a partial series is an error.
fn read_capacity_factors_from_iter<I>(
    iter: I,
    projects: &mut IndexMap<ProjectID, GenerationProject>,
    timescale: &Timescale,
    kind: &ProjectKind,
) -> Result<()>
where
    I: Iterator<Item = (String, String, f64)>,
{
    let rows = iter
        .map(|(project, timepoint, value)| -> Result<_> {
            ensure!(
                value.is_finite() && value >= 0.0,
                "Capacity factor for project {project} in timepoint {timepoint} must be a \
                non-negative number"
            );
            Ok((project, timepoint, Dimensionless(value)))
        })
        .process_results(|iter| iter.collect_vec())?;
    let mut factors = read_timepoint_series(rows.into_iter(), &*projects, timescale)?;

    for project in projects.values_mut() {
        let series = factors.remove(&project.id);
        if project.kind != *kind {
            ensure!(
                series.is_none(),
                "Project {} has capacity factors but is not a {} project",
                project.id,
                kind_name(kind)
            );
            continue;
        }

        let Some(series) = series else {
            ensure!(
                *kind != ProjectKind::Variable,
                "No capacity factors given for variable project {}",
                project.id
            );
            continue;
        };
        check_timepoint_coverage(
            &series,
            timescale,
            &format!("capacity factor for project {}", project.id),
        )?;
        project.capacity_factors = series;
    }

    Ok(())
}

fn kind_name(kind: &ProjectKind) -> &'static str {
    match kind {
        ProjectKind::Variable => "variable",
        ProjectKind::Baseload => "baseload",
        ProjectKind::Dispatchable => "dispatchable",
        ProjectKind::Storage(_) => "storage",
    }
}
