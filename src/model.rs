//! The model: all input data for a single scenario.
use crate::adequacy::ResourceAdequacy;
use crate::project::{EmissionsRegionID, GenerationProject, ProjectMap};
use crate::target::{PeriodTargetMap, PeriodTargets};
use crate::timescale::{Period, Timepoint, TimepointID, Timescale};
use crate::units::EmissionsPerEnergy;
use crate::zone::{LoadZone, LoadZoneMap, NodeID, PricingNode, PricingNodeMap, ZoneID};
use std::collections::HashMap;
use std::path::PathBuf;

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// Periods, timeseries and timepoints
    pub timescale: Timescale,
    /// Load zones
    pub zones: LoadZoneMap,
    /// Wholesale pricing nodes
    pub nodes: PricingNodeMap,
    /// Generation and storage projects
    pub projects: ProjectMap,
    /// Clean energy goals for each period
    pub targets: PeriodTargetMap,
    /// Resource adequacy inputs, if provided
    pub resource_adequacy: Option<ResourceAdequacy>,
    /// Marginal emission rate per (region, timepoint)
    pub emission_rates: HashMap<(EmissionsRegionID, TimepointID), EmissionsPerEnergy>,
}

impl Model {
    /// The year to which costs are discounted
    pub fn base_financial_year(&self) -> u32 {
        self.parameters.base_financial_year.unwrap_or_else(|| {
            self.timescale
                .iter_periods()
                .next()
                .map_or(0, |period| period.start)
        })
    }

    /// Weight applied to a period's annual costs in the objective
    pub fn discount_factor(&self, period: &Period) -> f64 {
        period.discount_factor(self.parameters.discount_rate, self.base_financial_year())
    }

    /// Iterate over the periods in order
    pub fn iter_periods(&self) -> impl Iterator<Item = &Period> {
        self.timescale.iter_periods()
    }

    /// Iterate over the timepoints in a period
    pub fn iter_timepoints(&self, period: u32) -> impl Iterator<Item = &Timepoint> {
        self.timescale.iter_timepoints_in_period(period)
    }

    /// Targets for the given period.
    ///
    /// # Panics
    ///
    /// If the period has no targets. Every period is checked for targets when they are read.
    pub fn targets(&self, period: u32) -> &PeriodTargets {
        &self.targets[&period]
    }

    /// Get a pricing node
    pub fn node(&self, id: &NodeID) -> &PricingNode {
        &self.nodes[id]
    }

    /// Get a load zone
    pub fn zone(&self, id: &ZoneID) -> &LoadZone {
        &self.zones[id]
    }

    /// Wholesale price at a project's node
    pub fn nodal_price(&self, project: &GenerationProject, timepoint: &TimepointID) -> f64 {
        self.node(&project.pricing_node).price(timepoint).value()
    }

    /// Price at which a zone's load is settled
    pub fn zone_price(&self, zone: &LoadZone, timepoint: &TimepointID) -> f64 {
        self.node(&zone.load_pricing_node).price(timepoint).value()
    }

    /// Iterate over all projects that are not storage
    pub fn iter_generators(&self) -> impl Iterator<Item = &GenerationProject> {
        self.projects
            .values()
            .map(AsRef::as_ref)
            .filter(|project| !project.is_storage())
    }

    /// Iterate over storage projects
    pub fn iter_storage(&self) -> impl Iterator<Item = &GenerationProject> {
        self.projects
            .values()
            .map(AsRef::as_ref)
            .filter(|project| project.is_storage())
    }

    /// Iterate over the projects serving the given zone
    pub fn iter_projects_in_zone<'a>(
        &'a self,
        zone: &'a ZoneID,
    ) -> impl Iterator<Item = &'a GenerationProject> {
        self.projects
            .values()
            .map(AsRef::as_ref)
            .filter(move |project| project.load_zone == *zone)
    }

    /// Resource adequacy inputs, if RA is both provided and enabled
    pub fn active_resource_adequacy(&self) -> Option<&ResourceAdequacy> {
        self.resource_adequacy
            .as_ref()
            .filter(|_| self.parameters.resource_adequacy)
    }

    /// Total demand across all zones in a period, in MWh per year
    pub fn annual_demand(&self, period: u32) -> f64 {
        self.iter_timepoints(period)
            .map(|tp| {
                self.zones
                    .values()
                    .map(|zone| zone.demand(&tp.id).value())
                    .sum::<f64>()
                    * tp.weight_in_year
            })
            .sum()
    }
}
