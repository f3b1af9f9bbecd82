//! Periods, timeseries and timepoints: the time indexing of the optimisation problem.
//!
//! A period is a multi-year planning interval. Each period owns one or more timeseries, which are
//! contiguous runs of sampled hours (timepoints). A timeseries carries a scaling weight so that its
//! timepoints stand in for every hour of the period.
use crate::id::{IDCollection, define_id_type};
use crate::units::Hours;
use anyhow::Result;
use chrono::{Datelike, NaiveDateTime};
use indexmap::{IndexMap, IndexSet};

define_id_type! {TimeseriesID, "timeseries"}
define_id_type! {TimepointID, "timepoint"}

/// A calendar month (1-12)
pub type Month = u32;

/// A multi-year planning interval, identified by its label (normally the first year)
#[derive(PartialEq, Debug, Clone)]
pub struct Period {
    /// Label for the period
    pub id: u32,
    /// The first year of the period
    pub start: u32,
    /// Length of the period in years
    pub length_years: f64,
}

impl Period {
    /// Present value of one unit of annual cost incurred in every year of this period.
    ///
    /// Costs are discounted to `base_year` at `discount_rate`. With a zero discount rate this is
    /// just the length of the period.
    pub fn discount_factor(&self, discount_rate: f64, base_year: u32) -> f64 {
        let uniform_series = if discount_rate == 0.0 {
            self.length_years
        } else {
            (1.0 - (1.0 + discount_rate).powf(-self.length_years)) / discount_rate
        };
        let years_from_base = self.start as f64 - base_year as f64;

        uniform_series * (1.0 + discount_rate).powf(-years_from_base)
    }
}

/// A run of consecutive sampled timepoints within a period
#[derive(PartialEq, Debug, Clone)]
pub struct Timeseries {
    /// Unique identifier
    pub id: TimeseriesID,
    /// The period this timeseries belongs to
    pub period: u32,
    /// Hours represented by each timepoint
    pub duration_of_tp: Hours,
    /// Number of times the timeseries is repeated within its period
    pub scale_to_period: f64,
    /// Timepoints in chronological order
    pub timepoints: Vec<TimepointID>,
}

/// A single sampled hour
#[derive(PartialEq, Debug, Clone)]
pub struct Timepoint {
    /// Unique identifier
    pub id: TimepointID,
    /// Date and time the timepoint starts at
    pub timestamp: NaiveDateTime,
    /// Parent timeseries
    pub timeseries: TimeseriesID,
    /// Parent period
    pub period: u32,
    /// Duration of the timepoint
    pub duration: Hours,
    /// Hours of the period represented by this timepoint
    pub weight: f64,
    /// Hours of an average year in the period represented by this timepoint
    pub weight_in_year: f64,
    /// Previous timepoint in the timeseries, wrapping around to the last one
    pub previous: TimepointID,
    /// Whether this is the first timepoint of its timeseries
    pub is_first: bool,
}

impl Timepoint {
    /// The calendar month this timepoint falls in
    pub fn month(&self) -> Month {
        self.timestamp.month()
    }
}

/// All time indexing information for a model
#[derive(PartialEq, Debug, Default)]
pub struct Timescale {
    /// Periods in chronological order
    pub periods: IndexMap<u32, Period>,
    /// All timeseries
    pub timeseries: IndexMap<TimeseriesID, Timeseries>,
    /// All timepoints, grouped by timeseries and in chronological order within each
    pub timepoints: IndexMap<TimepointID, Timepoint>,
}

impl Timescale {
    /// Iterate over the periods in order
    pub fn iter_periods(&self) -> impl Iterator<Item = &Period> {
        self.periods.values()
    }

    /// Iterate over the timepoints belonging to the given period
    pub fn iter_timepoints_in_period(&self, period: u32) -> impl Iterator<Item = &Timepoint> {
        self.timepoints
            .values()
            .filter(move |tp| tp.period == period)
    }

    /// Iterate over all timepoints
    pub fn iter_timepoints(&self) -> impl Iterator<Item = &Timepoint> {
        self.timepoints.values()
    }

    /// Get the timepoint with the given ID.
    ///
    /// # Panics
    ///
    /// If the timepoint is not in this timescale.
    pub fn timepoint(&self, id: &TimepointID) -> &Timepoint {
        &self.timepoints[id]
    }

    /// Look up a timepoint ID by its string representation
    pub fn timepoint_id(&self, id: &str) -> Result<TimepointID> {
        self.timepoints.get_id_by_str(id)
    }

    /// The months covered by timepoints in the given period, in ascending order
    pub fn months_in_period(&self, period: u32) -> IndexSet<Month> {
        let mut months: Vec<_> = self
            .iter_timepoints_in_period(period)
            .map(Timepoint::month)
            .collect();
        months.sort_unstable();
        months.into_iter().collect()
    }

    /// Total number of hours represented by a period's timepoints, per year
    pub fn hours_in_year(&self, period: u32) -> f64 {
        self.iter_timepoints_in_period(period)
            .map(|tp| tp.weight_in_year)
            .sum()
    }

    /// The period in which `year` falls, if any
    pub fn period_containing(&self, year: u32) -> Option<&Period> {
        self.iter_periods().find(|period| {
            let year = year as f64;
            let start = period.start as f64;
            year >= start && year < start + period.length_years
        })
    }
}
