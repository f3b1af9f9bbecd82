//! Least-cost procurement of clean energy portfolios that meet time-coincident matching goals.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod adequacy;
pub mod cli;
pub mod diagnostics;
pub mod formulation;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod program;
pub mod project;
pub mod scenario;
pub mod settings;
pub mod solution;
pub mod solver;
pub mod target;
pub mod timescale;
pub mod units;
pub mod zone;

#[cfg(test)]
mod fixture;

/// Get the directory where program settings are stored
pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("portfolio_match");

    path
}
