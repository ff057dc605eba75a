//! A Monte Carlo model of how firms in Peru respond to a statutory holiday and a non-working
//! bridge day.
//!
//! Synthetic firms are drawn from per-sector distributions. On each modelled day every firm picks
//! the most profitable of its legal options, and the choices are summarised per sector and scenario
//! over many seeds.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod aggregate;
pub mod calendar;
pub mod cli;
pub mod decision;
pub mod demand;
pub mod distribution;
pub mod error;
pub mod firm;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod output;
pub mod parameters;
pub mod scenario;
pub mod sector;
pub mod settings;
pub mod simulation;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the config folder for the program
pub fn get_feriado_config_dir() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("feriado");
    dir
}
