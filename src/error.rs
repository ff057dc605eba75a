//! Typed root causes for configuration and validation failures.
//!
//! These are wrapped in [`anyhow::Error`] as they propagate, so callers can classify a failure with
//! `downcast_ref` while still getting the full context chain in messages.
use crate::calendar::DayType;
use crate::id::{FirmID, ScenarioID};
use crate::sector::Sector;
use thiserror::Error;

/// A problem with the model configuration. Always fatal: the sweep is aborted before any run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A table required for a modelled sector has no entry for it
    #[error("Missing entry for sector {sector} in {table}")]
    MissingSectorEntry {
        /// Dotted path of the table
        table: String,
        /// The sector without an entry
        sector: Sector,
    },
    /// The shock table has no entry for a (sector, day type) pair
    #[error("No {day_type} shock configured for sector {sector}")]
    MissingShock {
        /// The firm's sector
        sector: Sector,
        /// The modelled day
        day_type: DayType,
    },
    /// A scenario override names a path which does not exist in the parameter document
    #[error("Scenario {scenario}: unknown parameter path \"{path}\"")]
    UnknownParameterPath {
        /// The scenario containing the override
        scenario: ScenarioID,
        /// The dotted parameter path
        path: String,
    },
    /// A scenario tried to scale a parameter with no numeric content
    #[error("Scenario {scenario}: parameter \"{path}\" has no numeric value to scale")]
    NonNumericParameter {
        /// The scenario containing the override
        scenario: ScenarioID,
        /// The dotted parameter path
        path: String,
    },
    /// A scenario override is malformed
    #[error("Scenario {scenario}: invalid override for \"{path}\": {reason}")]
    InvalidOverride {
        /// The scenario containing the override
        scenario: ScenarioID,
        /// The dotted parameter path
        path: String,
        /// What is wrong with it
        reason: String,
    },
}

/// A post-hoc sanity check which failed for a single firm
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationIssue {
    /// An attribute which must be strictly positive (and finite) is not
    #[error("{field} must be a finite positive number (got {value})")]
    NonPositive {
        /// Attribute name
        field: &'static str,
        /// The offending value
        value: f64,
    },
    /// A cost which must be non-negative (and finite) is not
    #[error("{field} must be a finite non-negative number (got {value})")]
    Negative {
        /// Attribute name
        field: &'static str,
        /// The offending value
        value: f64,
    },
    /// The capacity cap is below the firm's baseline revenue
    #[error("capacity ({capacity}) is below base revenue ({base_revenue})")]
    CapacityBelowBaseRevenue {
        /// Maximum sellable revenue
        capacity: f64,
        /// Baseline daily revenue
        base_revenue: f64,
    },
}

/// A validation failure in one run, with enough context to reproduce it
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Scenario {scenario}, seed {seed}, firm {firm_id}: {issue}")]
pub struct ValidationError {
    /// The scenario being run
    pub scenario: ScenarioID,
    /// The seed of the run
    pub seed: u64,
    /// The firm which failed validation
    pub firm_id: FirmID,
    /// What went wrong
    pub issue: ValidationIssue,
}
