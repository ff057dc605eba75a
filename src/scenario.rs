//! Scenarios are named sets of overrides layered onto the base parameters.
use crate::error::ConfigError;
use crate::id::ScenarioID;
use crate::input::{input_err_msg, read_toml};
use crate::parameters::ModelParameters;
use crate::sector::Sector;
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use strum::IntoEnumIterator;
use toml::Value;

const SCENARIOS_FILE_NAME: &str = "scenarios.toml";

/// Keys of distribution parameters which are unaffected by scaling the distribution
const SCALE_INVARIANT_KEYS: [&str; 2] = ["sigma", "weights"];

/// Sectors whose demand is driven by tourism
const TOURISM: [Sector; 3] = [Sector::Lodging, Sector::Restaurants, Sector::Transport];

/// Sectors selling to consumers
const CONSUMER: [Sector; 4] = [
    Sector::Lodging,
    Sector::Restaurants,
    Sector::Retail,
    Sector::Transport,
];

/// A map of scenarios, keyed by ID, in the order in which they are run
pub type ScenarioMap = IndexMap<ScenarioID, Scenario>;

/// What an override does to the parameter it addresses
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideAction {
    /// Multiply every numeric value beneath the parameter
    Scale(f64),
    /// Replace the parameter wholesale
    Replace(Value),
}

/// A change to a single parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterOverride {
    /// Dot-separated path into the parameter document (e.g. `demand_shocks.holiday.lodging`)
    pub path: String,
    /// The change to make
    pub action: OverrideAction,
}

impl ParameterOverride {
    /// Create an override which scales the parameter at `path`
    pub fn scale(path: impl Into<String>, mult: f64) -> Self {
        Self {
            path: path.into(),
            action: OverrideAction::Scale(mult),
        }
    }

    /// Create an override which replaces the parameter at `path`
    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            action: OverrideAction::Replace(value.into()),
        }
    }
}

/// A named set of parameter overrides
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Unique identifier for the scenario
    pub id: ScenarioID,
    /// Human-readable description
    pub description: String,
    /// Overrides, applied in order
    pub overrides: Vec<ParameterOverride>,
}

impl Scenario {
    /// Create a new scenario
    pub fn new(id: &str, description: &str, overrides: Vec<ParameterOverride>) -> Self {
        Self {
            id: id.into(),
            description: description.to_string(),
            overrides,
        }
    }

    /// Apply this scenario's overrides to the base parameters.
    ///
    /// # Arguments
    ///
    /// * `base` - The base parameters
    ///
    /// # Returns
    ///
    /// The validated effective parameters for this scenario, or an error if an override is invalid
    /// or produces invalid parameters.
    pub fn apply(&self, base: &ModelParameters) -> Result<ModelParameters> {
        let mut doc = Value::try_from(base).context("Failed to convert parameters to TOML")?;
        for param_override in &self.overrides {
            self.apply_override(&mut doc, param_override)?;
        }

        let params: ModelParameters = doc
            .try_into()
            .with_context(|| format!("Scenario {} produces an invalid parameter document", self.id))?;
        params
            .validate()
            .with_context(|| format!("Invalid parameters for scenario {}", self.id))?;

        Ok(params)
    }

    /// Apply a single override to the parameter document
    fn apply_override(&self, doc: &mut Value, param_override: &ParameterOverride) -> Result<()> {
        let path = &param_override.path;
        let Some(node) = lookup_mut(doc, path) else {
            bail!(ConfigError::UnknownParameterPath {
                scenario: self.id.clone(),
                path: path.clone(),
            });
        };

        match &param_override.action {
            OverrideAction::Scale(mult) => {
                if !scale(node, *mult) {
                    bail!(ConfigError::NonNumericParameter {
                        scenario: self.id.clone(),
                        path: path.clone(),
                    });
                }
            }
            OverrideAction::Replace(value) => *node = value.clone(),
        }

        Ok(())
    }
}

/// Find the node of a TOML document at the given dot-separated path
fn lookup_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.')
        .try_fold(doc, |node, key| node.as_table_mut()?.get_mut(key))
}

/// Multiply the numeric values beneath a node by `mult`.
///
/// Integers are rounded back to integers. Returns whether any value was scaled.
fn scale(node: &mut Value, mult: f64) -> bool {
    match node {
        Value::Float(x) => {
            *x *= mult;
            true
        }
        Value::Integer(i) => {
            *i = (*i as f64 * mult).round() as i64;
            true
        }
        Value::Array(items) => {
            let mut scaled = false;
            for item in items {
                scaled |= scale(item, mult);
            }
            scaled
        }
        Value::Table(table) => {
            let mut scaled = false;
            for (key, item) in table.iter_mut() {
                if !SCALE_INVARIANT_KEYS.contains(&key.as_str()) {
                    scaled |= scale(item, mult);
                }
            }
            scaled
        }
        _ => false,
    }
}

/// Represents an override as written in `scenarios.toml`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParameterOverrideRaw {
    path: String,
    mult: Option<f64>,
    value: Option<Value>,
}

/// Represents a scenario as written in `scenarios.toml`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioRaw {
    id: ScenarioID,
    #[serde(default)]
    description: String,
    #[serde(default)]
    overrides: Vec<ParameterOverrideRaw>,
}

/// The contents of `scenarios.toml`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenariosFile {
    scenario: Vec<ScenarioRaw>,
}

impl ScenarioRaw {
    /// Check the overrides and convert to a [`Scenario`]
    fn into_scenario(self) -> Result<Scenario> {
        let invalid = |path: &str, reason: &str| ConfigError::InvalidOverride {
            scenario: self.id.clone(),
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let mut overrides = Vec::with_capacity(self.overrides.len());
        for raw in &self.overrides {
            ensure!(!raw.path.is_empty(), invalid(&raw.path, "path is empty"));
            let action = match (raw.mult, &raw.value) {
                (Some(mult), None) => {
                    ensure!(
                        mult.is_finite(),
                        invalid(&raw.path, "mult must be a finite number")
                    );
                    OverrideAction::Scale(mult)
                }
                (None, Some(value)) => OverrideAction::Replace(value.clone()),
                _ => bail!(invalid(
                    &raw.path,
                    "exactly one of mult or value must be given"
                )),
            };
            overrides.push(ParameterOverride {
                path: raw.path.clone(),
                action,
            });
        }

        Ok(Scenario {
            id: self.id,
            description: self.description,
            overrides,
        })
    }
}

/// Convert the contents of a scenarios file into a [`ScenarioMap`]
fn read_scenarios_from_raw(raw: ScenariosFile) -> Result<ScenarioMap> {
    ensure!(
        !raw.scenario.is_empty(),
        "At least one scenario must be defined"
    );

    let mut scenarios = ScenarioMap::new();
    for raw_scenario in raw.scenario {
        let scenario = raw_scenario.into_scenario()?;
        ensure!(
            !scenarios.contains_key(&scenario.id),
            "Duplicate scenario ID {}",
            scenario.id
        );
        scenarios.insert(scenario.id.clone(), scenario);
    }

    Ok(scenarios)
}

/// Read the scenarios from the model directory.
///
/// If `scenarios.toml` is absent, the standard scenario grid is used (see [`standard_scenarios`]).
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `base` - The base parameters, used to build the standard grid
pub fn read_scenarios(model_dir: &Path, base: &ModelParameters) -> Result<ScenarioMap> {
    let file_path = model_dir.join(SCENARIOS_FILE_NAME);
    if !file_path.is_file() {
        return Ok(standard_scenarios(base));
    }

    let raw: ScenariosFile = read_toml(&file_path)?;
    read_scenarios_from_raw(raw).with_context(|| input_err_msg(&file_path))
}

/// The standard sensitivity grid of nine scenarios.
///
/// Overrides are only generated for sectors modelled by `base`, so every path exists.
pub fn standard_scenarios(base: &ModelParameters) -> ScenarioMap {
    let modelled = base.modelled_sectors();
    let all_sectors: Vec<_> = Sector::iter().collect();
    let per_sector = |prefix: &str, sectors: &[Sector], mult: f64| {
        modelled
            .iter()
            .filter(|sector| sectors.contains(sector))
            .map(|sector| ParameterOverride::scale(format!("{prefix}.{sector}"), mult))
            .collect::<Vec<_>>()
    };

    let tourism_demand = |mult| {
        let mut overrides = per_sector("demand_shocks.holiday", &TOURISM, mult);
        overrides.extend(per_sector("demand_shocks.bridge", &TOURISM, mult));
        overrides
    };
    let mut bridge_attractive = per_sector("demand_shocks.bridge", &CONSUMER, 1.2);
    bridge_attractive.extend(per_sector("policy_costs.compensation_factor", &CONSUMER, 0.8));

    [
        Scenario::new("base", "Base parameters", Vec::new()),
        Scenario::new(
            "tourism_demand_high",
            "Tourism-related demand shocks 20% stronger",
            tourism_demand(1.2),
        ),
        Scenario::new(
            "tourism_demand_low",
            "Tourism-related demand shocks 20% weaker",
            tourism_demand(0.8),
        ),
        Scenario::new(
            "H_high",
            "Substitute rest 50% more costly",
            per_sector("policy_costs.substitute_rest_factor", &all_sectors, 1.5),
        ),
        Scenario::new(
            "H_low",
            "Substitute rest 50% less costly",
            per_sector("policy_costs.substitute_rest_factor", &all_sectors, 0.5),
        ),
        Scenario::new(
            "bridge_attractive",
            "Stronger bridge-day demand and cheaper compensation",
            bridge_attractive,
        ),
        Scenario::new(
            "bridge_costly",
            "Compensating an adopted bridge day 50% more costly",
            per_sector("policy_costs.compensation_factor", &all_sectors, 1.5),
        ),
        Scenario::new(
            "capacity_high",
            "Capacity 20% higher",
            per_sector("firm_generation.capacity_multiplier", &all_sectors, 1.2),
        ),
        Scenario::new(
            "capacity_low",
            "Capacity 20% lower",
            per_sector("firm_generation.capacity_multiplier", &all_sectors, 0.8),
        ),
    ]
    .into_iter()
    .map(|scenario| (scenario.id.clone(), scenario))
    .collect()
}
