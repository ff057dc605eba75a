//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::calendar::DayType;
use crate::distribution::ParameterDistribution;
use crate::error::ConfigError;
use crate::input::{deserialise_proportion, input_err_msg, read_toml};
use crate::sector::{Sector, SectorMap};
use crate::units::Dimensionless;
use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ops::Range;
use std::path::Path;
use strum::IntoEnumIterator;

/// Number of hex digits kept from the parameter digest
const CONFIG_HASH_LEN: usize = 12;

/// The name of the parameter file in a model directory
pub const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_seed, u64, 1);
define_param_default!(default_num_seeds, u32, 1);
define_unit_param_default!(default_holiday_close, Dimensionless, 1.0);
define_unit_param_default!(default_holiday_open_with_substitute_rest, Dimensionless, 2.0);
define_unit_param_default!(default_holiday_open_without_substitute_rest, Dimensionless, 3.0);
define_unit_param_default!(default_bridge_operate, Dimensionless, 1.0);
define_param_default!(default_tie_tolerance, f64, 1e-10);

/// Represents the contents of the entire model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    /// Size of the population and the seeds to run
    pub run: RunParameters,
    /// Relative weight of each sector in the firm population.
    ///
    /// Sectors which are absent or have zero weight are not modelled.
    pub sector_weights: SectorMap<f64>,
    /// Distributions of the randomly drawn firm attributes
    pub firm_generation: FirmGenerationParameters,
    /// Distributions of the legal obligation cost factors
    pub policy_costs: PolicyCostParameters,
    /// Fractional demand shocks (ΔD) per day type and sector
    pub demand_shocks: DayShockParameters,
    /// Fractional non-labour cost shocks (ΔC) per day type and sector
    pub cost_shocks: DayShockParameters,
    /// Wage multipliers required by labour law
    #[serde(default)]
    pub legal_cost_multipliers: LegalCostMultipliers,
    /// Behavioural options for how firms choose between options
    #[serde(default)]
    pub behaviour: BehaviourParameters,
}

/// The `[run]` section of `model.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunParameters {
    /// Number of firms generated for each run
    pub num_firms: u32,
    /// The first seed of the sweep
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// The number of consecutive seeds to run
    #[serde(default = "default_num_seeds")]
    pub num_seeds: u32,
}

/// Per-sector distributions of the randomly drawn firm attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirmGenerationParameters {
    /// Average daily wage per worker (W)
    pub wage: SectorMap<ParameterDistribution>,
    /// Number of workers (N), truncated to an integer
    pub workers: SectorMap<ParameterDistribution>,
    /// Baseline daily revenue
    pub revenue: SectorMap<ParameterDistribution>,
    /// Ratio of baseline non-labour cost to baseline revenue
    pub cost_ratio: SectorMap<ParameterDistribution>,
    /// Ratio of capacity (maximum sellable revenue) to baseline revenue
    pub capacity_multiplier: SectorMap<ParameterDistribution>,
}

impl FirmGenerationParameters {
    /// The distribution tables along with their paths in the parameter document
    fn tables(&self) -> [(&'static str, &SectorMap<ParameterDistribution>); 5] {
        [
            ("firm_generation.wage", &self.wage),
            ("firm_generation.workers", &self.workers),
            ("firm_generation.revenue", &self.revenue),
            ("firm_generation.cost_ratio", &self.cost_ratio),
            ("firm_generation.capacity_multiplier", &self.capacity_multiplier),
        ]
    }
}

/// Per-sector distributions of the cost of legal obligations, as multiples of daily payroll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyCostParameters {
    /// Factor for the cost of granting substitute rest for holiday work (H)
    pub substitute_rest_factor: SectorMap<ParameterDistribution>,
    /// Factor for the cost of making up the hours of an adopted bridge day (Hcomp)
    pub compensation_factor: SectorMap<ParameterDistribution>,
}

impl PolicyCostParameters {
    /// The distribution tables along with their paths in the parameter document
    fn tables(&self) -> [(&'static str, &SectorMap<ParameterDistribution>); 2] {
        [
            ("policy_costs.substitute_rest_factor", &self.substitute_rest_factor),
            ("policy_costs.compensation_factor", &self.compensation_factor),
        ]
    }
}

/// Fractional shocks for each modelled day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DayShockParameters {
    /// Shocks on the holiday
    pub holiday: SectorMap<f64>,
    /// Shocks on the bridge day
    pub bridge: SectorMap<f64>,
}

impl DayShockParameters {
    /// Get the shocks for the given day type (ordinary days have none)
    pub fn for_day(&self, day_type: DayType) -> Option<&SectorMap<f64>> {
        match day_type {
            DayType::Holiday => Some(&self.holiday),
            DayType::Bridge => Some(&self.bridge),
            DayType::Ordinary => None,
        }
    }
}

/// Multiples of the daily payroll (N * W) paid under each option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegalCostMultipliers {
    /// Payroll multiple owed when closing on the holiday
    #[serde(default = "default_holiday_close")]
    pub holiday_close: Dimensionless,
    /// Payroll multiple owed when opening on the holiday and granting substitute rest
    #[serde(default = "default_holiday_open_with_substitute_rest")]
    pub holiday_open_with_substitute_rest: Dimensionless,
    /// Payroll multiple owed when opening on the holiday without substitute rest
    #[serde(default = "default_holiday_open_without_substitute_rest")]
    pub holiday_open_without_substitute_rest: Dimensionless,
    /// Payroll multiple owed when operating normally on the bridge day
    #[serde(default = "default_bridge_operate")]
    pub bridge_operate: Dimensionless,
}

impl Default for LegalCostMultipliers {
    fn default() -> Self {
        Self {
            holiday_close: default_holiday_close(),
            holiday_open_with_substitute_rest: default_holiday_open_with_substitute_rest(),
            holiday_open_without_substitute_rest: default_holiday_open_without_substitute_rest(),
            bridge_operate: default_bridge_operate(),
        }
    }
}

impl LegalCostMultipliers {
    /// The multipliers along with their names
    fn iter(&self) -> impl Iterator<Item = (&'static str, Dimensionless)> {
        [
            ("holiday_close", self.holiday_close),
            (
                "holiday_open_with_substitute_rest",
                self.holiday_open_with_substitute_rest,
            ),
            (
                "holiday_open_without_substitute_rest",
                self.holiday_open_without_substitute_rest,
            ),
            ("bridge_operate", self.bridge_operate),
        ]
        .into_iter()
    }
}

/// Options affecting how firms choose between equally profitable options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviourParameters {
    /// Prefer opening with substitute rest when it ties for the best holiday option
    #[serde(default)]
    pub holiday_tie_breaker_prefer_substitute_rest: bool,
    /// Prefer adopting the non-working day when it ties for the best bridge option
    #[serde(default)]
    pub bridge_tie_breaker_prefer_non_working_day: bool,
    /// Proportion of the day's revenue and non-labour cost still realised by a firm which closes
    /// on the holiday (e.g. online sales)
    #[serde(default, deserialize_with = "deserialise_proportion")]
    pub online_sales_fraction: f64,
    /// Relative tolerance used when deciding whether two profits are tied
    #[serde(default = "default_tie_tolerance")]
    pub tie_relative_tolerance: f64,
    /// Absolute tolerance used when deciding whether two profits are tied
    #[serde(default = "default_tie_tolerance")]
    pub tie_absolute_tolerance: f64,
}

impl Default for BehaviourParameters {
    fn default() -> Self {
        Self {
            holiday_tie_breaker_prefer_substitute_rest: false,
            bridge_tie_breaker_prefer_non_working_day: false,
            online_sales_fraction: 0.0,
            tie_relative_tolerance: default_tie_tolerance(),
            tie_absolute_tolerance: default_tie_tolerance(),
        }
    }
}

/// Check that the `[run]` section is valid
fn check_run_parameters(run: &RunParameters) -> Result<()> {
    ensure!(run.num_firms > 0, "num_firms cannot be zero");
    ensure!(run.num_seeds > 0, "num_seeds cannot be zero");
    ensure!(
        run.seed.checked_add(u64::from(run.num_seeds)).is_some(),
        "seed + num_seeds is too large"
    );

    Ok(())
}

/// Check that the sector weights are valid
fn check_sector_weights(weights: &SectorMap<f64>) -> Result<()> {
    for (sector, weight) in weights {
        ensure!(
            weight.is_finite() && *weight >= 0.0,
            "Weight for sector {sector} must be a finite non-negative number"
        );
    }
    ensure!(
        weights.values().sum::<f64>() > 0.0,
        "At least one sector must have a positive weight"
    );

    Ok(())
}

/// Check that a per-sector table has an entry for every modelled sector
fn check_sector_entries<T>(table: &str, map: &SectorMap<T>, sectors: &[Sector]) -> Result<()> {
    for sector in sectors {
        if !map.contains_key(sector) {
            bail!(ConfigError::MissingSectorEntry {
                table: table.to_string(),
                sector: *sector,
            });
        }
    }

    Ok(())
}

/// Check that the distribution tables are complete and valid for the modelled sectors
fn check_distribution_table(
    table: &str,
    map: &SectorMap<ParameterDistribution>,
    sectors: &[Sector],
) -> Result<()> {
    check_sector_entries(table, map, sectors)?;
    for sector in sectors {
        map[sector]
            .validate()
            .with_context(|| format!("Invalid distribution for {table}.{sector}"))?;
    }

    Ok(())
}

/// Check that the shock tables are complete and finite for the modelled sectors
fn check_shock_table(table: &str, shocks: &DayShockParameters, sectors: &[Sector]) -> Result<()> {
    for day_type in DayType::MODELLED {
        let table = format!("{table}.{day_type}");
        let map = shocks.for_day(day_type).context("Day type is not modelled")?;
        check_sector_entries(&table, map, sectors)?;
        for sector in sectors {
            ensure!(
                map[sector].is_finite(),
                "{table}.{sector} must be a finite number"
            );
        }
    }

    Ok(())
}

/// Check that the legal cost multipliers are valid
fn check_legal_cost_multipliers(multipliers: &LegalCostMultipliers) -> Result<()> {
    for (name, value) in multipliers.iter() {
        ensure!(
            value.is_finite() && value >= Dimensionless(0.0),
            "Legal cost multiplier {name} must be a finite non-negative number"
        );
    }

    Ok(())
}

/// Check that the behaviour parameters are valid
fn check_behaviour(behaviour: &BehaviourParameters) -> Result<()> {
    ensure!(
        behaviour.tie_relative_tolerance.is_finite() && behaviour.tie_relative_tolerance >= 0.0,
        "tie_relative_tolerance must be a finite non-negative number"
    );
    ensure!(
        behaviour.tie_absolute_tolerance.is_finite() && behaviour.tie_absolute_tolerance >= 0.0,
        "tie_absolute_tolerance must be a finite non-negative number"
    );

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a `ModelParameters` struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// The sectors for which firms are generated, in canonical order
    pub fn modelled_sectors(&self) -> Vec<Sector> {
        Sector::iter()
            .filter(|sector| self.sector_weights.get(sector).is_some_and(|w| *w > 0.0))
            .collect()
    }

    /// The seeds of the sweep
    pub fn seeds(&self) -> Range<u64> {
        self.run.seed..self.run.seed + u64::from(self.run.num_seeds)
    }

    /// A short digest of the parameters, identifying the configuration a run was made with.
    ///
    /// Equal parameters always give the same hash.
    pub fn config_hash(&self) -> Result<String> {
        let contents =
            toml::to_string(self).context("Failed to convert parameters to TOML for hashing")?;
        let mut hasher = Sha256::new();
        hasher.update(contents.as_bytes());
        let mut hash = format!("{:x}", hasher.finalize());
        hash.truncate(CONFIG_HASH_LEN);

        Ok(hash)
    }

    /// Validate parameters after reading in file
    pub fn validate(&self) -> Result<()> {
        check_run_parameters(&self.run)?;
        check_sector_weights(&self.sector_weights)?;

        let sectors = self.modelled_sectors();
        for (table, map) in self.firm_generation.tables() {
            check_distribution_table(table, map, &sectors)?;
        }
        for (table, map) in self.policy_costs.tables() {
            check_distribution_table(table, map, &sectors)?;
        }
        check_shock_table("demand_shocks", &self.demand_shocks, &sectors)?;
        check_shock_table("cost_shocks", &self.cost_shocks, &sectors)?;
        check_legal_cost_multipliers(&self.legal_cost_multipliers)?;
        check_behaviour(&self.behaviour)?;

        Ok(())
    }

    /// Conditions which are permitted but which suggest the parameters are misconfigured.
    ///
    /// Should only be called on validated parameters.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (sector, weight) in &self.sector_weights {
            if *weight == 0.0 {
                warnings.push(format!(
                    "Sector {sector} has zero weight; no firms will be generated for it"
                ));
            }
        }

        let sectors = self.modelled_sectors();
        for (table, shocks) in [
            ("demand_shocks", &self.demand_shocks),
            ("cost_shocks", &self.cost_shocks),
        ] {
            for day_type in DayType::MODELLED {
                let Some(map) = shocks.for_day(day_type) else {
                    continue;
                };
                for sector in &sectors {
                    let shock = map[sector];
                    if 1.0 + shock < 0.0 {
                        warnings.push(format!(
                            "{table}.{day_type}.{sector} = {shock} is below -1; \
                            its effect will be clamped to zero"
                        ));
                    }
                }
            }
        }

        let gap = (self.legal_cost_multipliers.holiday_open_without_substitute_rest
            - self.legal_cost_multipliers.holiday_open_with_substitute_rest)
            .value();
        for sector in &sectors {
            let (capacity_low, _) = self.firm_generation.capacity_multiplier[sector].bounds();
            if capacity_low < 1.0 {
                warnings.push(format!(
                    "firm_generation.capacity_multiplier.{sector} can be below 1; \
                    runs with such firms will fail validation"
                ));
            }

            let (_, factor_high) = self.policy_costs.substitute_rest_factor[sector].bounds();
            if factor_high >= gap {
                warnings.push(format!(
                    "policy_costs.substitute_rest_factor.{sector} can reach {factor_high}; \
                    substitute rest can cost as much as opening without it"
                ));
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{MODEL_TOML, assert_error, model_parameters};
    use rstest::rstest;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_model_params_from_path() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MODEL_PARAMETERS_FILE_NAME), MODEL_TOML).unwrap();
        let params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(params.run.num_firms, 200);
        assert_eq!(params.legal_cost_multipliers, LegalCostMultipliers::default());
        assert_eq!(params.behaviour, BehaviourParameters::default());
    }

    #[rstest]
    fn test_modelled_sectors(model_parameters: ModelParameters) {
        assert_eq!(
            model_parameters.modelled_sectors(),
            [Sector::Lodging, Sector::Retail]
        );
    }

    #[rstest]
    fn test_seeds(mut model_parameters: ModelParameters) {
        model_parameters.run.seed = 10;
        model_parameters.run.num_seeds = 3;
        assert_eq!(model_parameters.seeds().collect::<Vec<_>>(), [10, 11, 12]);
    }

    #[rstest]
    fn test_validate_ok(model_parameters: ModelParameters) {
        assert!(model_parameters.validate().is_ok());
    }

    #[rstest]
    fn test_validate_missing_sector_entry(mut model_parameters: ModelParameters) {
        model_parameters
            .firm_generation
            .revenue
            .shift_remove(&Sector::Retail);
        let err = model_parameters.validate().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingSectorEntry {
                table: "firm_generation.revenue".into(),
                sector: Sector::Retail
            })
        );
    }

    #[rstest]
    fn test_validate_missing_shock(mut model_parameters: ModelParameters) {
        model_parameters
            .cost_shocks
            .bridge
            .shift_remove(&Sector::Lodging);
        assert_error!(
            model_parameters.validate(),
            "Missing entry for sector lodging in cost_shocks.bridge"
        );
    }

    #[rstest]
    fn test_validate_unmodelled_sector_needs_no_entries(mut model_parameters: ModelParameters) {
        model_parameters.sector_weights.insert(Sector::Transport, 0.0);
        assert!(model_parameters.validate().is_ok());

        model_parameters.sector_weights.insert(Sector::Transport, 1.0);
        assert!(model_parameters.validate().is_err());
    }

    #[rstest]
    #[case(|p: &mut ModelParameters| p.run.num_firms = 0, "num_firms cannot be zero")]
    #[case(|p: &mut ModelParameters| p.run.num_seeds = 0, "num_seeds cannot be zero")]
    #[case(
        |p: &mut ModelParameters| { p.sector_weights.insert(Sector::Lodging, 0.0); p.sector_weights.insert(Sector::Retail, 0.0); },
        "At least one sector must have a positive weight"
    )]
    #[case(
        |p: &mut ModelParameters| { p.sector_weights.insert(Sector::Retail, -1.0); },
        "Weight for sector retail must be a finite non-negative number"
    )]
    #[case(
        |p: &mut ModelParameters| { p.demand_shocks.holiday.insert(Sector::Retail, f64::NAN); },
        "demand_shocks.holiday.retail must be a finite number"
    )]
    #[case(
        |p: &mut ModelParameters| p.legal_cost_multipliers.bridge_operate = Dimensionless(f64::INFINITY),
        "Legal cost multiplier bridge_operate must be a finite non-negative number"
    )]
    #[case(
        |p: &mut ModelParameters| p.behaviour.tie_absolute_tolerance = -1.0,
        "tie_absolute_tolerance must be a finite non-negative number"
    )]
    #[case(
        |p: &mut ModelParameters| { p.firm_generation.wage.insert(Sector::Lodging, ParameterDistribution::Uniform { min: 2.0, max: 1.0 }); },
        "Invalid distribution for firm_generation.wage.lodging"
    )]
    fn test_validate_invalid(
        mut model_parameters: ModelParameters,
        #[case] modify: fn(&mut ModelParameters),
        #[case] msg: &str,
    ) {
        modify(&mut model_parameters);
        assert_error!(model_parameters.validate(), msg);
    }

    #[test]
    fn test_unknown_field() {
        let toml = MODEL_TOML.replace("[run]", "[run]\nnum_days = 3");
        assert!(toml::from_str::<ModelParameters>(&toml).is_err());
    }

    #[test]
    fn test_online_sales_fraction_out_of_range() {
        let toml = format!("{MODEL_TOML}\n[behaviour]\nonline_sales_fraction = 1.5\n");
        assert!(toml::from_str::<ModelParameters>(&toml).is_err());
    }

    #[rstest]
    fn test_config_hash(model_parameters: ModelParameters) {
        let hash = model_parameters.config_hash().unwrap();
        assert_eq!(hash.len(), 12);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(model_parameters.clone().config_hash().unwrap(), hash);

        let mut changed = model_parameters;
        changed.run.num_firms += 1;
        assert_ne!(changed.config_hash().unwrap(), hash);
    }

    #[rstest]
    fn test_warnings_none(model_parameters: ModelParameters) {
        assert!(model_parameters.warnings().is_empty());
    }

    #[rstest]
    fn test_warnings(mut model_parameters: ModelParameters) {
        model_parameters.demand_shocks.holiday.insert(Sector::Retail, -1.5);
        model_parameters.policy_costs.substitute_rest_factor.insert(
            Sector::Lodging,
            ParameterDistribution::Uniform { min: 0.5, max: 1.2 },
        );
        model_parameters.firm_generation.capacity_multiplier.insert(
            Sector::Retail,
            ParameterDistribution::Fixed { value: 0.9 },
        );
        model_parameters.sector_weights.insert(Sector::Transport, 0.0);

        let warnings = model_parameters.warnings();
        assert_eq!(warnings.len(), 4);
        assert!(warnings[0].starts_with("Sector transport has zero weight"));
        assert!(warnings[1].starts_with("demand_shocks.holiday.retail = -1.5"));
        assert!(warnings[2].starts_with("policy_costs.substitute_rest_factor.lodging can reach 1.2"));
        assert!(warnings[3].starts_with("firm_generation.capacity_multiplier.retail can be below 1"));
    }
}
