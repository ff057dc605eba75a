//! Functionality for running scenarios over many seeds.
use crate::decision::{BridgeOption, DayOption, Decision, DecisionRules, HolidayOption};
use crate::demand::{ShockTable, compute_day_outcome};
use crate::error::ValidationError;
use crate::firm::{Firm, FirmGenerator};
use crate::id::ScenarioID;
use crate::parameters::ModelParameters;
use crate::scenario::Scenario;
use crate::sector::Sector;
use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, warn};
use rayon::prelude::*;
use std::ops::Range;

/// The number of runs computed per worker thread before results are handed on
const RUNS_PER_THREAD: usize = 4;

/// The decisions made by one firm in a run
#[derive(Debug, Clone, PartialEq)]
pub struct FirmResult {
    /// The firm
    pub firm: Firm,
    /// The firm's decision for the holiday
    pub holiday: Decision<HolidayOption>,
    /// The firm's decision for the bridge day
    pub bridge: Decision<BridgeOption>,
}

/// The firm-level results for one (scenario, seed) pair
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// The scenario which was run
    pub scenario_id: ScenarioID,
    /// The seed used to generate the firm population
    pub seed: u64,
    /// The sectors modelled in this run
    pub sectors: Vec<Sector>,
    /// Decisions for each firm, in firm ID order. Empty if the run is anomalous.
    pub firms: Vec<FirmResult>,
    /// Validation failures. If there are any, the run is excluded from aggregates.
    pub anomalies: Vec<ValidationError>,
    /// Number of firms for which substitute rest costs at least as much as the full holiday premium
    pub substitute_rest_dominated: usize,
}

impl RunResult {
    /// Whether the run passed validation and can be included in aggregates
    pub fn is_valid(&self) -> bool {
        self.anomalies.is_empty()
    }
}

/// A scenario whose parameters have been resolved and validated, ready to be run
#[derive(Debug, Clone)]
pub struct PreparedScenario {
    /// The scenario's ID
    pub id: ScenarioID,
    /// The effective parameters for the scenario
    pub parameters: ModelParameters,
    /// Digest of the effective parameters
    pub config_hash: String,
    generator: FirmGenerator,
    shocks: ShockTable,
    rules: DecisionRules,
}

impl PreparedScenario {
    /// Apply a scenario to the base parameters and build everything needed to run it.
    ///
    /// Fails if the scenario's overrides are invalid or produce invalid parameters.
    pub fn new(base: &ModelParameters, scenario: &Scenario) -> Result<Self> {
        let parameters = scenario.apply(base)?;
        let generator = FirmGenerator::new(&parameters).with_context(|| {
            format!("Could not create firm generator for scenario {}", scenario.id)
        })?;
        let shocks = ShockTable::from_parameters(&parameters);
        let rules = DecisionRules::from_parameters(&parameters);
        let config_hash = parameters.config_hash()?;

        Ok(Self {
            id: scenario.id.clone(),
            parameters,
            config_hash,
            generator,
            shocks,
            rules,
        })
    }

    /// Run the scenario for a single seed.
    ///
    /// Firms which fail validation do not abort the run: they are recorded as anomalies and the
    /// run's firm results are dropped. A missing shock is a configuration error and is returned.
    pub fn run(&self, seed: u64) -> Result<RunResult> {
        let firms = self.generator.generate(self.parameters.run.num_firms, seed);
        let sectors = self.parameters.modelled_sectors();

        let anomalies = firms
            .iter()
            .filter_map(|firm| {
                firm.validate().err().map(|issue| ValidationError {
                    scenario: self.id.clone(),
                    seed,
                    firm_id: firm.id,
                    issue,
                })
            })
            .collect_vec();
        if !anomalies.is_empty() {
            return Ok(RunResult {
                scenario_id: self.id.clone(),
                seed,
                sectors,
                firms: Vec::new(),
                anomalies,
                substitute_rest_dominated: 0,
            });
        }

        let substitute_rest_dominated = firms
            .iter()
            .filter(|firm| self.rules.substitute_rest_dominated(firm))
            .count();
        let firms = firms
            .into_iter()
            .map(|firm| self.decide(firm))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Scenario {}, seed {seed}", self.id))?;

        debug!(
            "Scenario {}, seed {seed}: {} firms decided",
            self.id,
            firms.len()
        );

        Ok(RunResult {
            scenario_id: self.id.clone(),
            seed,
            sectors,
            firms,
            anomalies,
            substitute_rest_dominated,
        })
    }

    /// Make both of a firm's decisions
    fn decide(&self, firm: Firm) -> Result<FirmResult> {
        let holiday = self.decide_day(&firm)?;
        let bridge = self.decide_day(&firm)?;

        Ok(FirmResult {
            firm,
            holiday,
            bridge,
        })
    }

    /// Decide what a firm does on the day to which the options `O` apply
    fn decide_day<O: DayOption>(&self, firm: &Firm) -> Result<Decision<O>> {
        let day = compute_day_outcome(firm, O::DAY_TYPE, &self.shocks)?;
        Ok(self.rules.decide(firm, &day))
    }
}

/// Run a single scenario for a single seed.
///
/// # Arguments
///
/// * `base` - The base parameters
/// * `scenario` - The scenario whose overrides are applied to `base`
/// * `seed` - Seed for the firm population
pub fn run(base: &ModelParameters, scenario: &Scenario, seed: u64) -> Result<RunResult> {
    PreparedScenario::new(base, scenario)?.run(seed)
}

/// Run every scenario for every seed, keeping every result.
///
/// Runs are independent of one another and are executed in parallel unless `sequential` is set.
/// Either way, results are returned in scenario order and then seed order, and are identical.
pub fn run_sweep(
    scenarios: &[PreparedScenario],
    seeds: Range<u64>,
    sequential: bool,
) -> Result<Vec<RunResult>> {
    let mut results = Vec::new();
    for_each_run(scenarios, seeds, sequential, |result| {
        results.push(result);
        Ok(())
    })?;

    Ok(results)
}

/// Run every scenario for every seed, passing each result to `handle_run` as it completes.
///
/// Runs are computed in batches of a few per worker thread, so only one batch of firm-level
/// results is held in memory at a time. `handle_run` sees results in scenario order and then seed
/// order, whether or not the runs are computed in parallel.
pub fn for_each_run<F>(
    scenarios: &[PreparedScenario],
    seeds: Range<u64>,
    sequential: bool,
    mut handle_run: F,
) -> Result<()>
where
    F: FnMut(RunResult) -> Result<()>,
{
    let batch_size = if sequential {
        1
    } else {
        rayon::current_num_threads() * RUNS_PER_THREAD
    };

    for batch in &scenarios.iter().cartesian_product(seeds).chunks(batch_size) {
        let jobs = batch.collect_vec();
        let results = if sequential {
            jobs.into_iter()
                .map(|(scenario, seed)| scenario.run(seed))
                .collect::<Result<Vec<_>>>()?
        } else {
            jobs.into_par_iter()
                .map(|(scenario, seed)| scenario.run(seed))
                .collect::<Result<Vec<_>>>()?
        };

        for result in results {
            if !result.is_valid() {
                warn!(
                    "Scenario {}, seed {}: run excluded from aggregates ({} invalid firms)",
                    result.scenario_id,
                    result.seed,
                    result.anomalies.len()
                );
            }
            handle_run(result)?;
        }
    }

    Ok(())
}
