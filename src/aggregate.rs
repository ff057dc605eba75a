//! Reduces firm-level results into per-run metrics and per-scenario summary statistics.
use crate::decision::{BridgeOption, Decision, HolidayOption};
use crate::id::ScenarioID;
use crate::sector::Sector;
use crate::simulation::{FirmResult, RunResult};
use crate::units::Money;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Serialize, Serializer};
use std::fmt;
use strum::{Display, EnumIter, IntoEnumIterator};

/// A set of firms for which metrics are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    /// Firms in a single sector
    Sector(Sector),
    /// All firms
    Total,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sector(sector) => write!(f, "{sector}"),
            Self::Total => write!(f, "total"),
        }
    }
}

impl Serialize for Group {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which day (or both) a metric refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum DayScope {
    /// The holiday
    #[strum(serialize = "holiday")]
    Holiday,
    /// The bridge day
    #[strum(serialize = "bridge")]
    Bridge,
    /// Both days added together
    #[strum(serialize = "combined")]
    Combined,
}

/// A monetary quantity recorded for each decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Quantity {
    /// Revenue realised
    #[strum(serialize = "revenue")]
    Revenue,
    /// Non-labour cost
    #[strum(serialize = "non_labour_cost")]
    NonLabourCost,
    /// Labour cost
    #[strum(serialize = "labour_cost")]
    LabourCost,
    /// Profit
    #[strum(serialize = "profit")]
    Profit,
}

impl Quantity {
    fn of<O>(self, decision: &Decision<O>) -> Money {
        match self {
            Self::Revenue => decision.revenue,
            Self::NonLabourCost => decision.non_labour_cost,
            Self::LabourCost => decision.labour_cost,
            Self::Profit => decision.profit,
        }
    }

    /// The value of this quantity for a firm over the given day(s)
    fn for_firm(self, result: &FirmResult, scope: DayScope) -> Money {
        match scope {
            DayScope::Holiday => self.of(&result.holiday),
            DayScope::Bridge => self.of(&result.bridge),
            DayScope::Combined => self.of(&result.holiday) + self.of(&result.bridge),
        }
    }
}

/// A statistic computed for a group of firms in a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Number of firms
    NumFirms,
    /// Fraction of firms choosing a holiday option
    HolidayShare(HolidayOption),
    /// Fraction of firms choosing a bridge option
    BridgeShare(BridgeOption),
    /// Sum of a quantity over all firms
    Total(DayScope, Quantity),
    /// Mean of a quantity per firm
    Mean(DayScope, Quantity),
    /// Median profit per firm
    MedianProfit(DayScope),
    /// Bridge-day total profit divided by the absolute holiday total profit
    ProfitRatioBridgeOverHoliday,
}

impl Metric {
    /// Every metric, in the order in which they are reported
    pub fn all() -> Vec<Metric> {
        let mut metrics = vec![Self::NumFirms];
        metrics.extend(HolidayOption::iter().map(Self::HolidayShare));
        metrics.extend(BridgeOption::iter().map(Self::BridgeShare));
        metrics.extend(
            DayScope::iter()
                .cartesian_product(Quantity::iter())
                .map(|(scope, quantity)| Self::Total(scope, quantity)),
        );
        metrics.extend(
            DayScope::iter()
                .cartesian_product(Quantity::iter())
                .map(|(scope, quantity)| Self::Mean(scope, quantity)),
        );
        metrics.extend(DayScope::iter().map(Self::MedianProfit));
        metrics.push(Self::ProfitRatioBridgeOverHoliday);
        metrics
    }

    /// Compute the metric for a group of firms.
    ///
    /// Returns `None` where the metric is undefined, e.g. a share for a group with no firms.
    pub fn compute(self, firms: &[&FirmResult]) -> Option<f64> {
        let num_firms = firms.len() as f64;
        let share = |count: usize| (!firms.is_empty()).then(|| count as f64 / num_firms);
        let total = |scope, quantity: Quantity| -> Money {
            firms
                .iter()
                .map(|result| quantity.for_firm(result, scope))
                .sum()
        };

        match self {
            Self::NumFirms => Some(num_firms),
            Self::HolidayShare(option) => {
                share(firms.iter().filter(|r| r.holiday.option == option).count())
            }
            Self::BridgeShare(option) => {
                share(firms.iter().filter(|r| r.bridge.option == option).count())
            }
            Self::Total(scope, quantity) => Some(total(scope, quantity).value()),
            Self::Mean(scope, quantity) => {
                (!firms.is_empty()).then(|| total(scope, quantity).value() / num_firms)
            }
            Self::MedianProfit(scope) => median(
                firms
                    .iter()
                    .map(|result| Quantity::Profit.for_firm(result, scope).value())
                    .collect(),
            ),
            Self::ProfitRatioBridgeOverHoliday => {
                let holiday = total(DayScope::Holiday, Quantity::Profit).value();
                let bridge = total(DayScope::Bridge, Quantity::Profit).value();
                (holiday != 0.0).then(|| bridge / holiday.abs())
            }
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumFirms => write!(f, "num_firms"),
            Self::HolidayShare(option) => write!(f, "holiday_share_{option}"),
            Self::BridgeShare(option) => write!(f, "bridge_share_{option}"),
            Self::Total(scope, quantity) => write!(f, "{scope}_total_{quantity}"),
            Self::Mean(scope, quantity) => write!(f, "{scope}_mean_{quantity}"),
            Self::MedianProfit(scope) => write!(f, "{scope}_median_profit"),
            Self::ProfitRatioBridgeOverHoliday => write!(f, "profit_ratio_bridge_over_holiday"),
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The value of one metric for one group in one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetricRow {
    /// The scenario
    pub scenario_id: ScenarioID,
    /// The seed
    pub seed: u64,
    /// The group of firms
    pub group: Group,
    /// The metric
    pub metric: Metric,
    /// The value, if defined
    pub value: Option<f64>,
}

/// Summary statistics for one metric and group across the valid runs of a scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    /// The scenario
    pub scenario_id: ScenarioID,
    /// The group of firms
    pub group: Group,
    /// The metric
    pub metric: Metric,
    /// Number of valid runs of the scenario
    pub n_runs: usize,
    /// Number of runs excluded because they failed validation
    pub n_anomalous_runs: usize,
    /// Mean over runs
    pub mean: Option<f64>,
    /// 10th percentile over runs
    pub p10: Option<f64>,
    /// Median over runs
    pub p50: Option<f64>,
    /// 90th percentile over runs
    pub p90: Option<f64>,
    /// Sample standard deviation over runs
    pub std: Option<f64>,
}

/// The groups reported for a run: each sector, then the total
fn groups(sectors: &[Sector]) -> impl Iterator<Item = Group> + '_ {
    sectors
        .iter()
        .map(|sector| Group::Sector(*sector))
        .chain([Group::Total])
}

/// Compute every metric for every group of a run.
///
/// Anomalous runs have no metrics.
pub fn aggregate_run(run: &RunResult) -> Vec<RunMetricRow> {
    if !run.is_valid() {
        return Vec::new();
    }

    let metrics = Metric::all();
    let mut rows = Vec::new();
    for group in groups(&run.sectors) {
        let firms = run
            .firms
            .iter()
            .filter(|result| match group {
                Group::Sector(sector) => result.firm.sector == sector,
                Group::Total => true,
            })
            .collect_vec();

        rows.extend(metrics.iter().map(|metric| RunMetricRow {
            scenario_id: run.scenario_id.clone(),
            seed: run.seed,
            group,
            metric: *metric,
            value: metric.compute(&firms),
        }));
    }

    rows
}

/// The metrics of one run, without its firm-level results
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetrics {
    /// The scenario
    pub scenario_id: ScenarioID,
    /// The seed
    pub seed: u64,
    /// The sectors modelled in the run
    pub sectors: Vec<Sector>,
    /// Whether the run passed validation
    pub is_valid: bool,
    /// Every metric for every group. Empty if the run is anomalous.
    pub rows: Vec<RunMetricRow>,
}

impl RunMetrics {
    /// Compute the metrics of a run
    pub fn new(run: &RunResult) -> Self {
        Self {
            scenario_id: run.scenario_id.clone(),
            seed: run.seed,
            sectors: run.sectors.clone(),
            is_valid: run.is_valid(),
            rows: aggregate_run(run),
        }
    }
}

/// Summarise the runs of each scenario.
///
/// See [`summarize_metrics`].
pub fn summarize(runs: &[RunResult]) -> Vec<SummaryRow> {
    summarize_metrics(&runs.iter().map(RunMetrics::new).collect_vec())
}

/// Summarise the per-run metrics of each scenario.
///
/// Scenarios are reported in the order in which they first appear in `runs`. Statistics are taken
/// over the valid runs for which a metric is defined: the mean needs at least one value and the
/// percentiles and standard deviation need at least two.
pub fn summarize_metrics(runs: &[RunMetrics]) -> Vec<SummaryRow> {
    let mut by_scenario: IndexMap<&ScenarioID, Vec<&RunMetrics>> = IndexMap::new();
    for run in runs {
        by_scenario.entry(&run.scenario_id).or_default().push(run);
    }

    let metrics = Metric::all();
    let mut rows = Vec::new();
    for (scenario_id, runs) in by_scenario {
        let n_runs = runs.iter().filter(|run| run.is_valid).count();
        let n_anomalous_runs = runs.len() - n_runs;

        let mut values: IndexMap<(Group, Metric), Vec<f64>> = groups(&runs[0].sectors)
            .cartesian_product(metrics.iter().copied())
            .map(|key| (key, Vec::new()))
            .collect();
        for row in runs.iter().flat_map(|run| &run.rows) {
            if let (Some(value), Some(entry)) =
                (row.value, values.get_mut(&(row.group, row.metric)))
            {
                entry.push(value);
            }
        }

        rows.extend(values.into_iter().map(|((group, metric), values)| {
            let has_spread = values.len() >= 2;
            let spread = |f: fn(&[f64]) -> f64| has_spread.then(|| f(&values));
            SummaryRow {
                scenario_id: scenario_id.clone(),
                group,
                metric,
                n_runs,
                n_anomalous_runs,
                mean: mean(&values),
                p10: spread(|v| quantile(v, 0.1)),
                p50: spread(|v| quantile(v, 0.5)),
                p90: spread(|v| quantile(v, 0.9)),
                std: spread(sample_std),
            }
        }));
    }

    rows
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        f64::midpoint(values[mid - 1], values[mid])
    } else {
        values[mid]
    })
}

/// The `q`th quantile of `values`, interpolating linearly between order statistics
fn quantile(values: &[f64], q: f64) -> f64 {
    let sorted = values.iter().copied().sorted_by(f64::total_cmp).collect_vec();
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

/// Standard deviation with one delta degree of freedom
fn sample_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (n - 1.0)).sqrt()
}
