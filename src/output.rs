//! The module responsible for writing output data to disk.
use crate::aggregate::{RunMetrics, SummaryRow};
use crate::calendar::{Calendar, DayType};
use crate::decision::Decision;
use crate::firm::Firm;
use crate::id::{FirmID, ScenarioID};
use crate::sector::Sector;
use crate::simulation::RunResult;
use crate::units::{Money, MoneyPerWorker};
use anyhow::{Context, Result, ensure};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Display;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "feriado_results";

/// The output file name for summary statistics
const SUMMARY_FILE_NAME: &str = "summary.csv";

/// The output file name for per-run metrics
const RUN_METRICS_FILE_NAME: &str = "run_metrics.csv";

/// The output file name for validation failures
const ANOMALIES_FILE_NAME: &str = "anomalies.csv";

/// The output file name for firm-level decisions
const FIRM_DECISIONS_FILE_NAME: &str = "firm_decisions.csv";

/// Get the default output directory for the model at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create the output directory.
///
/// An existing directory which is not empty is only reused if `allow_overwrite` is set, in which
/// case its contents are deleted.
///
/// # Returns
///
/// Whether an existing directory was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let is_non_empty = output_dir.is_dir() && fs::read_dir(output_dir)?.next().is_some();
    if is_non_empty {
        ensure!(
            allow_overwrite,
            "Output folder {} already exists and is not empty. Use --overwrite to replace it.",
            output_dir.display()
        );
        fs::remove_dir_all(output_dir)?;
    }

    fs::create_dir_all(output_dir)?;

    Ok(is_non_empty)
}

/// Represents a row in the anomalies CSV file
#[derive(Serialize, Debug, PartialEq)]
struct AnomalyRow {
    scenario_id: ScenarioID,
    seed: u64,
    firm_id: FirmID,
    issue: String,
}

/// Represents a row in the firm decisions CSV file
#[derive(Serialize, Debug, PartialEq)]
struct FirmDecisionRow {
    scenario_id: ScenarioID,
    seed: u64,
    firm_id: FirmID,
    sector: Sector,
    date: NaiveDate,
    day_type: DayType,
    wage: MoneyPerWorker,
    workers: u32,
    base_revenue: Money,
    base_cost: Money,
    capacity: Money,
    substitute_rest_cost: Money,
    compensation_cost: Money,
    option: String,
    revenue: Money,
    non_labour_cost: Money,
    labour_cost: Money,
    profit: Money,
}

impl FirmDecisionRow {
    fn new<O: Display>(
        run: &RunResult,
        firm: &Firm,
        date: NaiveDate,
        day_type: DayType,
        decision: &Decision<O>,
    ) -> Self {
        Self {
            scenario_id: run.scenario_id.clone(),
            seed: run.seed,
            firm_id: firm.id,
            sector: firm.sector,
            date,
            day_type,
            wage: firm.wage,
            workers: firm.workers,
            base_revenue: firm.base_revenue,
            base_cost: firm.base_cost,
            capacity: firm.capacity,
            substitute_rest_cost: firm.substitute_rest_cost,
            compensation_cost: firm.compensation_cost,
            option: decision.option.to_string(),
            revenue: decision.revenue,
            non_labour_cost: decision.non_labour_cost,
            labour_cost: decision.labour_cost,
            profit: decision.profit,
        }
    }
}

/// An object for writing the results of a sweep to file
pub struct DataWriter {
    run_metrics_writer: csv::Writer<File>,
    anomalies_writer: csv::Writer<File>,
    firm_decisions_writer: Option<csv::Writer<File>>,
    output_path: PathBuf,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `write_firm_decisions` - Whether to write every firm's decisions
    pub fn create(output_path: &Path, write_firm_decisions: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(&file_path)
                .with_context(|| format!("Could not create {}", file_path.display()))
        };

        Ok(Self {
            run_metrics_writer: new_writer(RUN_METRICS_FILE_NAME)?,
            anomalies_writer: new_writer(ANOMALIES_FILE_NAME)?,
            firm_decisions_writer: write_firm_decisions
                .then(|| new_writer(FIRM_DECISIONS_FILE_NAME))
                .transpose()?,
            output_path: output_path.to_path_buf(),
        })
    }

    /// Write the metrics, anomalies and (optionally) firm decisions of a run
    pub fn write_run(
        &mut self,
        run: &RunResult,
        metrics: &RunMetrics,
        calendar: &Calendar,
    ) -> Result<()> {
        for row in &metrics.rows {
            self.run_metrics_writer.serialize(row)?;
        }

        for anomaly in &run.anomalies {
            self.anomalies_writer.serialize(AnomalyRow {
                scenario_id: anomaly.scenario.clone(),
                seed: anomaly.seed,
                firm_id: anomaly.firm_id,
                issue: anomaly.issue.to_string(),
            })?;
        }

        if let Some(writer) = &mut self.firm_decisions_writer {
            let holiday = calendar.date_of(DayType::Holiday);
            let bridge = calendar.date_of(DayType::Bridge);
            for result in &run.firms {
                writer.serialize(FirmDecisionRow::new(
                    run,
                    &result.firm,
                    holiday,
                    DayType::Holiday,
                    &result.holiday,
                ))?;
                writer.serialize(FirmDecisionRow::new(
                    run,
                    &result.firm,
                    bridge,
                    DayType::Bridge,
                    &result.bridge,
                ))?;
            }
        }

        Ok(())
    }

    /// Write the summary statistics for the sweep
    pub fn write_summary(&self, rows: &[SummaryRow]) -> Result<()> {
        let mut writer = csv::Writer::from_path(self.output_path.join(SUMMARY_FILE_NAME))?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.run_metrics_writer.flush()?;
        self.anomalies_writer.flush()?;
        if let Some(writer) = &mut self.firm_decisions_writer {
            writer.flush()?;
        }

        Ok(())
    }
}
