//! The model: base parameters, scenarios and calendar, loaded from a model directory.
use crate::calendar::{Calendar, read_calendar};
use crate::id::get_by_id_str;
use crate::parameters::ModelParameters;
use crate::scenario::{Scenario, ScenarioMap, read_scenarios};
use crate::simulation::PreparedScenario;
use anyhow::{Context, Result, ensure};
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Model definition
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Path to the model directory
    pub model_path: PathBuf,
    /// Base parameters, to which each scenario's overrides are applied
    pub parameters: ModelParameters,
    /// Scenarios to run
    pub scenarios: ScenarioMap,
    /// The calendar, naming the modelled days
    pub calendar: Calendar,
}

impl Model {
    /// Read a model from the specified directory.
    ///
    /// Warnings about suspicious (but permitted) parameter values are logged.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
        let model_dir = model_dir.as_ref();
        let parameters = ModelParameters::from_path(model_dir)?;
        for warning in parameters.warnings() {
            warn!("{warning}");
        }

        let calendar = read_calendar(model_dir)?;
        let scenarios = read_scenarios(model_dir, &parameters)?;

        Ok(Model {
            model_path: model_dir.to_path_buf(),
            parameters,
            scenarios,
            calendar,
        })
    }

    /// Override the number of firms generated in each run
    pub fn set_num_firms(&mut self, num_firms: u32) -> Result<()> {
        ensure!(num_firms > 0, "Number of firms cannot be zero");
        self.parameters.run.num_firms = num_firms;
        Ok(())
    }

    /// Override the number of seeds in the sweep
    pub fn set_num_seeds(&mut self, num_seeds: u32) -> Result<()> {
        ensure!(num_seeds > 0, "Number of seeds cannot be zero");
        self.parameters.run.num_seeds = num_seeds;
        Ok(())
    }

    /// Restrict the model to the scenarios with the given IDs, in the order given
    pub fn select_scenarios(&mut self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let selected = ids
            .iter()
            .map(|id| {
                let scenario = get_by_id_str(&self.scenarios, id)
                    .with_context(|| format!("Scenario {id} is not defined by the model"))?;
                Ok((scenario.id.clone(), scenario.clone()))
            })
            .collect::<Result<ScenarioMap>>()?;
        self.scenarios = selected;

        Ok(())
    }

    /// Iterate over the scenarios
    pub fn iter_scenarios(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.values()
    }

    /// Apply and validate every scenario.
    ///
    /// This is done before any run starts, so an invalid scenario aborts the whole sweep.
    pub fn prepare_scenarios(&self) -> Result<Vec<PreparedScenario>> {
        let prepared = self
            .iter_scenarios()
            .map(|scenario| PreparedScenario::new(&self.parameters, scenario))
            .collect::<Result<Vec<_>>>()?;

        for scenario in &prepared {
            for warning in scenario.parameters.warnings() {
                warn!("Scenario {}: {warning}", scenario.id);
            }
        }
        info!(
            "Prepared {} scenarios: {}",
            prepared.len(),
            self.scenarios.keys().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );

        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{MODEL_TOML, assert_error};
    use crate::parameters::MODEL_PARAMETERS_FILE_NAME;
    use chrono::NaiveDate;
    use rstest::{fixture, rstest};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    /// A model directory holding only a parameter file
    #[fixture]
    fn model_dir() -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MODEL_PARAMETERS_FILE_NAME), MODEL_TOML).unwrap();
        dir
    }

    #[rstest]
    fn test_model_from_path(model_dir: TempDir) {
        let model = Model::from_path(model_dir.path()).unwrap();
        assert_eq!(model.scenarios.len(), 9);
        assert_eq!(
            model.calendar.holiday,
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
        );
        assert_eq!(model.prepare_scenarios().unwrap().len(), 9);
    }

    #[rstest]
    fn test_model_from_path_missing_parameters() {
        let dir = tempdir().unwrap();
        assert!(Model::from_path(dir.path()).is_err());
    }

    #[rstest]
    fn test_select_scenarios(model_dir: TempDir) {
        let mut model = Model::from_path(model_dir.path()).unwrap();
        model
            .select_scenarios(&["H_low".into(), "base".into()])
            .unwrap();
        let ids: Vec<_> = model.scenarios.keys().map(ToString::to_string).collect();
        assert_eq!(ids, ["H_low", "base"]);

        assert_error!(
            model.select_scenarios(&["nope".into()]),
            "Scenario nope is not defined by the model"
        );
    }

    #[rstest]
    fn test_overrides(model_dir: TempDir) {
        let mut model = Model::from_path(model_dir.path()).unwrap();
        model.set_num_firms(10).unwrap();
        model.set_num_seeds(2).unwrap();
        assert_eq!(model.parameters.run.num_firms, 10);
        assert_eq!(model.parameters.seeds(), 1..3);
        assert!(model.set_num_firms(0).is_err());
        assert!(model.set_num_seeds(0).is_err());
    }

    #[rstest]
    fn test_prepare_scenarios_invalid(model_dir: TempDir) {
        fs::write(
            model_dir.path().join("scenarios.toml"),
            "[[scenario]]\nid = \"bad\"\noverrides = [{ path = \"run.nope\", mult = 2.0 }]\n",
        )
        .unwrap();
        let model = Model::from_path(model_dir.path()).unwrap();
        assert!(model.prepare_scenarios().is_err());
    }
}
