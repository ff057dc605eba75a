//! Integration tests for the reproducibility of sweeps.
use feriado::aggregate::summarize;
use feriado::model::Model;
use feriado::simulation::{run, run_sweep};
use std::path::PathBuf;

fn load_model() -> Model {
    let model_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("models")
        .join("peru_2026");
    let mut model = Model::from_path(model_dir).unwrap();
    model.set_num_firms(150).unwrap();
    model.set_num_seeds(4).unwrap();
    model
}

/// Parallel and sequential sweeps give identical results, in the same order
#[test]
fn test_sweep_independent_of_parallelism() {
    let model = load_model();
    let prepared = model.prepare_scenarios().unwrap();
    let seeds = model.parameters.seeds();

    let parallel = run_sweep(&prepared, seeds.clone(), false).unwrap();
    let sequential = run_sweep(&prepared, seeds, true).unwrap();
    assert_eq!(parallel, sequential);
    assert_eq!(parallel.len(), 9 * 4);
    assert_eq!(summarize(&parallel), summarize(&sequential));
}

/// The same seed always gives the same firms and decisions; a different seed does not
#[test]
fn test_run_reproducible() {
    let model = load_model();
    let scenario = &model.scenarios["tourism_demand_high"];

    let first = run(&model.parameters, scenario, 42).unwrap();
    let second = run(&model.parameters, scenario, 42).unwrap();
    assert_eq!(first, second);

    let other = run(&model.parameters, scenario, 43).unwrap();
    assert_ne!(first.firms, other.firms);
}

/// Every firm makes exactly one decision per day
#[test]
fn test_one_decision_per_firm() {
    let model = load_model();
    let result = run(&model.parameters, &model.scenarios["base"], 1).unwrap();
    assert!(result.is_valid());
    assert_eq!(result.firms.len(), 150);
    for (i, firm_result) in result.firms.iter().enumerate() {
        assert_eq!(firm_result.firm.id.0 as usize, i + 1);
    }
}
