//! Integration tests for the `example run` command.
use feriado::cli::RunOpts;
use feriado::cli::example::handle_example_run_command;
use feriado::settings::Settings;
use std::fs;
use tempfile::tempdir;

/// Run two scenarios of the bundled New Year model
#[test]
fn test_handle_example_run_command() {
    unsafe { std::env::set_var("FERIADO_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        seeds: Some(3),
        firms: Some(100),
        scenarios: vec!["base".into(), "H_high".into()],
        sequential: true,
        ..RunOpts::default()
    };
    handle_example_run_command("peru_2026", &opts, Some(Settings::default())).unwrap();

    let summary = fs::read_to_string(tempdir.path().join("summary.csv")).unwrap();
    let lines: Vec<_> = summary.lines().collect();
    assert_eq!(
        lines[0],
        "scenario_id,group,metric,n_runs,n_anomalous_runs,mean,p10,p50,p90,std"
    );
    assert!(lines[1].starts_with("base,lodging,num_firms,3,0,"));
    assert!(lines.iter().any(|line| line.starts_with("H_high,manufacturing_b2b,")));
    assert!(
        lines
            .iter()
            .any(|line| line.starts_with("H_high,total,profit_ratio_bridge_over_holiday,3,0,"))
    );

    // Firm decisions are not written by default
    assert!(!tempdir.path().join("firm_decisions.csv").exists());

    let metadata = fs::read_to_string(tempdir.path().join("metadata.toml")).unwrap();
    assert!(metadata.contains("holiday = \"2026-01-01\""));
    assert!(metadata.contains("num_firms = 100"));
    assert!(metadata.contains("config_hash = "));
}
