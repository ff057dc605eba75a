//! The command line interface for the simulation.
use crate::aggregate::{Group, Metric, RunMetrics, SummaryRow, summarize_metrics};
use crate::decision::{BridgeOption, HolidayOption};
use crate::log;
use crate::model::Model;
use crate::output::metadata::write_metadata;
use crate::output::{DataWriter, create_output_directory, get_output_dir};
use crate::settings::Settings;
use crate::simulation::for_each_run;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the simulation.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to write every firm's decisions to firm_decisions.csv
    #[arg(long)]
    pub write_firm_decisions: bool,
    /// Number of seeds to run, overriding the model
    #[arg(long)]
    pub seeds: Option<u32>,
    /// Number of firms in each run, overriding the model
    #[arg(long)]
    pub firms: Option<u32>,
    /// Only run the given scenario (may be repeated)
    #[arg(long = "scenario", value_name = "ID")]
    pub scenarios: Vec<String>,
    /// Run scenarios and seeds one at a time instead of in parallel
    #[arg(long)]
    pub sequential: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a model's scenarios over its seeds.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Manage example models.
    Example {
        /// The available subcommands for managing example models.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Validate a model.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ feriado --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Handle the `run` command.
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let mut settings = load_settings(settings)?;

    // These settings can be overridden by command-line arguments
    settings.overwrite |= opts.overwrite;
    settings.write_firm_decisions |= opts.write_firm_decisions;
    settings.sequential |= opts.sequential;

    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => get_output_dir(model_path)?,
    };
    let overwrite =
        create_output_directory(&output_path, settings.overwrite).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    log::init(Some(&settings.log_level), Some(&output_path))
        .context("Failed to initialise logging.")?;

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let mut model = Model::from_path(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    if let Some(num_firms) = opts.firms {
        model.set_num_firms(num_firms)?;
    }
    if let Some(num_seeds) = opts.seeds {
        model.set_num_seeds(num_seeds)?;
    }
    model.select_scenarios(&opts.scenarios)?;
    info!("Output folder: {}", output_path.display());

    run_model(&model, &output_path, &settings)?;
    info!("Simulation complete!");

    Ok(())
}

/// Run every scenario of a model over every seed and write the results
fn run_model(model: &Model, output_path: &Path, settings: &Settings) -> Result<()> {
    for (date, day_type) in model.calendar.modelled_days() {
        info!("Modelled {day_type}: {date}");
    }
    let prepared = model.prepare_scenarios()?;
    let seeds = model.parameters.seeds();
    info!(
        "Running {} scenarios x {} seeds with {} firms each",
        prepared.len(),
        seeds.end - seeds.start,
        model.parameters.run.num_firms
    );

    // Firm-level results are written and dropped as each run completes
    let mut writer = DataWriter::create(output_path, settings.write_firm_decisions)?;
    let mut runs = Vec::new();
    for_each_run(&prepared, seeds, settings.sequential, |run| {
        if run.substitute_rest_dominated > 0 {
            warn!(
                "Scenario {}, seed {}: substitute rest costs at least as much as opening \
                without it for {} firms",
                run.scenario_id, run.seed, run.substitute_rest_dominated
            );
        }
        let metrics = RunMetrics::new(&run);
        writer.write_run(&run, &metrics, &model.calendar)?;
        runs.push(metrics);
        Ok(())
    })?;
    writer.flush()?;

    let summary = summarize_metrics(&runs);
    log_option_shares(&summary);
    writer.write_summary(&summary)?;
    write_metadata(output_path, model, &prepared).context("Failed to save metadata.")?;

    Ok(())
}

/// Log the mean share of each option across all firms, per scenario
fn log_option_shares(summary: &[SummaryRow]) {
    let metrics: Vec<_> = HolidayOption::iter()
        .map(Metric::HolidayShare)
        .chain(BridgeOption::iter().map(Metric::BridgeShare))
        .collect();

    let mut rows = summary
        .iter()
        .filter(|row| row.group == Group::Total && metrics.contains(&row.metric))
        .peekable();
    while let Some(first) = rows.next() {
        let mut shares = vec![format_share(first)];
        while let Some(row) = rows.next_if(|row| row.scenario_id == first.scenario_id) {
            shares.push(format_share(row));
        }

        if first.n_anomalous_runs > 0 {
            warn!(
                "Scenario {}: {} of {} runs excluded as anomalous",
                first.scenario_id,
                first.n_anomalous_runs,
                first.n_runs + first.n_anomalous_runs
            );
        }
        info!("Scenario {}: {}", first.scenario_id, shares.join(", "));
    }
}

fn format_share(row: &SummaryRow) -> String {
    match row.mean {
        Some(mean) => format!("{} {:.1}%", row.metric, mean * 100.0),
        None => format!("{} n/a", row.metric),
    }
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // We don't save log files when running the validate command
    log::init(Some(&settings.log_level), None).context("Failed to initialise logging.")?;

    let model = Model::from_path(model_path).context("Failed to validate model.")?;
    model
        .prepare_scenarios()
        .context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}
