//! The command line interface for the program.
use crate::input::load_model;
use crate::log;
use crate::output::{create_output_directory, get_output_dir};
use crate::scenario::{run_batch, run_model};
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the program.
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

/// Options for commands which solve scenarios
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to write constraint duals to a CSV file
    #[arg(long)]
    pub debug_model: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Solve a scenario.
    Run {
        /// Path to the scenario directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Solve every scenario in a directory, one after another.
    Batch {
        /// Path to a directory containing one subdirectory per scenario.
        batch_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Check that a scenario's input files are valid without solving it.
    Validate {
        /// Path to the scenario directory.
        model_dir: PathBuf,
    },
    /// Manage the bundled demo scenarios.
    Example {
        /// The available subcommands for managing demo scenarios.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Manage the program settings file.
    Settings {
        /// The available subcommands for managing settings.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts, None),
            Self::Batch { batch_dir, opts } => handle_batch_command(&batch_dir, &opts, None),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ portfolio_match --markdown-help`
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

/// Load program settings, if not provided, applying overrides from the command line
fn load_settings(opts: &RunOpts, settings: Option<Settings>) -> Result<Settings> {
    let mut settings = match settings {
        Some(settings) => settings,
        None => Settings::load().context("Failed to load settings.")?,
    };

    if opts.overwrite {
        settings.overwrite = true;
    }
    if opts.debug_model {
        settings.debug_model = true;
    }

    Ok(settings)
}

/// Work out where results go and create the folder, returning whether it was overwritten
fn prepare_output_dir(
    model_path: &Path,
    opts: &RunOpts,
    overwrite: bool,
) -> Result<(PathBuf, bool)> {
    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => get_output_dir(model_path)?,
    };

    let overwritten = create_output_directory(&output_path, overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    Ok((output_path, overwritten))
}

/// Handle the `run` command.
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(opts, settings)?;
    let (output_path, overwritten) = prepare_output_dir(model_path, opts, settings.overwrite)?;

    log::init(&settings.log_level, Some(&output_path))
        .context("Failed to initialise logging.")?;

    let model = load_model(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwritten {
        warn!("Output folder was overwritten");
    }

    run_model(&model, &output_path, settings.debug_model)?;
    info!("Run complete!");

    Ok(())
}

/// Handle the `batch` command.
pub fn handle_batch_command(
    batch_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(opts, settings)?;
    let (output_path, overwritten) = prepare_output_dir(batch_path, opts, settings.overwrite)?;

    // Each scenario keeps its own results, but the log covers the whole batch
    log::init(&settings.log_level, Some(&output_path))
        .context("Failed to initialise logging.")?;
    if overwritten {
        warn!("Output folder was overwritten");
    }

    run_batch(
        batch_path,
        &output_path,
        settings.overwrite,
        settings.debug_model,
    )
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = match settings {
        Some(settings) => settings,
        None => Settings::load().context("Failed to load settings.")?,
    };

    // No log files are written when validating
    log::init(&settings.log_level, None).context("Failed to initialise logging.")?;

    load_model(model_path).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}
