use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use mirror_sync::{directory_verdict, ControllerOptions, LogEvent, MirrorOptions, SyncController};
use std::future::Future;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

mod config;
mod discovery;
mod telemetry;

use config::{default_config_path, AppConfig, ConfigStore};
use discovery::SaveLocator;

/// How often queued events are printed while mirroring
const EVENT_POLL: Duration = Duration::from_secs(1);

const OVERWRITE_WARNING: &str = "\
save-mirror keeps the destination identical to the source.
Whenever the two differ, EVERY file in the destination is deleted and replaced by the source's files.
Back up anything in the destination you want to keep.";

#[derive(Parser)]
#[command(name = "save-mirror")]
#[command(about = "Keep a game save folder identical to a chosen source folder")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides the configured one
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Args, Debug, Default)]
struct PairArgs {
    /// Folder whose files are mirrored
    #[arg(short, long, conflicts_with = "preset")]
    source: Option<String>,

    /// Use a bundled save set as the source
    #[arg(short, long)]
    preset: Option<String>,

    /// Folder that is replaced with the source's files
    #[arg(short, long)]
    destination: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start mirroring until interrupted with Ctrl+C
    Run {
        #[command(flatten)]
        pair: PairArgs,

        /// Accept a destination that does not look like a save folder without asking
        #[arg(long)]
        force: bool,

        /// Accept the overwrite warning without asking
        #[arg(long)]
        accept_overwrite: bool,

        /// Seconds between two checks
        #[arg(short, long, value_name = "SECS")]
        interval: Option<f64>,
    },
    /// Run the guardrails on a pair without starting anything
    Check {
        #[command(flatten)]
        pair: PairArgs,
    },
    /// Find the game's save folder
    Discover {
        /// User id to pick when several exist
        #[arg(long)]
        id: Option<String>,

        /// Remember the folder as the destination
        #[arg(long)]
        save: bool,
    },
    /// List the bundled presets
    Presets,
    /// Inspect or reset the configuration
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(Subcommand)]
enum ConfigActions {
    /// Print the effective configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Restore the default configuration
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let store = ConfigStore::open(cli.config.clone().unwrap_or_else(default_config_path))?;
    let config = store.current();

    let level = cli.log_level.as_deref().unwrap_or(&config.settings.log_level);
    let _log_guard = telemetry::initialize_logging(&config.logging, level)?;
    info!("Using configuration at {}", store.path().display());

    match cli.command {
        Commands::Run { pair, force, accept_overwrite, interval } => {
            let interval = parse_interval(interval, config.settings.interval)?;
            run(store, pair, force, accept_overwrite, interval).await
        }
        Commands::Check { pair } => check(&config, &pair),
        Commands::Discover { id, save } => discover(&store, id.as_deref(), save),
        Commands::Presets => list_presets(&config),
        Commands::Config { action } => match action {
            ConfigActions::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigActions::Path => {
                println!("{}", store.path().display());
                Ok(())
            }
            ConfigActions::Reset => {
                store.reset()?;
                println!("Configuration reset at {}", store.path().display());
                Ok(())
            }
        },
    }
}

async fn run(
    store: ConfigStore,
    pair: PairArgs,
    force: bool,
    accept_overwrite: bool,
    interval: Duration,
) -> Result<()> {
    let config = store.current();

    if !config.settings.overwrite_acknowledged {
        if !accept_overwrite && !confirm(&format!("{}\nContinue?", OVERWRITE_WARNING))? {
            bail!("Overwrite warning not accepted, nothing was started");
        }
        store.update(|c| c.settings.overwrite_acknowledged = true)?;
    }

    let (source, destination) = resolve_pair(&config, &pair)?;

    let mut controller = SyncController::new(ControllerOptions {
        interval,
        validator: config.validator(),
        mirror: MirrorOptions::default(),
        last_paths: config.paths.clone(),
    })
    .with_store(store);

    match controller.request_start(&source, &destination, force) {
        Ok(()) => {}
        Err(e) if e.needs_confirmation() => {
            let question = format!(
                "{} ('{}' has none of the usual save folder names). Mirror into it anyway?",
                e, destination
            );
            if !confirm(&question)? {
                bail!("Cancelled, nothing was started");
            }
            warn!("Mirroring into an unusual destination after confirmation");
            controller.request_start(&source, &destination, true)?;
        }
        Err(e) => return Err(e.into()),
    }

    println!("Mirroring '{}' -> '{}' every {:?}. Press Ctrl+C to stop.", source.trim(), destination.trim(), interval);

    supervise(&mut controller, tokio::signal::ctrl_c()).await
}

/// Print events until `shutdown` resolves, then stop the controller. The controller is
/// stopped even when waiting for the shutdown signal fails.
async fn supervise<F>(controller: &mut SyncController, shutdown: F) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);
    let mut poll = tokio::time::interval(EVENT_POLL);

    let signal = loop {
        tokio::select! {
            result = &mut shutdown => break result,
            _ = poll.tick() => print_events(controller.drain_events()),
        }
    };

    controller.request_stop().await;
    print_events(controller.drain_events());

    signal.context("Failed to listen for Ctrl+C")?;
    info!("Interrupt received, mirroring stopped");
    Ok(())
}

/// Interval from the command line, or the configured one
fn parse_interval(secs: Option<f64>, configured: Duration) -> Result<Duration> {
    let Some(secs) = secs else {
        return Ok(configured);
    };
    if secs <= 0.0 {
        bail!("Interval must be a positive number of seconds, got {}", secs);
    }
    Duration::try_from_secs_f64(secs).with_context(|| format!("Interval of {} seconds is out of range", secs))
}

/// Pick the pair from flags, falling back to the last accepted one
fn resolve_pair(config: &AppConfig, pair: &PairArgs) -> Result<(String, String)> {
    let saved = config.paths.as_ref();

    let source = match (&pair.preset, &pair.source) {
        (Some(preset), _) => {
            let root = discovery::preset_root(&config.presets)?;
            discovery::preset_path(&root, preset)?.to_string_lossy().into_owned()
        }
        (None, Some(source)) => source.clone(),
        (None, None) => match saved {
            Some(saved) => saved.source.clone(),
            None => bail!("No source given, pass --source or --preset"),
        },
    };

    let destination = match (&pair.destination, saved) {
        (Some(destination), _) => destination.clone(),
        (None, Some(saved)) => saved.destination.clone(),
        (None, None) => bail!("No destination given, pass --destination or run `save-mirror discover --save`"),
    };

    Ok((source, destination))
}

fn check(config: &AppConfig, pair: &PairArgs) -> Result<()> {
    let (source, destination) = resolve_pair(config, pair)?;
    let validator = config.validator();

    for (label, path) in [("source", source.trim()), ("destination", destination.trim())] {
        println!("{}: {}", label, path);
        println!("  valid syntax:       {}", yes_no(validator.validate_syntax(path)));
        println!("  system directory:   {}", yes_no(validator.is_system_directory(path)));
        println!("  looks like a save:  {}", yes_no(validator.looks_like_application_save_path(path)));
        println!("  contents:           {}", directory_verdict(Path::new(path)));
    }

    let controller = SyncController::new(ControllerOptions {
        validator,
        last_paths: config.paths.clone(),
        ..ControllerOptions::default()
    });

    match controller.preflight(&source, &destination, false) {
        Ok(target) => {
            println!("Ready to mirror {}", target);
            Ok(())
        }
        Err(e) if e.needs_confirmation() => {
            println!("Needs confirmation: {}", e);
            Ok(())
        }
        Err(e) => bail!("Refused: {}", e),
    }
}

fn discover(store: &ConfigStore, id: Option<&str>, save: bool) -> Result<()> {
    let config = store.current();
    let locator = SaveLocator::from_env(&config.discovery)?;

    let candidates = locator.candidates()?;
    for candidate in &candidates {
        println!("{}  {}", candidate.id, candidate.path.display());
    }

    let chosen = locator.resolve(id)?;
    println!("Destination: {}", chosen.path.display());

    if save {
        let destination = chosen.path.to_string_lossy().into_owned();
        store.update(|c| {
            let paths = c.paths.get_or_insert_with(Default::default);
            paths.destination = destination;
        })?;
        println!("Saved as the default destination");
    }
    Ok(())
}

fn list_presets(config: &AppConfig) -> Result<()> {
    let root = discovery::preset_root(&config.presets)?;
    let names = discovery::list_presets(&root)?;

    if names.is_empty() {
        println!("No presets found under {}", root.display());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn print_events(events: Vec<LogEvent>) {
    for event in events {
        println!("{}", event);
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn confirm(question: &str) -> Result<bool> {
    let stdin = std::io::stdin();
    confirm_with(&mut stdin.lock(), &mut std::io::stdout(), question)
}

fn confirm_with(input: &mut impl BufRead, output: &mut impl Write, question: &str) -> Result<bool> {
    write!(output, "{} [y/N] ", question)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
