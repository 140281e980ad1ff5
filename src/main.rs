use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use pressure_timer::cli::{Cli, Command, StationAction};
use pressure_timer::config::PressureConfig;
use pressure_timer::grid::PositionMapper;
use pressure_timer::sequence::{SequenceValidator, establish_sequence};
use pressure_timer::session::{EnterOutcome, InputMode, SessionController};
use pressure_timer::store::{RecordStore, SqliteStore, normalize_barcode};
use pressure_timer::timer::TimerRegistry;
use pressure_timer::ui::{self, ConsoleSurface, Notice};

const HELP: &str = "Scan or type a value and press Enter. Commands: \
:mode general|double|triple, :pause CODE, :resume CODE, :stop CODE, :list, :help, :quit";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = PressureConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Run { mode } => run_session(config, mode.map(Into::into), cli.verbose).await,
        Command::Stations => {
            let store = open_store(&config)?;
            let stations = store.valid_stations()?;
            if stations.is_empty() {
                println!("No stations registered");
            }
            for station in stations {
                println!("{}", store.workstation_sequence(&station)?);
            }
            Ok(())
        }
        Command::Station {
            action:
                StationAction::Add {
                    name,
                    previous,
                    description,
                },
        } => {
            let store = open_store(&config)?;
            store.register_station(name.trim(), previous.as_deref(), description.as_deref())?;
            println!("{}", store.workstation_sequence(name.trim())?);
            Ok(())
        }
        Command::Check { barcode } => {
            let store = open_store(&config)?;
            let sequence = establish_sequence(&store, &config)?;
            let barcode = normalize_barcode(&barcode);
            let clearance = SequenceValidator::new(sequence).validate(&store, &barcode)?;
            println!("{barcode}: {clearance}");
            Ok(())
        }
        Command::Grid => {
            config.validate_grid()?;
            print!("{}", ui::render_grid(&PositionMapper::new(config.columns)));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &PressureConfig) -> Result<SqliteStore> {
    SqliteStore::open(&config.store.path)
        .with_context(|| format!("opening record store at {}", config.store.path.display()))
}

async fn run_session(config: PressureConfig, mode: Option<InputMode>, verbose: bool) -> Result<()> {
    let store = Arc::new(open_store(&config)?);
    let sequence = match establish_sequence(store.as_ref(), &config) {
        Ok(sequence) => sequence,
        Err(err) => {
            error!(error = %err, "Station cannot start");
            return Err(err.into());
        }
    };

    let (registry, events) = TimerRegistry::new();
    let registry = Arc::new(registry);
    let (notices_tx, notices) = mpsc::unbounded_channel();
    let console = notices_tx.clone();

    let consumer = tokio::spawn(async move {
        let mut surface = ConsoleSurface::new(verbose);
        ui::dispatch(events, notices, &mut surface).await
    });

    let mut controller = SessionController::new(
        config,
        sequence,
        Arc::clone(&store),
        Arc::clone(&registry),
        notices_tx,
    );
    if let Some(mode) = mode {
        controller.set_mode(mode);
    }
    let _ = console.send(Notice::Status(format!(
        "Station {} ready in {} mode, enter a {}",
        controller.sequence(),
        controller.mode(),
        controller.focus()
    )));
    let _ = console.send(Notice::Status(HELP.to_string()));

    let mut input = spawn_input_reader();
    loop {
        tokio::select! {
            line = input.recv() => match line {
                Some(line) => {
                    if !handle_line(&mut controller, &registry, &console, &line).await {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    registry.shutdown();
    drop(controller);
    drop(console);
    drop(registry);
    let tally = consumer.await.context("presentation task failed")?;
    info!(summary = %tally.summary(), "Session closed");
    Ok(())
}

/// Returns false when the operator asked to quit.
async fn handle_line(
    controller: &mut SessionController<SqliteStore>,
    registry: &TimerRegistry,
    console: &UnboundedSender<Notice>,
    line: &str,
) -> bool {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix(':') else {
        match controller.enter(trimmed).await {
            EnterOutcome::Started(report) => {
                debug!(codes = ?report.codes, persisted = ?report.persisted, "Start handled");
            }
            EnterOutcome::Awaiting(focus) => debug!(%focus, "Awaiting next field"),
            EnterOutcome::Rejected(err) => debug!(error = %err, "Entry rejected"),
        }
        return true;
    };

    let mut parts = command.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts.next().unwrap_or_default();
    let status = |line: String| {
        let _ = console.send(Notice::Status(line));
    };

    match verb.as_str() {
        "q" | "quit" | "exit" => return false,
        "help" | "h" => status(HELP.to_string()),
        "mode" => match arg.parse::<InputMode>() {
            Ok(mode) => controller.set_mode(mode),
            Err(err) => status(err),
        },
        "list" | "ls" => {
            let snapshots: Vec<_> = registry.all().iter().map(|t| t.snapshot()).collect();
            for row in ui::render_list(&snapshots).lines() {
                status(row.to_string());
            }
        }
        "pause" | "resume" | "stop" => {
            let result = match verb.as_str() {
                "pause" => controller.pause(arg),
                "resume" => controller.resume(arg),
                _ => controller.stop(arg),
            };
            match result {
                Ok(Some(snapshot)) => status(format!("{} {}", snapshot.code, snapshot.state)),
                Ok(None) => status(format!("No timer at {}", arg.to_uppercase())),
                Err(err) => {
                    let _ = console.send(Notice::Alert {
                        title: "Invalid code".to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
        other => status(format!("Unknown command :{other}. {HELP}")),
    }
    true
}

/// Stdin is read on a plain thread so a pending read never holds up shutdown.
fn spawn_input_reader() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
