//! HID-MIDI - joystick and gamepad controls to MIDI
//!
//! Interactive setup by default; `--run <FILE>` starts straight from a saved
//! mapping file.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hidmidi::calibration::Calibrator;
use hidmidi::cli::{self, Cancelled, Menu, Prepared};
use hidmidi::config::MappingSet;
use hidmidi::dispatch::Dispatcher;
use hidmidi::input;
use hidmidi::monitor::{Monitor, DISPLAY_INTERVAL};
use hidmidi::paths::AppPaths;
use hidmidi::session::Session;
use hidmidi::transport::MidiOutTransport;

/// HID-MIDI - map joystick and gamepad controls to MIDI notes and CCs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Mapping file to open, skipping the file picker
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding *.hidmidi.json files (default: working directory)
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Write logs to a daily file in the log directory instead of stderr
    #[arg(long)]
    log_file: bool,

    /// List connected controllers and their controls
    #[arg(long)]
    list_devices: bool,

    /// List available MIDI output ports
    #[arg(long)]
    list_ports: bool,

    /// Run a mapping file without any menus
    #[arg(long, value_name = "FILE")]
    run: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let paths = AppPaths::detect(args.config_dir.clone());

    let log_dir = if args.log_file {
        paths.ensure_directories()?;
        Some(paths.logs_dir.as_path())
    } else {
        None
    };
    let _log_guard = init_logging(&args.log_level, log_dir)?;

    info!("Starting HID-MIDI v{}", env!("CARGO_PKG_VERSION"));
    debug!("Paths: {:?}", paths);

    if args.list_ports {
        cli::print_output_ports()?;
        return Ok(());
    }

    if args.list_devices {
        tokio::task::spawn_blocking(|| input::print_device_diagnostics(input::DEFAULT_SETTLE))
            .await??;
        return Ok(());
    }

    let prepared = match args.run {
        Some(path) => tokio::task::spawn_blocking(move || prepare_headless(&path)).await??,
        None => {
            let runtime = tokio::runtime::Handle::current();
            let preselected = args.config;
            let outcome = tokio::task::spawn_blocking(move || {
                let mut menu = Menu::new(paths, Calibrator::default(), runtime)?;
                if let Some(path) = preselected {
                    menu = menu.with_config(path);
                }
                menu.run()
            })
            .await?;

            match outcome {
                Ok(prepared) => prepared,
                Err(e) if e.is::<Cancelled>() => {
                    println!("\nExiting...");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    };

    run(prepared).await?;

    info!("HID-MIDI shutdown complete");
    Ok(())
}

/// Load `path`, find its controller and open its port without prompting
fn prepare_headless(path: &Path) -> Result<Prepared> {
    let runtime = tokio::runtime::Handle::current();
    let set = runtime
        .block_on(MappingSet::load(path))
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let device = input::find_device(&set.device_id, input::DEFAULT_SETTLE)?;
    info!("Using controller {} ({})", device.name, device.id);
    let output_name = set.output_name.clone();

    let session = Arc::new(Session::new(set));
    let ingestion = input::spawn_ingestion(device.id, session.clone())?;

    let transport = match MidiOutTransport::open(&output_name) {
        Ok(transport) => transport,
        Err(e) => {
            session.stop();
            return Err(e).with_context(|| format!("Configured MIDI port '{}' not found", output_name));
        }
    };

    Ok(Prepared {
        session,
        ingestion,
        transport,
    })
}

/// Dispatch with the live monitor until Enter, Ctrl+C or disconnect
async fn run(prepared: Prepared) -> Result<()> {
    let Prepared {
        session,
        ingestion,
        transport,
    } = prepared;

    let config = session.config();
    println!("\n--- Monitoring Active ---");
    println!("Device: {}", config.device_name);
    println!("Mappings: {}", config.mappings.len());
    cli::print_mappings(&config, 1);
    println!("MIDI Port: {}", transport.port_name());
    println!("(Press Enter or Ctrl+C to exit)\n");

    let ctrl_c_session = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            ctrl_c_session.stop();
        }
    });

    // Left blocked on stdin if the stop comes from elsewhere
    let enter_session = session.clone();
    thread::Builder::new()
        .name("hidmidi-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            if matches!(std::io::stdin().read_line(&mut line), Ok(n) if n > 0) {
                enter_session.stop();
            }
        })?;

    let dispatch_session = session.clone();
    let dispatch = thread::Builder::new()
        .name("hidmidi-dispatch".to_string())
        .spawn(move || {
            let mut dispatcher = Dispatcher::new(dispatch_session, Box::new(transport));
            let mut monitor = Monitor::stdout();
            let stats = dispatcher.run_with_display(DISPLAY_INTERVAL, |layout| monitor.show(layout));
            monitor.finish();
            stats
        })?;

    let stats = tokio::task::spawn_blocking(move || dispatch.join())
        .await?
        .map_err(|_| anyhow!("dispatch thread panicked"))?;

    session.stop();
    tokio::task::spawn_blocking(move || ingestion.join())
        .await?
        .map_err(|_| anyhow!("ingestion thread panicked"))?;

    println!("\nExiting...");
    info!(
        "Sent {} message(s), {} failed, over {} tick(s)",
        stats.sent, stats.send_failures, stats.ticks
    );
    Ok(())
}

fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "hidmidi.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.with_writer(writer).with_ansi(false))
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.with_writer(std::io::stderr))
                .try_init()?;
            Ok(None)
        }
    }
}
