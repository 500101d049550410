use clap::{Parser, Subcommand};
use serde::Serialize;
use serial_flow::config::{Config, ConfigLoader};
use serial_flow::logging::init_logging;
use serial_flow::port::{
    AsyncPortWriter, BlockingPortWrapper, Handshake, MockDriver, PortSettings, PortSnapshot,
    SerialPort, WriteTimeout, XOFF, XON,
};
use serial_flow::timing::{measure_write_timeout, TimingReport};
use serial_flow::AppResult;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How long a command waits for queued bytes to reach the wire before closing.
const DRAIN_WAIT: Duration = Duration::from_secs(5);

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-flow",
    version,
    about = "Flow-controlled serial writes with bounded timeouts.",
    long_about = "Writes to serial ports through a bounded transmit buffer gated by XON/XOFF and RTS/CTS flow control, and demonstrates the engine on an in-memory null modem."
)]
struct Cli {
    /// Configuration file (overrides the standard search path).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write DATA to a real serial port.
    Write {
        /// Text to send.
        data: String,
        /// Port name or configured alias.
        #[arg(short, long)]
        port: String,
        /// none, rts, xon_xoff or rts_xon_xoff.
        #[arg(long)]
        handshake: Option<Handshake>,
        /// Write timeout in milliseconds; omit to block indefinitely.
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long)]
        baud: Option<u32>,
        /// Print machine-readable JSON.
        #[arg(long)]
        json: bool,
    },
    /// Walk a write through block and release on an in-memory null modem.
    Simulate {
        #[arg(long, default_value = "xon_xoff")]
        handshake: Handshake,
        /// Bytes to write while blocked.
        #[arg(long, default_value_t = 64)]
        size: usize,
        #[arg(long, default_value_t = 100)]
        timeout_ms: u64,
        #[arg(long)]
        json: bool,
    },
    /// Measure write-timeout accuracy against a port held blocked by XOFF.
    Timing {
        #[arg(long, default_value_t = 250)]
        timeout_ms: u64,
        #[arg(long)]
        attempts: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct WriteOutcome {
    port: String,
    bytes: usize,
    drained: bool,
    snapshot: PortSnapshot,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SimulationStep {
    step: &'static str,
    snapshot: PortSnapshot,
    note: Option<String>,
}

fn load_config(path: Option<PathBuf>) -> AppResult<Config> {
    let loader = match path {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(path) = &loader.config_path {
        debug!(path = %path.display(), "configuration loaded");
    }
    Ok(loader.into_config())
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn describe(snapshot: &PortSnapshot) -> String {
    format!(
        "bytes_to_write={} gate={} cts={} xoff={}",
        snapshot.bytes_to_write,
        if snapshot.gate_open { "open" } else { "blocked" },
        snapshot.cts_holding,
        snapshot.xoff_received
    )
}

async fn run_write(
    config: &Config,
    data: String,
    port: String,
    handshake: Option<Handshake>,
    timeout_ms: Option<u64>,
    baud: Option<u32>,
    json: bool,
) -> AppResult<()> {
    let mut settings = config.port.to_settings();
    if let Some(handshake) = handshake {
        settings.handshake = handshake;
    }
    if let Some(ms) = timeout_ms {
        settings.write_timeout = WriteTimeout::from_millis(ms);
    }
    if let Some(baud) = baud {
        settings.baud_rate = baud;
    }

    let name = config.port.resolve_port(&port);
    let port = Arc::new(SerialPort::with_settings(name.clone(), settings));
    tokio::task::spawn_blocking({
        let port = Arc::clone(&port);
        move || port.open()
    })
    .await??;

    let writer = BlockingPortWrapper::new(Arc::clone(&port));
    let bytes = data.len();
    let result = writer.write(data.into_bytes()).await;

    let drained = tokio::task::spawn_blocking({
        let port = Arc::clone(&port);
        move || port.wait_for(|s| s.bytes_to_write == 0, DRAIN_WAIT)
    })
    .await?;
    let snapshot = port.snapshot();
    writer.close().await?;

    let outcome = WriteOutcome {
        port: name,
        bytes,
        drained,
        snapshot,
        error: result.as_ref().err().map(ToString::to_string),
    };
    if json {
        print_json(&outcome)?;
    } else {
        println!(
            "{}: {} byte(s) written, drained={} ({})",
            outcome.port,
            outcome.bytes,
            outcome.drained,
            describe(&outcome.snapshot)
        );
    }
    result.map_err(Into::into)
}

/// Open both ends of an in-memory cable; `local` runs `settings`.
fn open_null_modem(settings: PortSettings) -> AppResult<(SerialPort, SerialPort)> {
    let (a, b) = MockDriver::null_modem("SIM0", "SIM1");
    let local = SerialPort::with_settings("SIM0", settings);
    let remote = SerialPort::new("SIM1");
    remote.open_with(Box::new(b))?;
    local.open_with(Box::new(a))?;
    Ok((local, remote))
}

/// Have the far end stop (`hold = true`) or resume the local transmitter.
fn signal_flow(remote: &SerialPort, handshake: Handshake, hold: bool) -> AppResult<()> {
    if handshake.uses_software() {
        remote.write(&[if hold { XOFF } else { XON }])?;
    }
    if handshake.uses_hardware() {
        remote.set_rts_enable(!hold)?;
    }
    Ok(())
}

fn run_simulation(
    settings: PortSettings,
    size: usize,
    timeout: WriteTimeout,
) -> AppResult<Vec<SimulationStep>> {
    let handshake = settings.handshake;
    let (local, remote) = open_null_modem(settings)?;
    let mut steps = Vec::new();

    steps.push(SimulationStep {
        step: "opened",
        snapshot: local.snapshot(),
        note: Some(format!("handshake {handshake}")),
    });

    signal_flow(&remote, handshake, true)?;
    let blocked = local.wait_for(|s| !s.gate_open, Duration::from_secs(1));
    steps.push(SimulationStep {
        step: "peer holds",
        snapshot: local.snapshot(),
        note: (!blocked).then(|| "gate stays open without flow control".to_string()),
    });

    let payload: Vec<u8> = (0..size).map(|i| b'a' + (i % 26) as u8).collect();
    let result = local.write_with_timeout(&payload, timeout);
    steps.push(SimulationStep {
        step: "write",
        snapshot: local.snapshot(),
        note: Some(match &result {
            Ok(()) => "completed".to_string(),
            Err(e) => e.to_string(),
        }),
    });

    signal_flow(&remote, handshake, false)?;
    let drained = local.wait_for(|s| s.gate_open && s.bytes_to_write == 0, DRAIN_WAIT);
    steps.push(SimulationStep {
        step: "peer releases",
        snapshot: local.snapshot(),
        note: (!drained).then(|| "buffer did not drain".to_string()),
    });

    local.close()?;
    remote.close()?;
    info!(steps = steps.len(), "simulation finished");
    Ok(steps)
}

fn run_timing(mut config: Config, timeout_ms: u64) -> AppResult<TimingReport> {
    config.port.handshake = Handshake::XOnXOff;
    config.port.write_timeout_ms = Some(timeout_ms);
    let (local, remote) = open_null_modem(config.port.to_settings())?;

    signal_flow(&remote, Handshake::XOnXOff, true)?;
    local.wait_for(|s| !s.gate_open, Duration::from_secs(1));

    let report = measure_write_timeout(&local, &config.timing)?;
    local.close()?;
    remote.close()?;
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config)?;
    init_logging(&config.logging)?;

    match cli.command {
        Command::Write {
            data,
            port,
            handshake,
            timeout_ms,
            baud,
            json,
        } => run_write(&config, data, port, handshake, timeout_ms, baud, json).await?,

        Command::Simulate {
            handshake,
            size,
            timeout_ms,
            json,
        } => {
            let mut settings = config.port.to_settings();
            settings.handshake = handshake;
            let timeout = WriteTimeout::from_millis(timeout_ms);
            let steps =
                tokio::task::spawn_blocking(move || run_simulation(settings, size, timeout))
                    .await??;
            if json {
                print_json(&steps)?;
            } else {
                for step in &steps {
                    match &step.note {
                        Some(note) => {
                            println!("{:<14} {} ({})", step.step, describe(&step.snapshot), note)
                        }
                        None => println!("{:<14} {}", step.step, describe(&step.snapshot)),
                    }
                }
            }
        }

        Command::Timing {
            timeout_ms,
            attempts,
            json,
        } => {
            let mut config = config;
            if let Some(attempts) = attempts {
                config.timing.attempts = attempts;
            }
            let report =
                tokio::task::spawn_blocking(move || run_timing(config, timeout_ms)).await??;
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "expected {:.1} ms, average {:.1} ms, deviation {:.1}% (limit {:.1}%): {}",
                    report.expected_ms,
                    report.average_ms,
                    report.deviation * 100.0,
                    report.max_deviation * 100.0,
                    if report.within_tolerance() { "ok" } else { "out of tolerance" }
                );
            }
        }
    }

    Ok(())
}
