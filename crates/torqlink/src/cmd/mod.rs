use std::sync::mpsc;
use std::time::{Duration, Instant};

use clap::{Args, Subcommand, ValueEnum};
use torqlink_client::{Client, ClientConfig, Event, DEFAULT_PORT};

use crate::exit::{CliError, CliResult, FAILURE, TIMEOUT};
use crate::output::OutputFormat;

pub mod batch;
pub mod job;
pub mod monitor;
pub mod pset;
pub mod tool;
pub mod version;
pub mod vin;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a controller and print its events.
    Monitor(monitor::MonitorArgs),
    /// Enable, disable, or start the tool.
    Tool(tool::ToolArgs),
    /// Download a VIN for traceability.
    Vin(vin::VinArgs),
    /// Select a job.
    Job(job::JobArgs),
    /// Select a parameter set.
    Pset(pset::PsetArgs),
    /// Reset or decrement the batch counter.
    Batch(batch::BatchArgs),
    /// Show version information.
    Version(version::VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, format),
        Command::Tool(args) => tool::run(args, format),
        Command::Vin(args) => vin::run(args, format),
        Command::Job(args) => job::run(args, format),
        Command::Pset(args) => pset::run(args, format),
        Command::Batch(args) => batch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Connection arguments shared by every controller-facing subcommand.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Controller hostname or address.
    pub host: String,
    /// Controller port.
    #[arg(long, short = 'p', default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Fixed spindle count (overrides controller reports).
    #[arg(long, value_name = "N")]
    pub spindles: Option<u8>,
    /// Time to wait for the link handshake (seconds).
    #[arg(long, default_value_t = 5)]
    pub connect_timeout: u64,
}

/// Connect and wait for the link to come up. The returned receiver sees
/// every event from the moment of connection.
pub fn connect(args: &ConnectArgs) -> CliResult<(Client, mpsc::Receiver<Event>)> {
    let mut config = ClientConfig::new(args.host.clone());
    config.port = args.port;
    config.spindle_count = args.spindles;
    // One-shot commands should fail, not retry forever.
    config.auto_reconnect = false;

    let client = Client::new(config);
    let (tx, rx) = mpsc::channel();
    client.on(move |event| {
        let _ = tx.send(event.clone());
    });

    client
        .connect()
        .map_err(|err| crate::exit::client_error("connect failed", err))?;

    let deadline = Instant::now() + Duration::from_secs(args.connect_timeout);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(CliError::new(
                TIMEOUT,
                "controller did not acknowledge communication start",
            ));
        }
        match rx.recv_timeout(remaining) {
            Ok(Event::LinkEstablished { .. }) => return Ok((client, rx)),
            Ok(Event::Disconnected) => {
                return Err(CliError::new(FAILURE, "controller closed the connection"))
            }
            Ok(_) => continue,
            Err(_) => {
                return Err(CliError::new(
                    TIMEOUT,
                    "controller did not acknowledge communication start",
                ))
            }
        }
    }
}

/// Wait for the acknowledgement of a tracked command.
pub fn await_command(
    rx: &mpsc::Receiver<Event>,
    command_id: u64,
    context: &str,
) -> CliResult<()> {
    let deadline = Instant::now() + Duration::from_secs(6);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(CliError::new(TIMEOUT, format!("{context}: no response")));
        }
        match rx.recv_timeout(remaining) {
            Ok(Event::CommandSuccess { command_id: id, .. }) if id == command_id => {
                return Ok(())
            }
            Ok(Event::CommandFailed {
                command_id: id,
                error_code,
                message,
                ..
            }) if id == command_id => {
                return Err(CliError::new(
                    FAILURE,
                    format!("{context}: controller error {error_code}: {message}"),
                ));
            }
            Ok(Event::CommandTimeout { command_id: id, .. }) if id == command_id => {
                return Err(CliError::new(TIMEOUT, format!("{context}: timed out")));
            }
            Ok(Event::CommandAborted { command_id: id, .. }) if id == command_id => {
                return Err(CliError::new(FAILURE, format!("{context}: aborted")));
            }
            Ok(_) => continue,
            Err(_) => return Err(CliError::new(TIMEOUT, format!("{context}: no response"))),
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ToolAction {
    Enable,
    Disable,
    Start,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum BatchAction {
    Reset,
    Decrement,
}
