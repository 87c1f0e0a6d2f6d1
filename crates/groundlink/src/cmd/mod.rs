use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use groundlink_link::{LinkConfig, LinkManager, LogEntry};
use groundlink_transport::{
    Endpoint, TransportMode, DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PATH, DEFAULT_TCP_HOST,
    DEFAULT_TCP_PORT,
};
use tokio::time::Instant;

use crate::exit::{io_error, link_error, CliError, CliResult, TIMEOUT, USAGE};
use crate::output::{DispatchOutput, OutputFormat};

pub mod command;
pub mod goto_local;
pub mod mission;
pub mod monitor;
pub mod params;
pub mod version;

/// How often one-shot commands poll the log while waiting for a reply.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream telemetry, requesting status on an interval.
    Monitor(MonitorArgs),
    /// Fetch and print the vehicle parameter list.
    Params(ParamsArgs),
    /// Set one vehicle parameter.
    ParamSet(ParamSetArgs),
    /// Send a MAV_CMD command.
    Command(CommandArgs),
    /// Upload or clear the mission.
    #[command(subcommand)]
    Mission(MissionCommand),
    /// Fly to a local NED position (metres).
    GotoLocal(GotoLocalArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, link: LinkArgs, format: OutputFormat) -> CliResult<i32> {
    if let Command::Version(args) = command {
        return version::run(args);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime start failed", err))?;
    runtime.block_on(dispatch(command, link, format))
}

async fn dispatch(command: Command, link: LinkArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, &link, format).await,
        Command::Params(args) => params::run_list(args, &link, format).await,
        Command::ParamSet(args) => params::run_set(args, &link, format).await,
        Command::Command(args) => command::run(args, &link, format).await,
        Command::Mission(command) => mission::run(command, &link, format).await,
        Command::GotoLocal(args) => goto_local::run(args, &link, format).await,
        Command::Version(args) => version::run(args),
    }
}

/// Link settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Transport kind: serial (production) or tcp (simulator).
    #[arg(long, env = "GROUNDLINK_MODE", default_value = "tcp", global = true)]
    pub mode: TransportMode,
    /// Serial device path.
    #[arg(long, env = "GROUNDLINK_SERIAL_PATH", default_value = DEFAULT_SERIAL_PATH, global = true)]
    pub serial_path: String,
    /// Serial baud rate.
    #[arg(long, env = "GROUNDLINK_BAUD", default_value_t = DEFAULT_BAUD_RATE, global = true)]
    pub baud: u32,
    /// TCP host.
    #[arg(long, env = "GROUNDLINK_TCP_HOST", default_value = DEFAULT_TCP_HOST, global = true)]
    pub host: String,
    /// TCP port.
    #[arg(long, env = "GROUNDLINK_TCP_PORT", default_value_t = DEFAULT_TCP_PORT, global = true)]
    pub port: u16,
    /// Vehicle system id.
    #[arg(long, default_value_t = 1, global = true)]
    pub target_system: u8,
    /// Vehicle component id.
    #[arg(long, default_value_t = 1, global = true)]
    pub target_component: u8,
    /// Maximum time to open the link (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s", global = true)]
    pub connect_timeout: String,
}

impl LinkArgs {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::from_mode(
            self.mode,
            &self.serial_path,
            self.baud,
            &self.host,
            self.port,
        )
    }

    pub fn config(&self) -> LinkConfig {
        LinkConfig {
            target_system: self.target_system,
            target_component: self.target_component,
            ..LinkConfig::default()
        }
    }

    pub fn dispatch_output(&self, action: &'static str, detail: Option<String>) -> DispatchOutput {
        DispatchOutput {
            action,
            target: format!("{}/{}", self.target_system, self.target_component),
            link: self.endpoint().to_string(),
            detail,
        }
    }
}

/// Open the link or fail. Background reconnects are cancelled on failure.
pub async fn connect(link: &LinkArgs) -> CliResult<LinkManager<Endpoint>> {
    let timeout = parse_duration(&link.connect_timeout)?;
    let manager = LinkManager::new(link.endpoint(), link.config());
    match tokio::time::timeout(timeout, manager.ensure_connected()).await {
        Ok(Ok(())) => Ok(manager),
        Ok(Err(err)) => {
            manager.disconnect().await;
            Err(link_error("connect failed", err))
        }
        Err(_) => {
            manager.disconnect().await;
            Err(CliError::new(
                TIMEOUT,
                format!("connect timed out after {}", link.connect_timeout),
            ))
        }
    }
}

/// Drain the log until an entry matches `accept` or `wait` elapses.
pub async fn wait_for_entry<F>(
    manager: &LinkManager<Endpoint>,
    wait: Duration,
    mut accept: F,
) -> Option<LogEntry>
where
    F: FnMut(&LogEntry) -> bool,
{
    let deadline = Instant::now() + wait;
    loop {
        if let Some(found) = manager.drain_unread().into_iter().find(|e| accept(e)) {
            return Some(found);
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Status request and print interval (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub interval: String,
    /// Exit after printing N entries.
    #[arg(long)]
    pub count: Option<usize>,
    /// Only print these messages (comma-separated names).
    #[arg(long, value_delimiter = ',')]
    pub messages: Option<Vec<String>>,
    /// Do not request status; print only what the vehicle streams.
    #[arg(long)]
    pub passive: bool,
}

#[derive(Args, Debug)]
pub struct ParamsArgs {
    /// How long to collect PARAM_VALUE replies (e.g. 5s).
    #[arg(long, default_value = "5s")]
    pub wait: String,
    /// Only print parameters starting with this prefix.
    #[arg(long)]
    pub prefix: Option<String>,
}

#[derive(Args, Debug)]
#[command(allow_negative_numbers = true)]
pub struct ParamSetArgs {
    /// Parameter id (at most 16 characters).
    pub id: String,
    /// New value.
    pub value: f32,
    /// MAV_PARAM_TYPE code (9 = REAL32).
    #[arg(long = "type", default_value_t = 9)]
    pub param_type: u8,
    /// Wait for the vehicle to echo the new value.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set.
    #[arg(long, default_value = "3s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct CommandArgs {
    /// Command name without the MAV_CMD_ prefix, e.g. NAV_TAKEOFF.
    pub name: String,
    /// Up to seven parameters (comma-separated). Zero means "not set".
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub params: Vec<f32>,
    /// Resolve the name in the ArduPilot command table.
    #[arg(long)]
    pub ardupilot: bool,
    /// Send as COMMAND_INT instead of COMMAND_LONG.
    #[arg(long)]
    pub int: bool,
    /// Wait for COMMAND_ACK and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set.
    #[arg(long, default_value = "3s")]
    pub wait_timeout: String,
}

#[derive(Subcommand, Debug)]
pub enum MissionCommand {
    /// Upload a mission plan from a JSON file.
    Upload(MissionUploadArgs),
    /// Clear the vehicle's mission.
    Clear,
}

#[derive(Args, Debug)]
pub struct MissionUploadArgs {
    /// JSON object keyed by item index: {"0": {"type": "WAYPOINT", ...}}.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
#[command(allow_negative_numbers = true)]
pub struct GotoLocalArgs {
    /// North, metres.
    pub x: f32,
    /// East, metres.
    pub y: f32,
    /// Down, metres (negative is up).
    pub z: f32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
