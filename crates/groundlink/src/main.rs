mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, LinkArgs};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "groundlink",
    version,
    about = "Single-vehicle MAVLink ground link"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "GROUNDLINK_LOG_LEVEL",
        default_value = "info",
        global = true
    )]
    log_level: LogLevel,

    #[command(flatten)]
    link: LinkArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, cli.link, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use groundlink_transport::TransportMode;

    use super::*;
    use crate::cmd::MissionCommand;

    #[test]
    fn link_options_default_to_simulator() {
        let cli = Cli::try_parse_from(["groundlink", "params"]).expect("params should parse");
        assert!(matches!(cli.command, Command::Params(_)));
        let cli = Cli::try_parse_from([
            "groundlink",
            "--mode",
            "serial",
            "--serial-path",
            "/dev/ttyUSB0",
            "params",
        ])
        .expect("serial args should parse");
        assert_eq!(cli.link.mode, TransportMode::Serial);
        assert_eq!(cli.link.serial_path, "/dev/ttyUSB0");
    }

    #[test]
    fn link_options_are_global() {
        let cli = Cli::try_parse_from(["groundlink", "mission", "clear", "--port", "5762"])
            .expect("global option after subcommand should parse");
        assert_eq!(cli.link.port, 5762);
        assert!(matches!(cli.command, Command::Mission(MissionCommand::Clear)));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = Cli::try_parse_from(["groundlink", "--mode", "udp", "params"])
            .expect_err("udp is not a transport mode");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn command_params_accept_negatives() {
        let cli = Cli::try_parse_from([
            "groundlink",
            "command",
            "NAV_TAKEOFF",
            "--params",
            "0,0,0,-1,0,0,10",
            "--int",
        ])
        .expect("command args should parse");
        let Command::Command(args) = cli.command else {
            panic!("expected command subcommand");
        };
        assert_eq!(args.params, [0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 10.0]);
        assert!(args.int);
        assert!(!args.ardupilot);
    }

    #[test]
    fn goto_local_accepts_negative_down() {
        let cli = Cli::try_parse_from(["groundlink", "goto-local", "5", "-2.5", "-10"])
            .expect("negative coordinates should parse");
        let Command::GotoLocal(args) = cli.command else {
            panic!("expected goto-local subcommand");
        };
        assert_eq!((args.x, args.y, args.z), (5.0, -2.5, -10.0));
    }

    #[test]
    fn param_set_type_flag() {
        let cli = Cli::try_parse_from([
            "groundlink",
            "param-set",
            "WPNAV_SPEED",
            "500",
            "--type",
            "6",
        ])
        .expect("param-set should parse");
        let Command::ParamSet(args) = cli.command else {
            panic!("expected param-set subcommand");
        };
        assert_eq!(args.id, "WPNAV_SPEED");
        assert_eq!(args.param_type, 6);
    }
}
