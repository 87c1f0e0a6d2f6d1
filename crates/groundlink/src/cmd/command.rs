use groundlink_link::{
    build_command, resolve_command, CommandNamespace, CommandParams, CommandShape,
};
use serde_json::Value;

use crate::cmd::{connect, parse_duration, wait_for_entry, CommandArgs, LinkArgs};
use crate::exit::{link_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_dispatch, print_entries, OutputFormat};

const ACCEPTED: &str = "MAV_RESULT_ACCEPTED";

pub async fn run(args: CommandArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let namespace = if args.ardupilot {
        CommandNamespace::ArduPilot
    } else {
        CommandNamespace::Common
    };
    let shape = if args.int {
        CommandShape::Int
    } else {
        CommandShape::Long
    };
    // Fail on a bad name or parameter before touching the link.
    let command = resolve_command(&args.name, namespace)
        .map_err(|err| link_error("command failed", err))?;
    let wait = parse_duration(&args.wait_timeout)?;
    let params = CommandParams::from_legacy(&args.params);
    build_command(
        command,
        &params,
        shape,
        link.target_system,
        link.target_component,
    )
    .map_err(|err| link_error("command failed", err))?;

    let manager = connect(link).await?;
    if let Err(err) = manager
        .send_command(&args.name, &params, namespace, shape)
        .await
    {
        manager.disconnect().await;
        return Err(link_error("command failed", err));
    }

    if !args.wait {
        manager.disconnect().await;
        print_dispatch(
            &link.dispatch_output("command", Some(format!("{command:?}"))),
            format,
        );
        return Ok(SUCCESS);
    }

    let wire_name = format!("{command:?}");
    let ack = wait_for_entry(&manager, wait, |entry| {
        entry.message_name == "COMMAND_ACK"
            && entry.payload.get("command").and_then(Value::as_str) == Some(wire_name.as_str())
    })
    .await;
    manager.disconnect().await;

    let Some(ack) = ack else {
        return Err(CliError::new(
            TIMEOUT,
            format!("no COMMAND_ACK for {wire_name} within {}", args.wait_timeout),
        ));
    };
    print_entries(std::slice::from_ref(&ack), format);

    match ack.payload.get("result").and_then(Value::as_str) {
        Some(ACCEPTED) => Ok(SUCCESS),
        _ => Ok(FAILURE),
    }
}
