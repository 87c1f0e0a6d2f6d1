use std::collections::BTreeMap;

use serde_json::Value;
use tokio::time::Instant;

use crate::cmd::{
    connect, parse_duration, wait_for_entry, LinkArgs, ParamSetArgs, ParamsArgs, POLL_INTERVAL,
};
use crate::exit::{link_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_dispatch, print_params, OutputFormat, ParamRow};

/// Request the full parameter list and print what arrives within `--wait`.
///
/// Collection stops early once every index the vehicle announced
/// (`param_count`) has been seen.
pub async fn run_list(args: ParamsArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let wait = parse_duration(&args.wait)?;
    let manager = connect(link).await?;

    if let Err(err) = manager.request_parameters().await {
        manager.disconnect().await;
        return Err(link_error("parameter request failed", err));
    }

    let deadline = Instant::now() + wait;
    let mut rows: BTreeMap<String, ParamRow> = BTreeMap::new();
    let mut expected: Option<u64> = None;
    loop {
        for entry in manager.drain_unread() {
            if let Some(row) = ParamRow::from_entry(&entry) {
                if let Some(count) = entry.payload.get("param_count").and_then(Value::as_u64) {
                    expected = Some(count);
                }
                rows.insert(row.id.clone(), row);
            }
        }
        let complete = expected.is_some_and(|count| rows.len() as u64 >= count);
        if complete || Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    manager.disconnect().await;

    if rows.is_empty() {
        return Err(CliError::new(
            TIMEOUT,
            format!("no parameters received within {}", args.wait),
        ));
    }

    let rows: Vec<ParamRow> = rows
        .into_values()
        .filter(|row| {
            args.prefix
                .as_deref()
                .is_none_or(|prefix| row.id.starts_with(prefix))
        })
        .collect();
    print_params(&rows, format);
    Ok(SUCCESS)
}

/// Write one parameter. With `--wait`, print the vehicle's echo.
pub async fn run_set(args: ParamSetArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let wait = parse_duration(&args.wait_timeout)?;
    let manager = connect(link).await?;

    if let Err(err) = manager
        .write_parameter(&args.id, args.value, args.param_type)
        .await
    {
        manager.disconnect().await;
        return Err(link_error("param-set failed", err));
    }

    if !args.wait {
        manager.disconnect().await;
        print_dispatch(
            &link.dispatch_output("param-set", Some(format!("{}={}", args.id, args.value))),
            format,
        );
        return Ok(SUCCESS);
    }

    let echo = wait_for_entry(&manager, wait, |entry| {
        ParamRow::from_entry(entry).is_some_and(|row| row.id == args.id)
    })
    .await;
    manager.disconnect().await;

    match echo.as_ref().and_then(ParamRow::from_entry) {
        Some(row) => {
            print_params(&[row], format);
            Ok(SUCCESS)
        }
        None => Err(CliError::new(
            TIMEOUT,
            format!("no PARAM_VALUE echo for {} within {}", args.id, args.wait_timeout),
        )),
    }
}
