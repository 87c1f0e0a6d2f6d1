use crate::cmd::{connect, GotoLocalArgs, LinkArgs};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_dispatch, OutputFormat};

pub async fn run(args: GotoLocalArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let manager = connect(link).await?;
    let result = manager
        .set_local_position_target(args.x, args.y, args.z)
        .await;
    manager.disconnect().await;
    result.map_err(|err| link_error("goto-local failed", err))?;

    print_dispatch(
        &link.dispatch_output(
            "goto-local",
            Some(format!("x={} y={} z={}", args.x, args.y, args.z)),
        ),
        format,
    );
    Ok(SUCCESS)
}
