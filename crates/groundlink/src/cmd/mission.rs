use std::fs;
use std::path::Path;

use groundlink_link::MissionPlan;

use crate::cmd::{connect, LinkArgs, MissionCommand};
use crate::exit::{io_error, link_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_dispatch, OutputFormat};

pub async fn run(command: MissionCommand, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        MissionCommand::Upload(args) => {
            // Read and parse first so a bad file never opens the link.
            let plan = load_plan(&args.file)?;
            let manager = connect(link).await?;
            let result = manager.upload_mission(&plan).await;
            manager.disconnect().await;
            result.map_err(|err| link_error("mission upload failed", err))?;
            print_dispatch(
                &link.dispatch_output("mission-upload", Some(format!("{} items", plan.len()))),
                format,
            );
        }
        MissionCommand::Clear => {
            let manager = connect(link).await?;
            let result = manager.clear_mission().await;
            manager.disconnect().await;
            result.map_err(|err| link_error("mission clear failed", err))?;
            print_dispatch(&link.dispatch_output("mission-clear", None), format);
        }
    }
    Ok(SUCCESS)
}

fn load_plan(path: &Path) -> CliResult<MissionPlan> {
    let text = fs::read_to_string(path)
        .map_err(|err| io_error(&format!("read {}", path.display()), err))?;
    parse_plan(&text)
        .map_err(|err| CliError::new(DATA_INVALID, format!("{}: {err}", path.display())))
}

fn parse_plan(text: &str) -> Result<MissionPlan, serde_json::Error> {
    serde_json::from_str(text)
}
