use groundlink_link::LinkManager;
use tracing::{info, warn};

use crate::cmd::{parse_duration, LinkArgs, MonitorArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_entries, OutputFormat};

/// Keep the link up and print what arrives until ctrl-c or `--count`.
///
/// Unlike the one-shot commands, an unreachable vehicle is not an error
/// here; the link keeps retrying in the background.
pub async fn run(args: MonitorArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let manager = LinkManager::new(link.endpoint(), link.config());
    if let Err(err) = manager.ensure_connected().await {
        warn!(error = %err, "initial connect failed; retrying in background");
    }

    let mut ticker = tokio::time::interval(interval);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut printed = 0usize;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = ticker.tick() => {
                if !args.passive {
                    if let Err(err) = manager.request_status().await {
                        warn!(error = %err, "status request failed");
                    }
                }

                let mut entries = manager.drain_unread();
                if let Some(names) = &args.messages {
                    entries.retain(|entry| {
                        names.iter().any(|name| name.eq_ignore_ascii_case(&entry.message_name))
                    });
                }
                if let Some(count) = args.count {
                    entries.truncate(count.saturating_sub(printed));
                }
                print_entries(&entries, format);
                printed += entries.len();

                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
        }
    }

    manager.disconnect().await;
    Ok(SUCCESS)
}
