//! Connect to a simulator and print telemetry as it arrives.
//!
//! Run with:
//!   cargo run --example telemetry-tail -- 127.0.0.1 5760
//!
//! A stock ArduPilot SITL listens on port 5760.

use std::time::Duration;

use groundlink::link::{LinkConfig, LinkManager};
use groundlink::transport::{Endpoint, DEFAULT_TCP_HOST, DEFAULT_TCP_PORT};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| DEFAULT_TCP_HOST.to_string());
    let port = match args.next() {
        Some(port) => port.parse()?,
        None => DEFAULT_TCP_PORT,
    };

    let manager = LinkManager::new(Endpoint::Tcp { host, port }, LinkConfig::default());
    if let Err(err) = manager.ensure_connected().await {
        // The manager keeps retrying in the background.
        eprintln!("initial connect failed: {err}");
    }

    let mut tick = tokio::time::interval(Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tick.tick() => {
                manager.request_status().await?;
                for entry in manager.drain_unread() {
                    println!("{entry}");
                }
            }
        }
    }

    manager.disconnect().await;
    Ok(())
}
