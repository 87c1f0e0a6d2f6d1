use std::time::Duration;

use groundlink_frame::ProtocolVersion;

/// Delay between a link failure and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Minimum spacing between mission upload messages.
pub const DEFAULT_MISSION_ITEM_DELAY: Duration = Duration::from_millis(250);

/// Number of telemetry log entries retained.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Configuration for a [`LinkManager`](crate::LinkManager).
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// System id of the vehicle every outbound message addresses.
    pub target_system: u8,
    /// Component id of the vehicle autopilot.
    pub target_component: u8,
    /// System id this ground station writes into packet headers.
    pub system_id: u8,
    /// Component id this ground station writes into packet headers.
    pub component_id: u8,
    /// Protocol version of outbound packets. Inbound packets may be either.
    pub protocol: ProtocolVersion,
    /// Fixed delay before each reconnect attempt. There is no backoff.
    pub reconnect_delay: Duration,
    /// Wait after the mission count and before each mission item.
    pub mission_item_delay: Duration,
    /// Maximum number of retained log entries.
    pub log_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            target_system: 1,
            target_component: 1,
            system_id: 254,
            component_id: 1,
            protocol: ProtocolVersion::V2,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            mission_item_delay: DEFAULT_MISSION_ITEM_DELAY,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}
