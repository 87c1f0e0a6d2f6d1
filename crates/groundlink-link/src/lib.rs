//! Single-vehicle MAVLink link management.
//!
//! [`LinkManager`] owns the one connection to the vehicle, decodes inbound
//! telemetry into a bounded [`LogBuffer`], dispatches commands, parameter
//! writes and missions, and reopens the link on a fixed delay after it drops.

pub mod command;
pub mod config;
pub mod connector;
pub mod error;
pub mod ingest;
pub mod log_buffer;
pub mod manager;
pub mod mission;

pub use command::{
    build_command, resolve_command, CommandNamespace, CommandParams, CommandShape,
};
pub use config::{
    LinkConfig, DEFAULT_LOG_CAPACITY, DEFAULT_MISSION_ITEM_DELAY, DEFAULT_RECONNECT_DELAY,
};
pub use connector::Connector;
pub use error::{LinkError, Result};
pub use log_buffer::{LogBuffer, LogEntry};
pub use manager::{
    param_id_field, LinkManager, LinkState, PARAM_ID_LEN, POSITION_ONLY_MASK, STATUS_MESSAGES,
};
pub use mission::{MissionItem, MissionPlan, MissionSink, MissionUploader};
