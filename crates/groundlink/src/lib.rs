//! Single-vehicle MAVLink ground link.
//!
//! groundlink owns one serial or TCP connection to a vehicle, turns its
//! telemetry into a bounded log, dispatches commands, parameters and
//! missions, and reconnects on a fixed delay when the link drops.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial and TCP byte streams
//! - [`frame`]: MAVLink v1/v2 packet framing and the dialect registry
//! - [`link`]: the link manager (behind `link` feature)

/// Re-export transport types.
pub mod transport {
    pub use groundlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use groundlink_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use groundlink_link::*;
}
