//! Byte-stream transport for the vehicle link.
//!
//! Provides a unified interface over the two ways a ground station reaches
//! a vehicle:
//! - a serial device (USB/UART telemetry radio, flight controller port)
//! - a TCP socket (SITL simulator, network bridge)
//!
//! This is the lowest layer of groundlink. Everything else builds on top of
//! the [`LinkStream`] type provided here.

pub mod endpoint;
pub mod error;
pub mod traits;

pub use endpoint::{
    Endpoint, TransportMode, DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PATH, DEFAULT_TCP_HOST,
    DEFAULT_TCP_PORT,
};
pub use error::{Result, TransportError};
pub use traits::LinkStream;
