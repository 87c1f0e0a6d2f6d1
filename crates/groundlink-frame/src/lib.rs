//! MAVLink packet framing for the vehicle link.
//!
//! Turns a raw byte stream into discrete packets and back:
//! - start marker `0xFE` (v1) or `0xFD` (v2), then a fixed header
//! - the message payload (up to 255 bytes)
//! - a CRC-16/MCRF4XX checksum seeded with the message's CRC_EXTRA byte
//! - for signed v2 packets, a 13-byte signature trailer
//!
//! Message definitions, serialization and checksums come from the `mavlink`
//! crate's raw message types; this layer splits the stream into packets and
//! resynchronises after noise or unknown traffic.

pub mod codec;
pub mod error;
pub mod ids;
pub mod mav_codec;
pub mod registry;

pub use codec::{
    decode_packet, encode_packet, PacketHeader, ProtocolVersion, RawPacket, STX_V1, STX_V2,
};
pub use error::{FrameError, Result};
pub use mav_codec::MavCodec;
pub use registry::{DialectMessage, MessageClass, Registry};
