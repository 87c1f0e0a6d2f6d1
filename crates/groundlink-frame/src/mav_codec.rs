use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_packet, encode_packet, PacketHeader, ProtocolVersion, RawPacket};
use crate::error::FrameError;
use crate::registry::DialectMessage;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// `tokio_util` codec splitting inbound packets and framing outbound messages.
///
/// The encoder owns the outbound sequence counter, so one codec instance
/// must back exactly one link.
#[derive(Debug, Clone)]
pub struct MavCodec {
    version: ProtocolVersion,
    system_id: u8,
    component_id: u8,
    sequence: u8,
}

impl MavCodec {
    /// Create a codec that sends as `system_id`/`component_id`.
    pub fn new(version: ProtocolVersion, system_id: u8, component_id: u8) -> Self {
        Self {
            version,
            system_id,
            component_id,
            sequence: 0,
        }
    }

    /// Sequence number the next outbound packet will carry.
    pub fn next_sequence(&self) -> u8 {
        self.sequence
    }
}

impl Default for MavCodec {
    fn default() -> Self {
        Self::new(ProtocolVersion::V2, 255, 190)
    }
}

impl Decoder for MavCodec {
    type Item = RawPacket;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.capacity() < INITIAL_BUFFER_CAPACITY {
            src.reserve(INITIAL_BUFFER_CAPACITY);
        }
        Ok(decode_packet(src))
    }
}

impl Encoder<DialectMessage> for MavCodec {
    type Error = FrameError;

    fn encode(&mut self, item: DialectMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let header = PacketHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: self.sequence,
        };
        encode_packet(self.version, header, &item, dst)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(())
    }
}
