use bytes::{Buf, Bytes, BytesMut};
use mavlink::{MAVLinkV1MessageRaw, MAVLinkV2MessageRaw, MavHeader, Message};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{FrameError, Result};
use crate::registry::{DialectMessage, Registry};

/// MAVLink v1 start marker.
pub const STX_V1: u8 = mavlink::MAV_STX;

/// MAVLink v2 start marker.
pub const STX_V2: u8 = mavlink::MAV_STX_V2;

/// v1 header: stx, len, seq, sysid, compid, msgid.
const HEADER_V1: usize = 6;

/// v2 header: stx, len, incompat, compat, seq, sysid, compid, msgid (3 bytes).
const HEADER_V2: usize = 10;

const CHECKSUM_LEN: usize = 2;

/// Trailer appended to v2 packets with the signed flag set.
const SIGNATURE_LEN: usize = 13;

/// v2 incompatibility flag: packet is signed.
const IFLAG_SIGNED: u8 = 0x01;

/// Wire protocol version of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    V1,
    #[default]
    V2,
}

/// One complete packet split off the byte stream, payload still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub version: ProtocolVersion,
    pub sequence: u8,
    pub system_id: u8,
    pub component_id: u8,
    pub message_id: u32,
    pub payload: Bytes,
}

/// Sender identity and sequence number written into an outbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub system_id: u8,
    pub component_id: u8,
    pub sequence: u8,
}

impl From<PacketHeader> for MavHeader {
    fn from(header: PacketHeader) -> Self {
        MavHeader {
            system_id: header.system_id,
            component_id: header.component_id,
            sequence: header.sequence,
        }
    }
}

/// Split the next packet off `src`.
///
/// Bytes before a start marker are discarded. Returns `None` when the buffer
/// holds no complete packet yet. A packet is only surfaced when its message
/// id is registered and its checksum matches; otherwise the start byte is
/// dropped and scanning resumes right after it. Unregistered ids are
/// rejected as soon as the header is in, so a bogus length never holds back
/// the packets behind it.
pub fn decode_packet(src: &mut BytesMut) -> Option<RawPacket> {
    loop {
        match src.iter().position(|&b| b == STX_V1 || b == STX_V2) {
            Some(0) => {}
            Some(skip) => {
                trace!(skip, "discarding bytes before start marker");
                src.advance(skip);
            }
            None => {
                src.clear();
                return None;
            }
        }

        let version = if src[0] == STX_V2 {
            ProtocolVersion::V2
        } else {
            ProtocolVersion::V1
        };
        let header_len = match version {
            ProtocolVersion::V1 => HEADER_V1,
            ProtocolVersion::V2 => HEADER_V2,
        };
        if src.len() < header_len {
            return None; // Need more data
        }

        let mut trailer = 0;
        if version == ProtocolVersion::V2 {
            let incompat = src[2];
            if incompat & !IFLAG_SIGNED != 0 {
                debug!(incompat, "unsupported incompatibility flags; resyncing");
                src.advance(1);
                continue;
            }
            if incompat & IFLAG_SIGNED != 0 {
                trailer = SIGNATURE_LEN;
            }
        }

        let message_id = match version {
            ProtocolVersion::V1 => u32::from(src[5]),
            ProtocolVersion::V2 => u32::from_le_bytes([src[7], src[8], src[9], 0]),
        };
        if !Registry::contains(message_id) {
            debug!(message_id, "unregistered message id; resyncing");
            src.advance(1);
            continue;
        }

        let total = header_len + src[1] as usize + CHECKSUM_LEN + trailer;
        if src.len() < total {
            return None; // Need more data
        }

        match checked_packet(version, &src[..total]) {
            Some(packet) => {
                src.advance(total);
                return Some(packet);
            }
            None => {
                debug!(message_id, "checksum mismatch; resyncing");
                src.advance(1);
            }
        }
    }
}

/// Parse one complete frame with the dialect's CRC_EXTRA table.
fn checked_packet(version: ProtocolVersion, mut frame: &[u8]) -> Option<RawPacket> {
    match version {
        ProtocolVersion::V1 => {
            let raw = mavlink::read_v1_raw_message(&mut frame).ok()?;
            raw.has_valid_crc::<DialectMessage>().then(|| RawPacket {
                version,
                sequence: raw.sequence(),
                system_id: raw.system_id(),
                component_id: raw.component_id(),
                message_id: u32::from(raw.message_id()),
                payload: Bytes::copy_from_slice(raw.payload()),
            })
        }
        ProtocolVersion::V2 => {
            let raw = mavlink::read_v2_raw_message(&mut frame).ok()?;
            raw.has_valid_crc::<DialectMessage>().then(|| RawPacket {
                version,
                sequence: raw.sequence(),
                system_id: raw.system_id(),
                component_id: raw.component_id(),
                message_id: raw.message_id(),
                payload: Bytes::copy_from_slice(raw.payload()),
            })
        }
    }
}

/// Encode `message` as one packet.
///
/// Wire format (v2):
/// ```text
/// ┌──────┬─────┬──────────┬────────┬─────┬───────┬────────┬────────────┬─────────┬────────┐
/// │ 0xFD │ len │ incompat │ compat │ seq │ sysid │ compid │ msgid (3B) │ payload │ crc LE │
/// └──────┴─────┴──────────┴────────┴─────┴───────┴────────┴────────────┴─────────┴────────┘
/// ```
pub fn encode_packet<M: Message>(
    version: ProtocolVersion,
    header: PacketHeader,
    message: &M,
    dst: &mut BytesMut,
) -> Result<()> {
    match version {
        ProtocolVersion::V1 => {
            let id = message.message_id();
            if u8::try_from(id).is_err() {
                return Err(FrameError::IdOutOfRange { id });
            }
            let mut raw = MAVLinkV1MessageRaw::new();
            raw.serialize_message(header.into(), message);
            dst.extend_from_slice(raw.raw_bytes());
        }
        ProtocolVersion::V2 => {
            let mut raw = MAVLinkV2MessageRaw::new();
            raw.serialize_message(header.into(), message);
            dst.extend_from_slice(raw.raw_bytes());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;
    use mavlink::ardupilotmega::{HEARTBEAT_DATA, PARAM_REQUEST_LIST_DATA, PROTOCOL_VERSION_DATA};

    use super::*;

    // Neither id may equal a start marker, or resync tests see phantom packets.
    const HEADER: PacketHeader = PacketHeader {
        system_id: 255,
        component_id: 190,
        sequence: 7,
    };

    fn heartbeat(custom_mode: u32) -> DialectMessage {
        DialectMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode,
            ..HEARTBEAT_DATA::default()
        })
    }

    fn encoded(version: ProtocolVersion, message: &DialectMessage) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_packet(version, HEADER, message, &mut buf).unwrap();
        buf
    }

    #[test]
    fn encode_then_split_v2() {
        let mut buf = encoded(ProtocolVersion::V2, &heartbeat(4));
        assert_eq!(buf[0], STX_V2);

        let packet = decode_packet(&mut buf).unwrap();
        assert_eq!(packet.version, ProtocolVersion::V2);
        assert_eq!(packet.sequence, 7);
        assert_eq!(packet.system_id, 255);
        assert_eq!(packet.component_id, 190);
        assert_eq!(packet.message_id, 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn v1_heartbeat_has_fixed_layout() {
        let buf = encoded(ProtocolVersion::V1, &heartbeat(0));
        // 6 header + 9 payload + 2 crc
        assert_eq!(buf.len(), 17);
        assert_eq!(&buf[..6], &[STX_V1, 9, 7, 255, 190, 0]);
    }

    #[test]
    fn incomplete_header_waits() {
        let mut buf = BytesMut::from(&[STX_V2, 9, 0][..]);
        assert!(decode_packet(&mut buf).is_none());
        assert_eq!(buf.len(), 3, "partial packet must be kept");
    }

    #[test]
    fn incomplete_payload_waits() {
        let mut buf = encoded(ProtocolVersion::V2, &heartbeat(1));
        let full = buf.len();
        buf.truncate(full - 3);
        assert!(decode_packet(&mut buf).is_none());
        assert_eq!(buf.len(), full - 3);
    }

    #[test]
    fn garbage_before_packet_is_skipped() {
        let mut buf = BytesMut::from(&b"NMEA noise\r\n"[..]);
        buf.extend_from_slice(&encoded(ProtocolVersion::V2, &heartbeat(2)));

        let packet = decode_packet(&mut buf).unwrap();
        assert_eq!(packet.message_id, 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn buffer_without_marker_is_cleared() {
        let mut buf = BytesMut::from(&b"no markers here"[..]);
        assert!(decode_packet(&mut buf).is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn corrupted_packet_is_dropped_and_next_one_recovered() {
        let mut bad = encoded(ProtocolVersion::V2, &heartbeat(3));
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;

        let mut buf = bad;
        buf.extend_from_slice(&encoded(ProtocolVersion::V2, &heartbeat(5)));

        let packet = decode_packet(&mut buf).unwrap();
        let (_, message) = Registry::decode(&packet).unwrap().unwrap();
        match message {
            DialectMessage::HEARTBEAT(data) => assert_eq!(data.custom_mode, 5),
            other => panic!("unexpected message {other:?}"),
        }
    }

    /// A v2 header for an id no dialect defines, claiming `len` payload bytes.
    fn unregistered_header(len: u8) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_slice(&[STX_V2, len, 0, 0, 9, 1, 1]);
        buf.put_slice(&16_000_000u32.to_le_bytes()[..3]);
        buf
    }

    #[test]
    fn unregistered_id_is_discarded() {
        let mut buf = unregistered_header(2);
        buf.put_slice(&[0xAA, 0xBB]);
        buf.put_u16_le(0xDEAD);

        assert!(decode_packet(&mut buf).is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn unregistered_header_does_not_hide_following_packet() {
        // The bogus header claims 255 payload bytes; only a heartbeat follows.
        let mut buf = unregistered_header(255);
        buf.extend_from_slice(&encoded(ProtocolVersion::V2, &heartbeat(11)));

        let packet = decode_packet(&mut buf).expect("heartbeat recovered");
        assert_eq!(packet.message_id, 0);
        let (_, message) = Registry::decode(&packet).unwrap().unwrap();
        match message {
            DialectMessage::HEARTBEAT(data) => assert_eq!(data.custom_mode, 11),
            other => panic!("unexpected message {other:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn v1_packet_is_checked_and_split() {
        let mut buf = encoded(ProtocolVersion::V1, &heartbeat(12));
        let packet = decode_packet(&mut buf).unwrap();
        assert_eq!(packet.version, ProtocolVersion::V1);
        assert_eq!(packet.sequence, 7);
        assert_eq!(packet.payload.len(), 9);

        let mut bad = encoded(ProtocolVersion::V1, &heartbeat(12));
        bad[8] ^= 0x01;
        assert!(decode_packet(&mut bad).is_none());
    }

    /// CRC-16/MCRF4XX over `data`, then the CRC_EXTRA byte.
    fn x25(data: &[u8], extra: u8) -> u16 {
        data.iter().chain([extra].iter()).fold(0xFFFF, |crc: u16, &byte| {
            let mut tmp = byte ^ (crc & 0xFF) as u8;
            tmp ^= tmp << 4;
            let tmp = u16::from(tmp);
            (crc >> 8) ^ (tmp << 8) ^ (tmp << 3) ^ (tmp >> 4)
        })
    }

    #[test]
    fn checksum_matches_independent_x25() {
        let buf = encoded(ProtocolVersion::V2, &heartbeat(13));
        let crc_at = buf.len() - 2;
        let received = u16::from_le_bytes([buf[crc_at], buf[crc_at + 1]]);
        assert_eq!(received, x25(&buf[1..crc_at], 50));
    }

    #[test]
    fn signed_packet_consumes_signature() {
        let mut unsigned = encoded(ProtocolVersion::V2, &heartbeat(6));
        // Re-checksum with the signed flag set, then append a signature.
        unsigned[2] = IFLAG_SIGNED;
        let crc_at = unsigned.len() - 2;
        let crc = x25(&unsigned[1..crc_at], 50);
        unsigned[crc_at..].copy_from_slice(&crc.to_le_bytes());
        unsigned.extend_from_slice(&[0x11; SIGNATURE_LEN]);
        unsigned.extend_from_slice(&encoded(ProtocolVersion::V2, &heartbeat(8)));

        let first = decode_packet(&mut unsigned).unwrap();
        let second = decode_packet(&mut unsigned).unwrap();
        assert_eq!(first.message_id, 0);
        assert_eq!(second.message_id, 0);
        assert!(unsigned.is_empty());
    }

    #[test]
    fn v1_rejects_wide_message_ids() {
        let mut buf = BytesMut::new();
        let narrow = DialectMessage::PARAM_REQUEST_LIST(PARAM_REQUEST_LIST_DATA::default());
        assert!(encode_packet(ProtocolVersion::V1, HEADER, &narrow, &mut buf).is_ok());

        let wide = DialectMessage::PROTOCOL_VERSION(PROTOCOL_VERSION_DATA::default());
        let err = encode_packet(ProtocolVersion::V1, HEADER, &wide, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::IdOutOfRange { id: 300 }));
    }
}
