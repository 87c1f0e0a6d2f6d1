use mavlink::{MavlinkVersion, Message};

use crate::codec::{ProtocolVersion, RawPacket};
use crate::error::{FrameError, Result};

/// The message enum of the merged dialect.
///
/// `ardupilotmega` includes `common`, which in turn includes `minimal`, so
/// one enum covers all three tables.
pub type DialectMessage = mavlink::ardupilotmega::MavMessage;

/// Static description of a registered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageClass {
    /// Numeric message id.
    pub id: u32,
    /// Message name as defined by the dialect, e.g. `HEARTBEAT`.
    pub name: &'static str,
    /// CRC_EXTRA seed byte, the message definition's magic number.
    pub magic: u8,
}

/// Fixed id → message-class registry over the merged dialect.
///
/// Ids outside the registry are expected traffic (other dialects, vendor
/// extensions) and are never an error at this layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Registry;

impl Registry {
    /// Look up a message class by id.
    pub fn lookup(id: u32) -> Option<MessageClass> {
        let template = DialectMessage::default_message_from_id(id).ok()?;
        Some(MessageClass {
            id,
            name: template.message_name(),
            magic: DialectMessage::extra_crc(id),
        })
    }

    /// Whether `id` is registered.
    pub fn contains(id: u32) -> bool {
        Self::lookup(id).is_some()
    }

    /// Decode a packet into its typed message.
    ///
    /// Returns `Ok(None)` for unregistered ids.
    pub fn decode(packet: &RawPacket) -> Result<Option<(MessageClass, DialectMessage)>> {
        let Some(class) = Self::lookup(packet.message_id) else {
            return Ok(None);
        };
        let version = match packet.version {
            ProtocolVersion::V1 => MavlinkVersion::V1,
            ProtocolVersion::V2 => MavlinkVersion::V2,
        };
        let message = DialectMessage::parse(version, packet.message_id, &packet.payload)
            .map_err(|err| FrameError::Decode {
                id: packet.message_id,
                reason: err.to_string(),
            })?;
        Ok(Some((class, message)))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn packet(id: u32, payload: &'static [u8]) -> RawPacket {
        RawPacket {
            version: ProtocolVersion::V2,
            sequence: 0,
            system_id: 1,
            component_id: 1,
            message_id: id,
            payload: Bytes::from_static(payload),
        }
    }

    #[test]
    fn minimal_common_and_ardupilot_ids_are_registered() {
        let heartbeat = Registry::lookup(0).unwrap();
        assert_eq!(heartbeat.name, "HEARTBEAT");
        assert_eq!(heartbeat.magic, 50);

        let command_long = Registry::lookup(76).unwrap();
        assert_eq!(command_long.name, "COMMAND_LONG");
        assert_eq!(command_long.magic, 152);

        // AHRS is defined by the ArduPilot dialect only.
        let ahrs = Registry::lookup(163).unwrap();
        assert_eq!(ahrs.name, "AHRS");
    }

    #[test]
    fn unknown_id_is_not_registered() {
        assert!(Registry::lookup(16_000_000).is_none());
        assert!(!Registry::contains(16_000_000));
    }

    #[test]
    fn decode_unknown_id_returns_none() {
        let decoded = Registry::decode(&packet(16_000_000, b"\x01\x02")).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn decode_truncated_v2_payload() {
        // A v2 heartbeat whose trailing zero bytes were trimmed on the wire.
        let (class, message) = Registry::decode(&packet(0, b"\x07")).unwrap().unwrap();
        assert_eq!(class.name, "HEARTBEAT");
        match message {
            DialectMessage::HEARTBEAT(data) => assert_eq!(data.custom_mode, 7),
            other => panic!("unexpected message {other:?}"),
        }
    }
}
