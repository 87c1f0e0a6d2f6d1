//! Command name resolution and command message builders.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use groundlink_frame::DialectMessage;
use mavlink::ardupilotmega::{MavCmd, MavFrame, COMMAND_INT_DATA, COMMAND_LONG_DATA};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

const COMMAND_PREFIX: &str = "MAV_CMD_";

/// Which command table a name is resolved against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandNamespace {
    /// The common dialect.
    #[default]
    Common,
    /// The ArduPilot dialect, a superset of common.
    ArduPilot,
}

impl fmt::Display for CommandNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Common => f.write_str("common"),
            Self::ArduPilot => f.write_str("ardupilot"),
        }
    }
}

/// Wire shape of an outbound command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandShape {
    /// COMMAND_LONG: seven float parameters.
    #[default]
    Long,
    /// COMMAND_INT: slots 5 and 6 are integer x/y.
    Int,
}

/// The seven parameter slots of a command. `None` leaves the slot at its
/// wire default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CommandParams(pub [Option<f32>; 7]);

impl CommandParams {
    /// All slots unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set slot `slot` (1-based, as in `param1`..`param7`). Out-of-range
    /// slots are ignored.
    pub fn with(mut self, slot: usize, value: f32) -> Self {
        if let Some(entry) = slot.checked_sub(1).and_then(|i| self.0.get_mut(i)) {
            *entry = Some(value);
        }
        self
    }

    /// Build from a plain list where zero and NaN mean "not provided".
    ///
    /// Values past the seventh are ignored.
    pub fn from_legacy(values: &[f32]) -> Self {
        let mut params = Self::new();
        for (slot, value) in params.0.iter_mut().zip(values) {
            if *value != 0.0 && !value.is_nan() {
                *slot = Some(*value);
            }
        }
        params
    }

    /// Value of slot `slot` (1-based).
    pub fn get(&self, slot: usize) -> Option<f32> {
        slot.checked_sub(1)
            .and_then(|i| self.0.get(i))
            .copied()
            .flatten()
    }

    fn wire(&self, slot: usize) -> f32 {
        self.get(slot).unwrap_or(0.0)
    }
}

impl From<[Option<f32>; 7]> for CommandParams {
    fn from(slots: [Option<f32>; 7]) -> Self {
        Self(slots)
    }
}

type CommandTable = HashMap<String, u16>;

fn build_table<T, F>(from_code: F) -> CommandTable
where
    T: fmt::Debug,
    F: Fn(u16) -> Option<T>,
{
    (0..=u16::MAX)
        .filter_map(|code| {
            let command = from_code(code)?;
            let name = format!("{command:?}");
            let short = name.strip_prefix(COMMAND_PREFIX).unwrap_or(&name).to_string();
            Some((short, code))
        })
        .collect()
}

fn table(namespace: CommandNamespace) -> &'static CommandTable {
    static COMMON: OnceLock<CommandTable> = OnceLock::new();
    static ARDUPILOT: OnceLock<CommandTable> = OnceLock::new();
    match namespace {
        CommandNamespace::Common => {
            COMMON.get_or_init(|| build_table(mavlink::common::MavCmd::from_u16))
        }
        CommandNamespace::ArduPilot => ARDUPILOT.get_or_init(|| build_table(MavCmd::from_u16)),
    }
}

/// Resolve a command name such as `NAV_TAKEOFF` (or `MAV_CMD_NAV_TAKEOFF`)
/// in `namespace`.
pub fn resolve_command(name: &str, namespace: CommandNamespace) -> Result<MavCmd> {
    let short = name.strip_prefix(COMMAND_PREFIX).unwrap_or(name);
    table(namespace)
        .get(short)
        .and_then(|&code| MavCmd::from_u16(code))
        .ok_or_else(|| LinkError::UnknownCommand {
            name: name.to_string(),
            namespace,
        })
}

/// Build a command message addressed to `target_system`/`target_component`.
///
/// COMMAND_INT carries slots 5 and 6 as integers; values that are not whole
/// numbers within `i32` are rejected rather than truncated.
pub fn build_command(
    command: MavCmd,
    params: &CommandParams,
    shape: CommandShape,
    target_system: u8,
    target_component: u8,
) -> Result<DialectMessage> {
    match shape {
        CommandShape::Long => Ok(command_long(
            command,
            params,
            target_system,
            target_component,
        )),
        CommandShape::Int => Ok(DialectMessage::COMMAND_INT(COMMAND_INT_DATA {
            param1: params.wire(1),
            param2: params.wire(2),
            param3: params.wire(3),
            param4: params.wire(4),
            x: integer_slot(params, 5)?,
            y: integer_slot(params, 6)?,
            z: params.wire(7),
            command,
            target_system,
            target_component,
            frame: MavFrame::MAV_FRAME_GLOBAL,
            ..COMMAND_INT_DATA::default()
        })),
    }
}

/// MAV_CMD_REQUEST_MESSAGE for `message_id`, answered to the requester.
pub fn request_message(message_id: u32, target_system: u8, target_component: u8) -> DialectMessage {
    let params = CommandParams::new()
        .with(1, message_id as f32)
        .with(7, 1.0);
    command_long(
        MavCmd::MAV_CMD_REQUEST_MESSAGE,
        &params,
        target_system,
        target_component,
    )
}

fn command_long(
    command: MavCmd,
    params: &CommandParams,
    target_system: u8,
    target_component: u8,
) -> DialectMessage {
    DialectMessage::COMMAND_LONG(COMMAND_LONG_DATA {
        param1: params.wire(1),
        param2: params.wire(2),
        param3: params.wire(3),
        param4: params.wire(4),
        param5: params.wire(5),
        param6: params.wire(6),
        param7: params.wire(7),
        command,
        target_system,
        target_component,
        ..COMMAND_LONG_DATA::default()
    })
}

// 2^31 is exact in f32; anything at or above it overflows i32.
const I32_LIMIT: f32 = 2_147_483_648.0;

fn integer_slot(params: &CommandParams, slot: usize) -> Result<i32> {
    let value = params.wire(slot);
    if value.is_finite() && value.fract() == 0.0 && (-I32_LIMIT..I32_LIMIT).contains(&value) {
        Ok(value as i32)
    } else {
        Err(LinkError::InvalidCommandParam { slot, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_with_and_without_prefix() {
        let short = resolve_command("NAV_TAKEOFF", CommandNamespace::Common).unwrap();
        let long = resolve_command("MAV_CMD_NAV_TAKEOFF", CommandNamespace::Common).unwrap();
        assert_eq!(short, MavCmd::MAV_CMD_NAV_TAKEOFF);
        assert_eq!(long, short);
    }

    #[test]
    fn ardupilot_only_commands_need_ardupilot_namespace() {
        assert!(resolve_command("DO_SEND_BANNER", CommandNamespace::ArduPilot).is_ok());
        let err = resolve_command("DO_SEND_BANNER", CommandNamespace::Common).unwrap_err();
        assert!(matches!(
            err,
            LinkError::UnknownCommand {
                namespace: CommandNamespace::Common,
                ..
            }
        ));
    }

    #[test]
    fn unknown_name_fails_loudly() {
        let err = resolve_command("NOT_A_COMMAND", CommandNamespace::ArduPilot).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown command \"NOT_A_COMMAND\" in ardupilot namespace"
        );
    }

    #[test]
    fn legacy_params_treat_zero_as_unset() {
        let params = CommandParams::from_legacy(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 15.0]);
        assert_eq!(params, CommandParams::new().with(7, 15.0));
        assert_eq!(params.get(1), None);
        assert_eq!(params.get(7), Some(15.0));
        assert_eq!(params.get(0), None);
        assert_eq!(params.get(8), None);
    }

    #[test]
    fn explicit_zero_is_distinguishable() {
        let params = CommandParams::new().with(1, 0.0);
        assert_eq!(params.get(1), Some(0.0));
        assert_ne!(params, CommandParams::new());
    }

    #[test]
    fn int_shape_maps_slots_to_position() {
        let params = CommandParams::from_legacy(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 15.0]);
        let message = build_command(
            MavCmd::MAV_CMD_NAV_TAKEOFF,
            &params,
            CommandShape::Int,
            1,
            1,
        )
        .unwrap();
        match message {
            DialectMessage::COMMAND_INT(data) => {
                assert_eq!(data.frame, MavFrame::MAV_FRAME_GLOBAL);
                assert_eq!((data.x, data.y), (0, 0));
                assert_eq!(data.z, 15.0);
                assert_eq!(data.param1, 0.0);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn int_shape_carries_scaled_coordinates() {
        let params = CommandParams::new()
            .with(5, -353_632_608.0)
            .with(6, 1_491_652_352.0);
        let message = build_command(
            MavCmd::MAV_CMD_DO_REPOSITION,
            &params,
            CommandShape::Int,
            1,
            1,
        )
        .unwrap();
        match message {
            DialectMessage::COMMAND_INT(data) => {
                assert_eq!((data.x, data.y), (-353_632_608, 1_491_652_352));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn int_shape_rejects_fractional_coordinates() {
        let params = CommandParams::new().with(5, 47.397_743).with(6, 8.545_594);
        let err = build_command(
            MavCmd::MAV_CMD_DO_REPOSITION,
            &params,
            CommandShape::Int,
            1,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, LinkError::InvalidCommandParam { slot: 5, .. }));

        let long = build_command(
            MavCmd::MAV_CMD_DO_REPOSITION,
            &params,
            CommandShape::Long,
            1,
            1,
        )
        .unwrap();
        assert!(matches!(long, DialectMessage::COMMAND_LONG(_)));
    }

    #[test]
    fn int_shape_rejects_out_of_range_coordinates() {
        for value in [3.0e9_f32, -3.0e9, f32::INFINITY, 2_147_483_648.0] {
            let params = CommandParams::new().with(6, value);
            let err = build_command(
                MavCmd::MAV_CMD_DO_REPOSITION,
                &params,
                CommandShape::Int,
                1,
                1,
            )
            .unwrap_err();
            assert!(
                matches!(err, LinkError::InvalidCommandParam { slot: 6, .. }),
                "{value} should be rejected"
            );
        }
        let params = CommandParams::new().with(6, -2_147_483_648.0);
        assert!(build_command(
            MavCmd::MAV_CMD_DO_REPOSITION,
            &params,
            CommandShape::Int,
            1,
            1,
        )
        .is_ok());
    }

    #[test]
    fn request_message_sets_id_and_response_target() {
        match request_message(33, 1, 1) {
            DialectMessage::COMMAND_LONG(data) => {
                assert_eq!(data.command, MavCmd::MAV_CMD_REQUEST_MESSAGE);
                assert_eq!(data.param1, 33.0);
                assert_eq!(data.param7, 1.0);
                assert_eq!((data.target_system, data.target_component), (1, 1));
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
