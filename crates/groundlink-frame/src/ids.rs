//! Message ids the link refers to by number.
//!
//! Status requests name the message they want by id, so these must match the
//! dialect tables exactly.

/// HEARTBEAT (minimal dialect).
pub const HEARTBEAT: u32 = 0;

/// SYS_STATUS.
pub const SYS_STATUS: u32 = 1;

/// PARAM_VALUE, the reply to parameter list requests and parameter writes.
pub const PARAM_VALUE: u32 = 22;

/// GPS_RAW_INT.
pub const GPS_RAW_INT: u32 = 24;

/// GLOBAL_POSITION_INT.
pub const GLOBAL_POSITION_INT: u32 = 33;

/// MISSION_CURRENT.
pub const MISSION_CURRENT: u32 = 42;

/// COMMAND_ACK.
pub const COMMAND_ACK: u32 = 77;

/// BATTERY_STATUS.
pub const BATTERY_STATUS: u32 = 147;

/// Returns a human-readable name for the ids above.
pub fn id_name(id: u32) -> &'static str {
    match id {
        HEARTBEAT => "HEARTBEAT",
        SYS_STATUS => "SYS_STATUS",
        PARAM_VALUE => "PARAM_VALUE",
        GPS_RAW_INT => "GPS_RAW_INT",
        GLOBAL_POSITION_INT => "GLOBAL_POSITION_INT",
        MISSION_CURRENT => "MISSION_CURRENT",
        COMMAND_ACK => "COMMAND_ACK",
        BATTERY_STATUS => "BATTERY_STATUS",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn names_agree_with_dialect() {
        for id in [
            HEARTBEAT,
            SYS_STATUS,
            PARAM_VALUE,
            GPS_RAW_INT,
            GLOBAL_POSITION_INT,
            MISSION_CURRENT,
            COMMAND_ACK,
            BATTERY_STATUS,
        ] {
            let class = Registry::lookup(id).expect("id should be registered");
            assert_eq!(class.name, id_name(id));
        }
    }
}
