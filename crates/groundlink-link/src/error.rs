use crate::command::CommandNamespace;

/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Opening the transport failed. A reconnect has been scheduled.
    #[error("connection failed: {0}")]
    Connection(#[from] groundlink_transport::TransportError),

    /// A dispatch operation was attempted while the link is down.
    #[error("link not ready")]
    NotReady,

    /// Writing a packet to the transport failed.
    #[error("write failed: {0}")]
    Write(#[from] groundlink_frame::FrameError),

    /// The command name is not defined in the selected namespace.
    #[error("unknown command {name:?} in {namespace} namespace")]
    UnknownCommand {
        name: String,
        namespace: CommandNamespace,
    },

    /// Parameter ids occupy a fixed 16-byte wire field.
    #[error("parameter id {0:?} is longer than 16 bytes")]
    ParamIdTooLong(String),

    /// The numeric parameter type is not a MAV_PARAM_TYPE value.
    #[error("invalid parameter type {0}")]
    InvalidParamType(u8),

    /// A COMMAND_INT coordinate slot does not hold a whole `i32` value.
    #[error("command param{slot} = {value} is not a whole 32-bit integer")]
    InvalidCommandParam { slot: usize, value: f32 },

    /// A mission item cannot be encoded.
    #[error("invalid mission item {index}: {reason}")]
    InvalidMissionItem { index: u16, reason: String },
}

pub type Result<T> = std::result::Result<T, LinkError>;
