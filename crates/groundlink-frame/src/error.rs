/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The message id cannot be represented in the chosen protocol version.
    #[error("message id {id} does not fit a MAVLink v1 packet")]
    IdOutOfRange { id: u32 },

    /// A registered message failed to decode from its payload.
    #[error("failed to decode message {id}: {reason}")]
    Decode { id: u32, reason: String },

    /// An I/O error occurred while reading or writing packets.
    #[error("packet I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
