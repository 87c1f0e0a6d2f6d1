/// Errors that can occur in link transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the configured endpoint.
    #[error("failed to open {endpoint}: {source}")]
    Open {
        endpoint: String,
        source: std::io::Error,
    },

    /// The transport mode string is not recognised.
    #[error("unknown transport mode {0:?} (expected \"serial\" or \"tcp\")")]
    UnknownMode(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
