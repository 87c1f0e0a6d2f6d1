use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// Default serial device of a USB-attached flight controller.
pub const DEFAULT_SERIAL_PATH: &str = "/dev/ttyACM0";
/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
/// Default TCP host (the SITL container).
pub const DEFAULT_TCP_HOST: &str = "sitl";
/// Default TCP port of the SITL serial-over-TCP bridge.
pub const DEFAULT_TCP_PORT: u16 = 5760;

/// Which transport kind the deployment uses.
///
/// This is the single runtime mode flag; callers of the link never choose
/// the transport themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Serial device (production hardware).
    Serial,
    /// TCP socket (development against a simulator).
    #[default]
    Tcp,
}

impl FromStr for TransportMode {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" | "uart" | "production" => Ok(Self::Serial),
            "tcp" | "sitl" | "development" => Ok(Self::Tcp),
            other => Err(TransportError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => f.write_str("serial"),
            Self::Tcp => f.write_str("tcp"),
        }
    }
}

/// Where the vehicle link lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Endpoint {
    /// A serial device opened at a fixed baud rate.
    Serial { path: String, baud_rate: u32 },
    /// A TCP server reachable at `host:port`.
    Tcp { host: String, port: u16 },
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::Tcp {
            host: DEFAULT_TCP_HOST.to_string(),
            port: DEFAULT_TCP_PORT,
        }
    }
}

impl Endpoint {
    /// Pick the endpoint for `mode` from both sets of settings.
    pub fn from_mode(
        mode: TransportMode,
        serial_path: &str,
        baud_rate: u32,
        tcp_host: &str,
        tcp_port: u16,
    ) -> Self {
        match mode {
            TransportMode::Serial => Self::Serial {
                path: serial_path.to_string(),
                baud_rate,
            },
            TransportMode::Tcp => Self::Tcp {
                host: tcp_host.to_string(),
                port: tcp_port,
            },
        }
    }

    /// The transport kind of this endpoint.
    pub fn mode(&self) -> TransportMode {
        match self {
            Self::Serial { .. } => TransportMode::Serial,
            Self::Tcp { .. } => TransportMode::Tcp,
        }
    }

    /// Open the endpoint.
    pub async fn open(&self) -> Result<LinkStream> {
        match self {
            Self::Serial { path, baud_rate } => {
                #[allow(unused_mut)]
                let mut stream = tokio_serial::SerialStream::open(&tokio_serial::new(
                    path.as_str(),
                    *baud_rate,
                ))
                .map_err(|err| self.open_error(err.into()))?;

                // Other tools (log downloaders, MAVProxy) may share the port.
                #[cfg(unix)]
                if let Err(err) = stream.set_exclusive(false) {
                    debug!(%path, %err, "could not clear exclusive serial access");
                }

                info!(%path, baud_rate, "opened serial link");
                Ok(LinkStream::from_serial(stream))
            }
            Self::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(|err| self.open_error(err))?;
                if let Err(err) = stream.set_nodelay(true) {
                    debug!(%host, port, %err, "could not set TCP_NODELAY");
                }
                info!(%host, port, "opened tcp link");
                Ok(LinkStream::from_tcp(stream))
            }
        }
    }

    fn open_error(&self, source: std::io::Error) -> TransportError {
        TransportError::Open {
            endpoint: self.to_string(),
            source,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { path, baud_rate } => write!(f, "serial:{path}@{baud_rate}"),
            Self::Tcp { host, port } => write!(f, "tcp:{host}:{port}"),
        }
    }
}
