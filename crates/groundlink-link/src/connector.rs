use async_trait::async_trait;
use groundlink_transport::{Endpoint, LinkStream};

/// Opens the transport for a link.
///
/// [`Endpoint`] is the production implementation. Anything else that can
/// hand out a [`LinkStream`] (a simulator, a test harness) plugs in here.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a fresh transport.
    async fn connect(&self) -> groundlink_transport::Result<LinkStream>;

    /// Short description for log output.
    fn describe(&self) -> String {
        "link".to_string()
    }
}

#[async_trait]
impl Connector for Endpoint {
    async fn connect(&self) -> groundlink_transport::Result<LinkStream> {
        self.open().await
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn endpoint_connector_opens_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.shutdown().await.unwrap();
        });

        let endpoint = Endpoint::Tcp {
            host: "127.0.0.1".to_string(),
            port,
        };
        let stream = Connector::connect(&endpoint).await.unwrap();
        assert_eq!(stream.kind(), "tcp");
        assert_eq!(endpoint.describe(), format!("tcp:127.0.0.1:{port}"));
        server.await.unwrap();
    }
}
