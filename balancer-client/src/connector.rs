use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use balancer_core::member::ClusterMember;
use balancer_core::transport::connection::Connection;

/// Opens and releases the live connections a channel routes over.
#[async_trait]
pub trait Connector<C>: Send + Sync {
    async fn connect(&self, member: &ClusterMember) -> anyhow::Result<C>;

    async fn disconnect(&self, conn: C);
}

#[derive(Debug, Clone)]
pub struct TcpConnector {
    dial_timeout: Duration,
}

impl TcpConnector {
    pub fn new(dial_timeout: Duration) -> Self {
        Self { dial_timeout }
    }
}

#[async_trait]
impl Connector<Arc<Connection>> for TcpConnector {
    async fn connect(&self, member: &ClusterMember) -> anyhow::Result<Arc<Connection>> {
        let connection = Connection::connect(&member.address, self.dial_timeout).await?;
        Ok(Arc::new(connection))
    }

    async fn disconnect(&self, conn: Arc<Connection>) {
        if let Err(error) = conn.close().await {
            debug!("disconnect {}: {:#}", conn.peer(), error);
        }
    }
}
