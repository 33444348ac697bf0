use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bincode::{Decode, Encode};

use crate::member::ClusterMember;
use crate::resolver::{MetadataClient, MetadataConnector};
use crate::transport::connection::Connection;
use crate::transport::rpc::{decode_message, encode_message, RpcRequest};

pub const GET_SERVERS_METHOD: &'static str = "/cluster.v1.Cluster/GetServers";

/// Wire form of one entry of the `GetServers` response.
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct ServerRecord {
    pub addr: String,
    pub is_leader: bool,
}

impl From<ServerRecord> for ClusterMember {
    fn from(value: ServerRecord) -> Self {
        ClusterMember::new(value.addr, value.is_leader)
    }
}

impl From<&ClusterMember> for ServerRecord {
    fn from(value: &ClusterMember) -> Self {
        Self {
            addr: value.address.clone(),
            is_leader: value.is_leader,
        }
    }
}

pub fn encode_servers(members: &[ClusterMember]) -> anyhow::Result<Vec<u8>> {
    let records: Vec<ServerRecord> = members.iter().map(ServerRecord::from).collect();
    encode_message(&records)
}

pub fn decode_servers(bytes: &[u8]) -> anyhow::Result<Vec<ClusterMember>> {
    let records = decode_message::<Vec<ServerRecord>>(bytes)?;
    Ok(records.into_iter().map(ClusterMember::from).collect())
}

/// Issues `GetServers` over a single [`Connection`]. A call abandoned on
/// timeout does not disturb later calls.
#[derive(Debug)]
pub struct TcpMetadataClient {
    connection: Connection,
}

impl TcpMetadataClient {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl MetadataClient for TcpMetadataClient {
    async fn get_servers(&self) -> anyhow::Result<Vec<ClusterMember>> {
        let body = self.connection.call(RpcRequest::new(GET_SERVERS_METHOD, Vec::new())).await?;
        decode_servers(&body)
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.connection.close().await
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct TcpMetadataConnector;

#[async_trait]
impl MetadataConnector for TcpMetadataConnector {
    async fn connect(&self, authority: &str, dial_timeout: Duration) -> anyhow::Result<Arc<dyn MetadataClient>> {
        let connection = Connection::connect(authority, dial_timeout).await?;
        Ok(Arc::new(TcpMetadataClient::new(connection)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::member::ClusterMember;
    use crate::resolver::MetadataConnector;
    use crate::transport::metadata::{encode_servers, GET_SERVERS_METHOD, TcpMetadataConnector};
    use crate::transport::rpc::RpcRequest;
    use crate::transport::server::{RpcHandler, RpcServer};

    struct MetadataHandler {
        members: Mutex<Vec<ClusterMember>>,
    }

    #[async_trait]
    impl RpcHandler for MetadataHandler {
        async fn handle(&self, request: RpcRequest) -> anyhow::Result<Vec<u8>> {
            anyhow::ensure!(request.method == GET_SERVERS_METHOD, "unknown method {}", request.method);
            let members = self.members.lock().clone();
            encode_servers(&members)
        }
    }

    #[tokio::test]
    async fn test_get_servers_over_tcp() -> anyhow::Result<()> {
        let members = vec![
            ClusterMember::leader("127.0.0.1:15001"),
            ClusterMember::follower("127.0.0.1:15003"),
        ];
        let handler = Arc::new(MetadataHandler { members: Mutex::new(members.clone()) });
        let server = RpcServer::bind("127.0.0.1:0", handler).await?;
        let client = TcpMetadataConnector.connect(&server.local_addr().to_string(), Duration::from_secs(1)).await?;
        assert_eq!(client.get_servers().await?, members);
        client.close().await?;
        assert!(client.get_servers().await.is_err());
        assert!(client.close().await.is_err());
        Ok(())
    }
}
