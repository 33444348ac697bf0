use std::sync::Arc;

use tracing::info;

use balancer_core::config::BalancerConfig;
use balancer_core::error::Result;
use balancer_core::member::ClusterMember;
use balancer_core::registry::Registry;
use balancer_core::transport::connection::Connection;
use balancer_core::transport::metadata::{decode_servers, GET_SERVERS_METHOD, TcpMetadataConnector};
use balancer_core::transport::rpc::{CALLER_METADATA_KEY, RpcRequest};

use crate::channel::{BalancedChannel, ChannelOptions};
use crate::config::ClientConfig;
use crate::connector::{Connector, TcpConnector};
use crate::register_leader_aware;

/// Client of a replicated service reached over TCP through a leader aware
/// channel.
pub struct BalancerClient {
    caller: String,
    channel: BalancedChannel<Arc<Connection>>,
}

impl BalancerClient {
    pub async fn connect(client_config: &ClientConfig, balancer_config: &BalancerConfig) -> Result<Self> {
        let registry = Registry::<Arc<Connection>>::new();
        register_leader_aware(&registry, balancer_config, Arc::new(TcpMetadataConnector))?;
        let connector: Arc<dyn Connector<Arc<Connection>>> = Arc::new(TcpConnector::new(client_config.dial_timeout));
        let target = client_config.target(&balancer_config.resolver.scheme);
        let channel = BalancedChannel::connect(&target, &registry, connector, ChannelOptions::from(client_config)).await?;
        info!("{} connected to {}", client_config.caller, target);
        Ok(Self {
            caller: client_config.caller.clone(),
            channel,
        })
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    pub fn channel(&self) -> &BalancedChannel<Arc<Connection>> {
        &self.channel
    }

    /// Sends one call tagged with this client's caller name.
    pub async fn call(&self, method: &str, payload: Vec<u8>) -> Result<Vec<u8>> {
        self.channel.call(self.request(method, payload)).await
    }

    fn request(&self, method: &str, payload: Vec<u8>) -> RpcRequest {
        RpcRequest::new(method, payload).with_metadata(CALLER_METADATA_KEY, self.caller.as_str())
    }

    /// Asks the cluster for its members through the channel, the call is
    /// routed like any other metadata call.
    pub async fn get_servers(&self) -> Result<Vec<ClusterMember>> {
        let body = self.channel.call(self.request(GET_SERVERS_METHOD, Vec::new())).await?;
        Ok(decode_servers(&body)?)
    }

    pub async fn close(&self) {
        self.channel.close().await;
    }
}
