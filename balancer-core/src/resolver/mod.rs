use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::member::ClusterMember;
use crate::target::Target;
use crate::topology::TopologySnapshot;

pub mod cluster_resolver;

/// The framework side a resolver publishes snapshots into.
///
/// An implementation must install the snapshot as a whole, readers never see
/// part of it.
#[async_trait]
pub trait TopologySink: Send + Sync {
    async fn update_state(&self, snapshot: TopologySnapshot) -> anyhow::Result<()>;
}

/// Client side of the cluster metadata RPC.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn get_servers(&self) -> anyhow::Result<Vec<ClusterMember>>;

    async fn close(&self) -> anyhow::Result<()>;
}

/// Dials the bootstrap connection a resolver talks to.
#[async_trait]
pub trait MetadataConnector: Send + Sync {
    async fn connect(&self, authority: &str, dial_timeout: Duration) -> anyhow::Result<Arc<dyn MetadataClient>>;
}

#[async_trait]
pub trait Resolver: Send + Sync {
    /// Runs one discovery round. Failures are logged and the previously
    /// published snapshot stays in effect.
    async fn discover_now(&self);

    async fn close(&self);
}

#[async_trait]
pub trait ResolverBuilder: Send + Sync {
    fn scheme(&self) -> &str;

    /// Dials the target authority and publishes the first snapshot before
    /// returning.
    async fn build(&self, target: &Target, sink: Arc<dyn TopologySink>) -> Result<Arc<dyn Resolver>>;
}
