use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use itertools::Itertools;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::resolver_settings::ResolverSettings;
use crate::error::{Error, Result};
use crate::resolver::{MetadataClient, MetadataConnector, Resolver, ResolverBuilder, TopologySink};
use crate::target::Target;
use crate::topology::TopologySnapshot;

/// Learns the leader and followers by asking the cluster itself over a
/// bootstrap connection.
///
/// No timer lives here. Rounds run once on build and then whenever
/// [`Resolver::discover_now`] is invoked. Concurrent rounds are serialised.
pub struct ClusterResolver {
    authority: String,
    client: Arc<dyn MetadataClient>,
    sink: Arc<dyn TopologySink>,
    settings: ResolverSettings,
    version: Mutex<u64>,
    published: ArcSwapOption<TopologySnapshot>,
}

impl ClusterResolver {
    pub fn new(authority: impl Into<String>, client: Arc<dyn MetadataClient>, sink: Arc<dyn TopologySink>, settings: ResolverSettings) -> Self {
        Self {
            authority: authority.into(),
            client,
            sink,
            settings,
            version: Mutex::new(0),
            published: ArcSwapOption::empty(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The most recent snapshot accepted by the sink.
    pub fn published(&self) -> Option<Arc<TopologySnapshot>> {
        self.published.load_full()
    }

    /// One discovery round, reporting the failure instead of logging it.
    ///
    /// Nothing is published unless the metadata RPC completes and its answer
    /// is well formed, so a cancelled or failed round leaves the previous
    /// snapshot in place.
    pub async fn discover(&self) -> Result<Arc<TopologySnapshot>> {
        let mut version = self.version.lock().await;
        let timeout = self.settings.discovery_timeout;
        let members = match tokio::time::timeout(timeout, self.client.get_servers()).await {
            Ok(Ok(members)) => members,
            Ok(Err(error)) => {
                return Err(Error::DiscoveryFailed(format!("get servers from {}: {:#}", self.authority, error)));
            }
            Err(_) => {
                return Err(Error::DiscoveryFailed(format!("get servers from {} timed out after {:?}", self.authority, timeout)));
            }
        };
        let snapshot = TopologySnapshot::new(*version + 1, members)?;
        debug!(
            "discovered topology v{} from {}: [{}]",
            snapshot.version(),
            self.authority,
            snapshot.members().iter().join(", "),
        );
        self.sink.update_state(snapshot.clone()).await.map_err(|error| {
            Error::Other(error.context(format!("update connection state with topology v{}", snapshot.version())))
        })?;
        *version = snapshot.version();
        let snapshot = Arc::new(snapshot);
        self.published.store(Some(snapshot.clone()));
        Ok(snapshot)
    }
}

#[async_trait]
impl Resolver for ClusterResolver {
    async fn discover_now(&self) {
        if let Err(error) = self.discover().await {
            let stale = self.published().map(|s| s.version());
            error!("{}, keep previous topology {:?}", error, stale);
        }
    }

    async fn close(&self) {
        match self.client.close().await {
            Ok(_) => {
                info!("resolver bootstrap connection to {} closed", self.authority);
            }
            Err(error) => {
                let error = Error::CloseFailed(format!("{:#}", error));
                warn!("{}", error);
            }
        }
    }
}

/// Creates [`ClusterResolver`]s for targets of its scheme.
pub struct ClusterResolverBuilder {
    settings: ResolverSettings,
    connector: Arc<dyn MetadataConnector>,
}

impl ClusterResolverBuilder {
    pub fn new(settings: ResolverSettings, connector: Arc<dyn MetadataConnector>) -> Self {
        Self {
            settings,
            connector,
        }
    }

    pub async fn build_cluster_resolver(&self, target: &Target, sink: Arc<dyn TopologySink>) -> Result<Arc<ClusterResolver>> {
        let authority = target.authority();
        let dial_timeout = self.settings.dial_timeout;
        let client = match tokio::time::timeout(dial_timeout, self.connector.connect(authority, dial_timeout)).await {
            Ok(Ok(client)) => client,
            Ok(Err(error)) => {
                return Err(Error::ConnectFailed { authority: authority.to_string(), reason: format!("{:#}", error) });
            }
            Err(_) => {
                return Err(Error::ConnectFailed { authority: authority.to_string(), reason: format!("timed out after {:?}", dial_timeout) });
            }
        };
        let resolver = Arc::new(ClusterResolver::new(authority, client, sink, self.settings.clone()));
        resolver.discover_now().await;
        Ok(resolver)
    }
}

#[async_trait]
impl ResolverBuilder for ClusterResolverBuilder {
    fn scheme(&self) -> &str {
        &self.settings.scheme
    }

    async fn build(&self, target: &Target, sink: Arc<dyn TopologySink>) -> Result<Arc<dyn Resolver>> {
        let resolver = self.build_cluster_resolver(target, sink).await?;
        Ok(resolver)
    }
}
