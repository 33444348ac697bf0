use std::sync::Arc;

use balancer_core::config::BalancerConfig;
use balancer_core::picker::leader_picker::LeaderPickerBuilder;
use balancer_core::registry::Registry;
use balancer_core::resolver::cluster_resolver::ClusterResolverBuilder;
use balancer_core::resolver::MetadataConnector;

pub const CLIENT_CONFIG: &'static str = include_str!("../client.toml");

pub const LEADER_PICKER: &'static str = "leader";

pub mod channel;
pub mod client;
pub mod config;
pub mod connector;

/// Registers the cluster resolver and the leader picker under the configured
/// scheme.
pub fn register_leader_aware<C>(registry: &Registry<C>, config: &BalancerConfig, metadata: Arc<dyn MetadataConnector>) -> balancer_core::Result<()>
    where
        C: Clone + Send + Sync + 'static,
{
    let scheme = config.resolver.scheme.clone();
    registry.register_resolver(Arc::new(ClusterResolverBuilder::new(config.resolver.clone(), metadata)))?;
    registry.register_picker(scheme, Arc::new(LeaderPickerBuilder::new(LEADER_PICKER, config.routing.classifier()?)))?;
    Ok(())
}
