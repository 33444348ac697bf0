use std::sync::Arc;

use ahash::{HashMap, HashMapExt};
use parking_lot::RwLock;
use tracing::info;

use crate::error::{Error, Result};
use crate::picker::PickerBuilder;
use crate::resolver::ResolverBuilder;

/// Scheme keyed resolver and picker builders.
///
/// A registry is an ordinary value owned by the application, builders are
/// registered explicitly during startup.
pub struct Registry<C> {
    resolvers: RwLock<HashMap<String, Arc<dyn ResolverBuilder>>>,
    pickers: RwLock<HashMap<String, Arc<dyn PickerBuilder<C>>>>,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            resolvers: RwLock::new(HashMap::new()),
            pickers: RwLock::new(HashMap::new()),
        }
    }
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_resolver(&self, builder: Arc<dyn ResolverBuilder>) -> Result<()> {
        let scheme = builder.scheme().to_string();
        let mut resolvers = self.resolvers.write();
        if resolvers.contains_key(&scheme) {
            return Err(Error::DuplicateScheme(scheme));
        }
        info!("register resolver for scheme {}", scheme);
        resolvers.insert(scheme, builder);
        Ok(())
    }

    pub fn register_picker(&self, scheme: impl Into<String>, builder: Arc<dyn PickerBuilder<C>>) -> Result<()> {
        let scheme = scheme.into();
        let mut pickers = self.pickers.write();
        if pickers.contains_key(&scheme) {
            return Err(Error::DuplicateScheme(scheme));
        }
        info!("register picker {} for scheme {}", builder.name(), scheme);
        pickers.insert(scheme, builder);
        Ok(())
    }

    pub fn resolver(&self, scheme: &str) -> Result<Arc<dyn ResolverBuilder>> {
        self.resolvers
            .read()
            .get(scheme)
            .cloned()
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))
    }

    pub fn picker(&self, scheme: &str) -> Result<Arc<dyn PickerBuilder<C>>> {
        self.pickers
            .read()
            .get(scheme)
            .cloned()
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::config::BalancerConfig;
    use crate::error::Error;
    use crate::picker::leader_picker::LeaderPickerBuilder;
    use crate::registry::Registry;
    use crate::resolver::cluster_resolver::ClusterResolverBuilder;
    use crate::transport::metadata::TcpMetadataConnector;

    #[test]
    fn test_register_and_lookup() -> anyhow::Result<()> {
        let config = BalancerConfig::reference()?;
        let registry = Registry::<String>::new();
        let scheme = config.resolver.scheme.clone();
        registry.register_resolver(Arc::new(ClusterResolverBuilder::new(config.resolver.clone(), Arc::new(TcpMetadataConnector))))?;
        registry.register_picker(&scheme, Arc::new(LeaderPickerBuilder::new("leader", config.routing.classifier()?)))?;

        assert_eq!(registry.resolver(&scheme)?.scheme(), scheme);
        assert_eq!(registry.picker(&scheme)?.name(), "leader");
        assert!(matches!(registry.resolver("dns"), Err(Error::UnknownScheme(_))));
        assert!(matches!(registry.picker("dns"), Err(Error::UnknownScheme(_))));

        let duplicate = registry.register_resolver(Arc::new(ClusterResolverBuilder::new(config.resolver.clone(), Arc::new(TcpMetadataConnector))));
        assert!(matches!(duplicate, Err(Error::DuplicateScheme(_))));
        Ok(())
    }
}
