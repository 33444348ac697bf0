use config::{File, FileFormat, Source};
use config::builder::DefaultState;
use serde::{Deserialize, Serialize};

use crate::BALANCER_CONFIG;
use crate::config::resolver_settings::ResolverSettings;
use crate::config::routing_settings::RoutingSettings;

pub mod resolver_settings;
pub mod routing_settings;

pub trait ConfigBuilder: Sized {
    type C;

    fn add_source<T>(self, source: T) -> anyhow::Result<Self>
        where
            T: Source + Send + Sync + 'static;

    fn build(self) -> anyhow::Result<Self::C>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalancerConfig {
    pub resolver: ResolverSettings,
    pub routing: RoutingSettings,
}

impl BalancerConfig {
    pub fn builder() -> BalancerConfigBuilder {
        BalancerConfigBuilder::default()
    }

    /// The embedded reference configuration without any overrides.
    pub fn reference() -> anyhow::Result<Self> {
        Self::builder().build()
    }
}

#[derive(Debug)]
pub struct BalancerConfigBuilder {
    builder: config::ConfigBuilder<DefaultState>,
}

impl Default for BalancerConfigBuilder {
    fn default() -> Self {
        let builder = config::Config::builder().add_source(File::from_str(BALANCER_CONFIG, FileFormat::Toml));
        Self { builder }
    }
}

impl ConfigBuilder for BalancerConfigBuilder {
    type C = BalancerConfig;

    fn add_source<T>(self, source: T) -> anyhow::Result<Self> where T: Source + Send + Sync + 'static {
        Ok(Self { builder: self.builder.add_source(source) })
    }

    fn build(self) -> anyhow::Result<Self::C> {
        let balancer_config = self.builder.build()?.try_deserialize::<Self::C>()?;
        Ok(balancer_config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use config::{File, FileFormat};

    use crate::classifier::{MatchKind, MethodClass, MethodRule};
    use crate::config::{BalancerConfig, ConfigBuilder};

    #[test]
    fn test_reference_config() -> anyhow::Result<()> {
        let config = BalancerConfig::reference()?;
        assert_eq!(config.resolver.scheme, "leader-aware");
        assert_eq!(config.resolver.dial_timeout, Duration::from_secs(5));
        assert_eq!(config.routing.rules.len(), 7);
        assert_eq!(config.routing.rules[0], MethodRule::contains("AddShop", MethodClass::Write));
        let classifier = config.routing.classifier()?;
        assert_eq!(classifier.classify("/shops.v1.Shops/GetServers"), Some(MethodClass::Metadata));
        Ok(())
    }

    #[test]
    fn test_override_rules() -> anyhow::Result<()> {
        let overrides = r#"
            [resolver]
            scheme = "orders"

            [routing]
            rules = [
                { pattern = "^/orders\\.v1\\.Orders/(Create|Cancel)", class = "write", kind = "regex" },
                { pattern = "ListOrders", class = "read" },
            ]
        "#;
        let config = BalancerConfig::builder()
            .add_source(File::from_str(overrides, FileFormat::Toml))?
            .build()?;
        assert_eq!(config.resolver.scheme, "orders");
        assert_eq!(config.resolver.discovery_timeout, Duration::from_secs(5));
        assert_eq!(config.routing.rules.len(), 2);
        assert_eq!(config.routing.rules[0].kind, MatchKind::Regex);
        let classifier = config.routing.classifier()?;
        assert_eq!(classifier.classify("/orders.v1.Orders/CancelOrder"), Some(MethodClass::Write));
        assert_eq!(classifier.classify("/orders.v1.Orders/ListOrders"), Some(MethodClass::Read));
        assert_eq!(classifier.classify("/shops.v1.Shops/AddShop"), None);
        Ok(())
    }

    #[test]
    fn test_serialize() -> anyhow::Result<()> {
        let config = BalancerConfig::reference()?;
        let str = toml::to_string(&config)?;
        assert!(str.contains("leader-aware"));
        Ok(())
    }
}
