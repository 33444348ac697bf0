use std::time::Duration;

use config::{Environment, File, FileFormat, Source};
use config::builder::DefaultState;
use serde::{Deserialize, Serialize};

use balancer_core::config::ConfigBuilder;

use crate::CLIENT_CONFIG;

pub const ENV_PREFIX: &'static str = "SHOP_SERVICE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub caller: String,
    pub dial_timeout: Duration,
    /// Deadline of every unary call issued through the client.
    pub call_timeout: Duration,
    pub max_pick_attempts: usize,
    pub pick_retry_backoff: Duration,
    pub refresh_interval: Option<Duration>,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Reference configuration overridden by `SHOP_SERVICE_*` variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::builder().with_env()?.build()
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn target(&self, scheme: &str) -> String {
        format!("{}://{}", scheme, self.authority())
    }
}

#[derive(Debug)]
pub struct ClientConfigBuilder {
    builder: config::ConfigBuilder<DefaultState>,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        let builder = config::Config::builder().add_source(File::from_str(CLIENT_CONFIG, FileFormat::Toml));
        Self { builder }
    }
}

impl ClientConfigBuilder {
    pub fn with_env(self) -> anyhow::Result<Self> {
        self.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }
}

impl ConfigBuilder for ClientConfigBuilder {
    type C = ClientConfig;

    fn add_source<T>(self, source: T) -> anyhow::Result<Self> where T: Source + Send + Sync + 'static {
        Ok(Self { builder: self.builder.add_source(source) })
    }

    fn build(self) -> anyhow::Result<Self::C> {
        let client_config = self.builder.build()?.try_deserialize::<Self::C>()?;
        Ok(client_config)
    }
}
