use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use balancer_core::error::{Error, Result};
use balancer_core::member::ClusterMember;
use balancer_core::picker::{Picker, ReadyConnection, RoutingDecision};
use balancer_core::registry::Registry;
use balancer_core::resolver::{Resolver, TopologySink};
use balancer_core::target::Target;
use balancer_core::topology::TopologySnapshot;
use balancer_core::transport::connection::Connection;
use balancer_core::transport::rpc::RpcRequest;

use crate::config::ClientConfig;
use crate::connector::Connector;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ChannelOptions {
    #[builder(default = 3)]
    pub max_pick_attempts: usize,
    #[builder(default = Duration::from_millis(100))]
    pub pick_retry_backoff: Duration,
    /// Issue a discovery round on this period. No periodic refresh when unset.
    #[builder(default, setter(strip_option))]
    pub refresh_interval: Option<Duration>,
    /// Deadline of a single unary call. Calls may block indefinitely when unset.
    #[builder(default, setter(strip_option))]
    pub call_timeout: Option<Duration>,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&ClientConfig> for ChannelOptions {
    fn from(value: &ClientConfig) -> Self {
        Self {
            max_pick_attempts: value.max_pick_attempts.max(1),
            pick_retry_backoff: value.pick_retry_backoff,
            refresh_interval: value.refresh_interval,
            call_timeout: Some(value.call_timeout),
        }
    }
}

struct ChannelState<C> {
    connector: Arc<dyn Connector<C>>,
    picker: Arc<dyn Picker<C>>,
    live: Mutex<Vec<ReadyConnection<C>>>,
}

impl<C> ChannelState<C> where C: Clone + Send + Sync + 'static {
    async fn evict(&self, address: &str) {
        let mut live = self.live.lock().await;
        if let Some(index) = live.iter().position(|r| r.member.address == address) {
            let evicted = live.remove(index);
            info!("evict broken connection to {}", evicted.member);
            self.connector.disconnect(evicted.conn).await;
            self.picker.rebuild(live.clone());
        }
    }

    async fn disconnect_all(&self) {
        let mut live = self.live.lock().await;
        for ready in live.drain(..) {
            self.connector.disconnect(ready.conn).await;
        }
        self.picker.rebuild(Vec::new());
    }
}

#[async_trait]
impl<C> TopologySink for ChannelState<C> where C: Clone + Send + Sync + 'static {
    async fn update_state(&self, snapshot: TopologySnapshot) -> anyhow::Result<()> {
        let mut live = self.live.lock().await;
        let mut previous = std::mem::take(&mut *live);
        let mut next = Vec::with_capacity(snapshot.members().len());
        for member in snapshot.members() {
            match previous.iter().position(|r| r.member.address == member.address) {
                Some(index) => {
                    let mut existing = previous.swap_remove(index);
                    if existing.member.is_leader != member.is_leader {
                        info!("{} changed role to {}", member.address, member.role());
                    }
                    existing.member = member.clone();
                    next.push(existing);
                }
                None => {
                    match self.connector.connect(member).await {
                        Ok(conn) => {
                            debug!("connected to {}", member);
                            next.push(ReadyConnection::new(conn, member.clone()));
                        }
                        Err(error) => {
                            warn!("connect {} error {:#}, skip it until next discovery", member, error);
                        }
                    }
                }
            }
        }
        for departed in previous {
            info!("{} left the topology, disconnect", departed.member);
            self.connector.disconnect(departed.conn).await;
        }
        *live = next;
        self.picker.rebuild(live.clone());
        info!(
            "topology v{} applied: [{}]",
            snapshot.version(),
            live.iter().map(|r| &r.member).join(", "),
        );
        Ok(())
    }
}

/// A logical channel to a replicated service.
///
/// The resolver registered for the target scheme feeds topology snapshots
/// into the channel, the channel keeps one connection per reachable member and
/// hands every call to the picker registered for the scheme.
pub struct BalancedChannel<C> {
    target: Target,
    options: ChannelOptions,
    state: Arc<ChannelState<C>>,
    resolver: Arc<dyn Resolver>,
    refresh: parking_lot::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<C> BalancedChannel<C> where C: Clone + Send + Sync + 'static {
    pub async fn connect(target: &str, registry: &Registry<C>, connector: Arc<dyn Connector<C>>, options: ChannelOptions) -> Result<Self> {
        let target: Target = target.parse()?;
        let resolver_builder = registry.resolver(target.scheme())?;
        let picker = registry.picker(target.scheme())?.build();
        let state = Arc::new(ChannelState {
            connector,
            picker,
            live: Mutex::new(Vec::new()),
        });
        let resolver = resolver_builder.build(&target, state.clone()).await?;
        let refresh = options.refresh_interval.map(|period| Self::spawn_refresh(resolver.clone(), period));
        info!("channel to {} ready", target);
        Ok(Self {
            target,
            options,
            state,
            resolver,
            refresh: parking_lot::Mutex::new(refresh),
            closed: AtomicBool::new(false),
        })
    }

    fn spawn_refresh(resolver: Arc<dyn Resolver>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                resolver.discover_now().await;
            }
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Picks the connection for `method`. When nothing is available a fresh
    /// discovery round runs before the next attempt, unless the method is one
    /// the picker refuses whatever the topology.
    pub async fn pick(&self, method: &str) -> Result<C> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed(self.target.to_string()));
        }
        let mut attempt = 1;
        loop {
            match self.state.picker.pick(method) {
                Ok(conn) => return Ok(conn),
                Err(error) if self.state.picker.decide(method) == RoutingDecision::Unavailable => {
                    debug!("{}, method is not routable", error);
                    return Err(error);
                }
                Err(error) if error.is_retryable() && attempt < self.options.max_pick_attempts => {
                    debug!("{}, rediscover before attempt {}", error, attempt + 1);
                    self.resolver.discover_now().await;
                    tokio::time::sleep(self.options.pick_retry_backoff).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    pub async fn discover_now(&self) {
        self.resolver.discover_now().await;
    }

    pub async fn live_members(&self) -> Vec<ClusterMember> {
        self.state.live.lock().await.iter().map(|r| r.member.clone()).collect()
    }

    /// Stops the refresh task, closes the resolver and every live connection.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("channel to {} already closed", self.target);
            return;
        }
        if let Some(refresh) = self.refresh.lock().take() {
            refresh.abort();
        }
        self.resolver.close().await;
        self.state.disconnect_all().await;
        info!("channel to {} closed", self.target);
    }
}

impl BalancedChannel<Arc<Connection>> {
    /// Issues a unary call on the picked connection, bounded by the call
    /// timeout. A connection found broken is evicted and the topology
    /// rediscovered before the call is retried.
    pub async fn call(&self, request: RpcRequest) -> Result<Vec<u8>> {
        let mut attempt = 1;
        loop {
            let conn = self.pick(&request.method).await?;
            match self.call_once(&conn, request.clone()).await {
                Err(Error::ConnectionClosed(peer)) if attempt < self.options.max_pick_attempts => {
                    warn!("call {} on {} failed with closed connection, retry", request.method, peer);
                    self.state.evict(&peer).await;
                    self.resolver.discover_now().await;
                    tokio::time::sleep(self.options.pick_retry_backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn call_once(&self, conn: &Connection, request: RpcRequest) -> Result<Vec<u8>> {
        let Some(timeout) = self.options.call_timeout else {
            return conn.call(request).await;
        };
        let method = request.method.clone();
        match tokio::time::timeout(timeout, conn.call(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("call {} on {} exceeded deadline of {:?}", method, conn.peer(), timeout);
                Err(Error::DeadlineExceeded { method, peer: conn.peer().to_string(), timeout })
            }
        }
    }
}

impl<C> Drop for BalancedChannel<C> {
    fn drop(&mut self) {
        if let Some(refresh) = self.refresh.get_mut().take() {
            refresh.abort();
        }
    }
}
