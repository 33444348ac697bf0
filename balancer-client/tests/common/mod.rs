#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;

use balancer_core::member::ClusterMember;
use balancer_core::transport::metadata::{encode_servers, GET_SERVERS_METHOD};
use balancer_core::transport::rpc::RpcRequest;
use balancer_core::transport::server::{RpcHandler, RpcServer};

pub const ADD_SHOP: &str = "/shops.v1.Shops/AddShop";
pub const GET_SHOP: &str = "/shops.v1.Shops/GetShop";
pub const SEARCH_SHOPS: &str = "/shops.v1.Shops/SearchShops";

/// Payload asking a node to reply with the caller name it received.
pub const ECHO_CALLER: &[u8] = b"echo-caller";

/// Membership every fake node reports, `None` makes the metadata call fail.
pub type SharedMembers = Arc<Mutex<Option<Vec<ClusterMember>>>>;

struct NodeHandler {
    name: Mutex<String>,
    members: SharedMembers,
    stalled: AtomicBool,
}

#[async_trait]
impl RpcHandler for NodeHandler {
    async fn handle(&self, request: RpcRequest) -> anyhow::Result<Vec<u8>> {
        if request.method == GET_SERVERS_METHOD {
            let members = self.members.lock().clone().ok_or_else(|| anyhow!("cluster unavailable"))?;
            return encode_servers(&members);
        }
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if request.payload == ECHO_CALLER {
            Ok(request.caller().unwrap_or_default().as_bytes().to_vec())
        } else {
            Ok(self.name.lock().as_bytes().to_vec())
        }
    }
}

/// A node answering the metadata call and replying to any other call with
/// its own address, or with the caller name for an [`ECHO_CALLER`] payload.
pub struct FakeNode {
    pub server: RpcServer,
    handler: Arc<NodeHandler>,
}

impl FakeNode {
    pub async fn spawn(members: SharedMembers) -> anyhow::Result<Self> {
        let handler = Arc::new(NodeHandler { name: Mutex::new(String::new()), members, stalled: AtomicBool::new(false) });
        let server = RpcServer::bind("127.0.0.1:0", handler.clone()).await?;
        *handler.name.lock() = server.local_addr().to_string();
        Ok(Self { server, handler })
    }

    /// Calls other than the metadata call never get a reply from now on.
    pub fn stall(&self) {
        self.handler.stalled.store(true, Ordering::SeqCst);
    }

    pub fn addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn address(&self) -> String {
        self.addr().to_string()
    }
}

pub struct FakeCluster {
    pub members: SharedMembers,
    pub seed: FakeNode,
    pub nodes: Vec<FakeNode>,
}

impl FakeCluster {
    /// Starts `count` nodes with the first one as leader, plus a seed node
    /// that only serves the metadata call.
    pub async fn start(count: usize) -> anyhow::Result<Self> {
        let members: SharedMembers = Arc::new(Mutex::new(None));
        let seed = FakeNode::spawn(members.clone()).await?;
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            nodes.push(FakeNode::spawn(members.clone()).await?);
        }
        let cluster = Self { members, seed, nodes };
        cluster.elect(0);
        Ok(cluster)
    }

    pub fn elect(&self, leader: usize) {
        let members = self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| ClusterMember::new(node.address(), i == leader))
            .collect();
        *self.members.lock() = Some(members);
    }

    pub fn fail_metadata(&self) {
        *self.members.lock() = None;
    }

    pub fn seed_port(&self) -> u16 {
        self.seed.addr().port()
    }
}
