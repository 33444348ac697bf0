use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tracing::info;

use balancer_core::ext::init_logger_with_filter;
use balancer_core::member::ClusterMember;
use balancer_core::transport::metadata::{encode_servers, GET_SERVERS_METHOD};
use balancer_core::transport::rpc::RpcRequest;
use balancer_core::transport::server::{RpcHandler, RpcServer};

/// A stand-in cluster node: answers the metadata call with a fixed
/// membership and replies to every other call with its own address.
#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long)]
    addr: SocketAddr,
    /// Every member of the cluster, this node included.
    #[arg(short, long, value_delimiter = ',')]
    members: Vec<String>,
    #[arg(short, long)]
    leader: String,
}

struct NodeHandler {
    addr: SocketAddr,
    members: Vec<ClusterMember>,
}

#[async_trait]
impl RpcHandler for NodeHandler {
    async fn handle(&self, request: RpcRequest) -> anyhow::Result<Vec<u8>> {
        info!(
            "{} handle {} from {} with {} bytes",
            self.addr,
            request.method,
            request.caller().unwrap_or("unknown caller"),
            request.payload.len(),
        );
        if request.method == GET_SERVERS_METHOD {
            encode_servers(&self.members)
        } else {
            Ok(self.addr.to_string().into_bytes())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger_with_filter("balancer_core=debug,node=info");
    let members = args.members
        .iter()
        .map(|address| ClusterMember::new(address.clone(), *address == args.leader))
        .collect();
    let handler = Arc::new(NodeHandler { addr: args.addr, members });
    let _server = RpcServer::bind(args.addr, handler).await?;
    tokio::signal::ctrl_c().await?;
    info!("node {} stopped", args.addr);
    Ok(())
}
