use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use crate::transport::codec::{Packet, PacketCodec};
use crate::transport::rpc::{decode_message, encode_message, RpcRequest, RpcResponse};

#[async_trait]
pub trait RpcHandler: Send + Sync + 'static {
    async fn handle(&self, request: RpcRequest) -> anyhow::Result<Vec<u8>>;
}

/// Accept loop answering unary calls with an [`RpcHandler`].
///
/// Calls on one connection are answered in order, each reply tagged with the
/// call id of its request.
///
/// Dropping the server stops the accept loop and every inbound connection.
#[derive(Debug)]
pub struct RpcServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl RpcServer {
    pub async fn bind<A>(addr: A, handler: Arc<dyn RpcHandler>) -> anyhow::Result<Self> where A: ToSocketAddrs {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("rpc server listening on {}", local_addr);
        let handle = tokio::spawn(Self::accept_loop(listener, handler));
        Ok(Self { local_addr, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }

    async fn accept_loop(listener: TcpListener, handler: Arc<dyn RpcHandler>) {
        let mut inbound = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!("accept inbound connection from {}", peer);
                            inbound.spawn(Self::serve_connection(stream, peer, handler.clone()));
                        }
                        Err(error) => {
                            warn!("accept inbound connection error {:?}", error);
                        }
                    }
                }
                Some(_) = inbound.join_next(), if !inbound.is_empty() => {}
            }
        }
    }

    async fn serve_connection(stream: TcpStream, peer: SocketAddr, handler: Arc<dyn RpcHandler>) {
        let mut framed = Framed::new(stream, PacketCodec);
        loop {
            let packet = match framed.next().await {
                Some(Ok(packet)) => packet,
                Some(Err(error)) => {
                    warn!("{} codec error {:?}", peer, error);
                    break;
                }
                None => {
                    break;
                }
            };
            let response = match decode_message::<RpcRequest>(&packet.body) {
                Ok(request) => {
                    match handler.handle(request).await {
                        Ok(body) => RpcResponse::Ok(body),
                        Err(error) => RpcResponse::Err(format!("{:#}", error)),
                    }
                }
                Err(error) => {
                    warn!("{} deserialize error {:?}", peer, error);
                    break;
                }
            };
            let sent = match encode_message(&response) {
                Ok(bytes) => framed.send(Packet::new(packet.call_id, bytes)).await,
                Err(error) => Err(error),
            };
            if let Err(error) = sent {
                warn!("reply to {} error {:?}, drop current connection", peer, error);
                break;
            }
        }
        debug!("inbound connection from {} finished", peer);
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
