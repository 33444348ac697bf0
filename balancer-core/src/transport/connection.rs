use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{anyhow, ensure, Context};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::transport::codec::{Packet, PacketCodec};
use crate::transport::rpc::{decode_message, encode_message, RpcRequest, RpcResponse};

/// A TCP connection carrying one unary call at a time.
///
/// Calls are serialised on the connection and tagged with increasing call
/// ids. A call whose future is dropped before its reply arrives leaves the
/// stream usable: the late reply is skipped by the next call. Any transport
/// failure drops the underlying stream, after which every call fails with
/// [`Error::ConnectionClosed`].
pub struct Connection {
    peer: String,
    next_call_id: AtomicU64,
    framed: Mutex<Option<Framed<TcpStream, PacketCodec>>>,
}

impl Connection {
    pub async fn connect(addr: &str, dial_timeout: Duration) -> anyhow::Result<Self> {
        let stream = tokio::time::timeout(dial_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| anyhow!("dial {} timed out after {:?}", addr, dial_timeout))?
            .with_context(|| format!("dial {}", addr))?;
        if let Some(e) = stream.set_nodelay(true).err() {
            warn!("connect {} set tcp nodelay error {:?}", addr, e);
        }
        debug!("connected to {}", addr);
        Ok(Self {
            peer: addr.to_string(),
            next_call_id: AtomicU64::new(1),
            framed: Mutex::new(Some(Framed::new(stream, PacketCodec))),
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub async fn is_closed(&self) -> bool {
        self.framed.lock().await.is_none()
    }

    pub async fn call(&self, request: RpcRequest) -> Result<Vec<u8>> {
        let mut framed = self.framed.lock().await;
        let stream = framed.as_mut().ok_or_else(|| Error::ConnectionClosed(self.peer.clone()))?;
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);
        let response = match self.round_trip(stream, call_id, &request).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                *framed = None;
                return Err(Error::ConnectionClosed(self.peer.clone()));
            }
            Err(error) => {
                *framed = None;
                warn!("call {} on {} failed {:?}, drop current connection", request.method, self.peer, error);
                return Err(Error::ConnectionClosed(self.peer.clone()));
            }
        };
        match response {
            RpcResponse::Ok(body) => Ok(body),
            RpcResponse::Err(message) => Err(Error::Remote { peer: self.peer.clone(), message }),
        }
    }

    async fn round_trip(&self, stream: &mut Framed<TcpStream, PacketCodec>, call_id: u64, request: &RpcRequest) -> anyhow::Result<Option<RpcResponse>> {
        stream.send(Packet::new(call_id, encode_message(request)?)).await?;
        while let Some(packet) = stream.next().await {
            let packet = packet?;
            if packet.call_id == call_id {
                return Ok(Some(decode_message::<RpcResponse>(&packet.body)?));
            }
            ensure!(packet.call_id < call_id, "reply to unknown call {} while waiting for {}", packet.call_id, call_id);
            debug!("{} skip late reply to abandoned call {}", self.peer, packet.call_id);
        }
        Ok(None)
    }

    /// Shuts the stream down. Closing an already closed connection is an error
    /// the caller is free to ignore.
    pub async fn close(&self) -> anyhow::Result<()> {
        let framed = self.framed.lock().await.take();
        match framed {
            None => Err(anyhow!("connection to {} already closed", self.peer)),
            Some(mut framed) => {
                SinkExt::<Packet>::close(&mut framed).await.with_context(|| format!("close connection to {}", self.peer))?;
                debug!("closed connection to {}", self.peer);
                Ok(())
            }
        }
    }
}

impl Debug for Connection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::Error;
    use crate::transport::connection::Connection;
    use crate::transport::rpc::RpcRequest;
    use crate::transport::server::{RpcHandler, RpcServer};

    /// Replies with the call's sequence number, the first call only after a delay.
    #[derive(Default)]
    struct SlowFirstHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RpcHandler for SlowFirstHandler {
        async fn handle(&self, request: RpcRequest) -> anyhow::Result<Vec<u8>> {
            let seq = self.calls.fetch_add(1, Ordering::SeqCst);
            if seq == 0 {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            anyhow::ensure!(!request.method.ends_with("Fail"), "{} rejected", request.method);
            Ok(format!("{}#{}", request.method, seq).into_bytes())
        }
    }

    async fn connect(server: &RpcServer) -> anyhow::Result<Connection> {
        Connection::connect(&server.local_addr().to_string(), Duration::from_secs(1)).await
    }

    #[tokio::test]
    async fn test_abandoned_call_reply_is_skipped() -> anyhow::Result<()> {
        let server = RpcServer::bind("127.0.0.1:0", Arc::new(SlowFirstHandler::default())).await?;
        let conn = connect(&server).await?;
        let abandoned = tokio::time::timeout(Duration::from_millis(100), conn.call(RpcRequest::new("/a", Vec::new()))).await;
        assert!(abandoned.is_err());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(conn.call(RpcRequest::new("/b", Vec::new())).await?, b"/b#1".to_vec());
        assert_eq!(conn.call(RpcRequest::new("/c", Vec::new())).await?, b"/c#2".to_vec());
        assert!(!conn.is_closed().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_abandoned_call_reply_still_in_flight() -> anyhow::Result<()> {
        let server = RpcServer::bind("127.0.0.1:0", Arc::new(SlowFirstHandler::default())).await?;
        let conn = connect(&server).await?;
        let abandoned = tokio::time::timeout(Duration::from_millis(50), conn.call(RpcRequest::new("/a", Vec::new()))).await;
        assert!(abandoned.is_err());
        assert_eq!(conn.call(RpcRequest::new("/b", Vec::new())).await?, b"/b#1".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn test_remote_error_keeps_connection() -> anyhow::Result<()> {
        let handler = SlowFirstHandler::default();
        handler.calls.store(1, Ordering::SeqCst);
        let server = RpcServer::bind("127.0.0.1:0", Arc::new(handler)).await?;
        let conn = connect(&server).await?;
        let result = conn.call(RpcRequest::new("/Fail", Vec::new())).await;
        assert!(matches!(result, Err(Error::Remote { .. })));
        assert_eq!(conn.call(RpcRequest::new("/ok", Vec::new())).await?, b"/ok#2".to_vec());
        conn.close().await?;
        assert!(matches!(conn.call(RpcRequest::new("/ok", Vec::new())).await, Err(Error::ConnectionClosed(_))));
        Ok(())
    }
}
