use std::any::type_name;

use anyhow::{ensure, Context};
use bincode::{Decode, Encode};

/// Metadata key naming the client application that issued a call.
pub const CALLER_METADATA_KEY: &'static str = "service-client";

/// A unary call: the fully qualified method name, call metadata and an opaque
/// payload.
#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub struct RpcRequest {
    pub method: String,
    pub metadata: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            method: method.into(),
            metadata: Vec::new(),
            payload,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn caller(&self) -> Option<&str> {
        self.metadata(CALLER_METADATA_KEY)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Encode, Decode)]
pub enum RpcResponse {
    Ok(Vec<u8>),
    Err(String),
}

pub fn encode_message<T>(value: &T) -> anyhow::Result<Vec<u8>> where T: Encode {
    bincode::encode_to_vec(value, bincode::config::standard()).with_context(|| format!("encode {}", type_name::<T>()))
}

/// Decodes a whole message, trailing bytes are rejected.
pub fn decode_message<T>(bytes: &[u8]) -> anyhow::Result<T> where T: Decode {
    let (value, read) = bincode::decode_from_slice(bytes, bincode::config::standard())
        .with_context(|| format!("decode {}", type_name::<T>()))?;
    ensure!(read == bytes.len(), "decode {}: {} trailing bytes", type_name::<T>(), bytes.len() - read);
    Ok(value)
}
