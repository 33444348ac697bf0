pub mod codec;
pub mod connection;
pub mod metadata;
pub mod rpc;
pub mod server;
