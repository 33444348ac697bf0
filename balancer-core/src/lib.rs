pub const BALANCER_CONFIG: &'static str = include_str!("../balancer.toml");

pub mod classifier;
pub mod config;
pub mod error;
pub mod ext;
pub mod member;
pub mod picker;
pub mod registry;
pub mod resolver;
pub mod target;
pub mod topology;
pub mod transport;

pub use error::{Error, Result};
