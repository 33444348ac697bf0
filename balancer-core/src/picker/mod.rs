use std::sync::Arc;

use crate::error::Result;
use crate::member::ClusterMember;

pub mod leader_picker;

/// A live connection together with the member it was opened for.
#[derive(Debug, Clone)]
pub struct ReadyConnection<C> {
    pub conn: C,
    pub member: ClusterMember,
}

impl<C> ReadyConnection<C> {
    pub fn new(conn: C, member: ClusterMember) -> Self {
        Self { conn, member }
    }
}

/// How a single call is routed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RoutingDecision {
    Leader,
    NextFollower,
    CurrentFollower,
    Unavailable,
}

pub trait Picker<C>: Send + Sync {
    /// Replaces the live connection set. Safe to call while picks are in
    /// flight, each pick sees either the old or the new set.
    fn rebuild(&self, ready: Vec<ReadyConnection<C>>);

    /// How a call to `method` would be routed against the current set.
    fn decide(&self, method: &str) -> RoutingDecision;

    /// Selects the connection carrying the call to `method`.
    fn pick(&self, method: &str) -> Result<C>;
}

pub trait PickerBuilder<C>: Send + Sync {
    fn name(&self) -> &str;

    fn build(&self) -> Arc<dyn Picker<C>>;
}
