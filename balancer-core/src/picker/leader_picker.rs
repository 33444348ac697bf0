use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use crate::classifier::{MethodClass, MethodClassifier};
use crate::error::{Error, Result};
use crate::picker::{Picker, PickerBuilder, ReadyConnection, RoutingDecision};

#[derive(Debug)]
struct Partition<C> {
    leader: Option<C>,
    followers: Vec<C>,
    cursor: AtomicUsize,
}

impl<C> Default for Partition<C> {
    fn default() -> Self {
        Self {
            leader: None,
            followers: Vec::new(),
            cursor: AtomicUsize::new(0),
        }
    }
}

impl<C> Partition<C> where C: Clone {
    fn new(ready: Vec<ReadyConnection<C>>) -> Self {
        let mut leader = None;
        let mut followers = Vec::with_capacity(ready.len());
        for ReadyConnection { conn, member } in ready {
            if member.is_leader {
                if leader.is_some() {
                    warn!("more than one leader in live connection set, {} replaces the previous one", member.address);
                }
                leader = Some(conn);
            } else {
                followers.push(conn);
            }
        }
        Self {
            leader,
            followers,
            cursor: AtomicUsize::new(0),
        }
    }

    fn next_follower(&self) -> Option<C> {
        if self.followers.is_empty() {
            return None;
        }
        let current = self.cursor.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let index = current % self.followers.len();
        self.followers.get(index).cloned()
    }

    fn current_follower(&self) -> Option<C> {
        if self.followers.is_empty() {
            return None;
        }
        let index = self.cursor.load(Ordering::Relaxed) % self.followers.len();
        self.followers.get(index).cloned()
    }
}

/// Routes writes to the leader, spreads reads over followers round robin and
/// keeps metadata calls on the follower last used for a read.
///
/// With no follower live every call goes to the leader. Calls matching no
/// classification rule are refused while followers exist.
pub struct LeaderPicker<C> {
    classifier: Arc<MethodClassifier>,
    partition: ArcSwap<Partition<C>>,
}

impl<C> LeaderPicker<C> where C: Clone + Send + Sync + 'static {
    pub fn new(classifier: Arc<MethodClassifier>) -> Self {
        Self {
            classifier,
            partition: ArcSwap::from_pointee(Partition::default()),
        }
    }

    fn decision(partition: &Partition<C>, class: Option<MethodClass>) -> RoutingDecision {
        if partition.followers.is_empty() {
            return RoutingDecision::Leader;
        }
        match class {
            Some(MethodClass::Write) => RoutingDecision::Leader,
            Some(MethodClass::Read) => RoutingDecision::NextFollower,
            Some(MethodClass::Metadata) => RoutingDecision::CurrentFollower,
            None => RoutingDecision::Unavailable,
        }
    }

    pub fn follower_count(&self) -> usize {
        self.partition.load().followers.len()
    }

    pub fn has_leader(&self) -> bool {
        self.partition.load().leader.is_some()
    }
}

impl<C> Picker<C> for LeaderPicker<C> where C: Clone + Send + Sync + 'static {
    fn rebuild(&self, ready: Vec<ReadyConnection<C>>) {
        let partition = Partition::new(ready);
        debug!(
            "rebuild picker with leader: {}, followers: {}",
            partition.leader.is_some(),
            partition.followers.len(),
        );
        self.partition.store(Arc::new(partition));
    }

    fn decide(&self, method: &str) -> RoutingDecision {
        let partition = self.partition.load();
        Self::decision(&partition, self.classifier.classify(method))
    }

    fn pick(&self, method: &str) -> Result<C> {
        let partition = self.partition.load();
        let decision = Self::decision(&partition, self.classifier.classify(method));
        debug!("picking connection for {} with {} followers: {:?}", method, partition.followers.len(), decision);
        let picked = match decision {
            RoutingDecision::Leader => partition.leader.clone(),
            RoutingDecision::NextFollower => partition.next_follower(),
            RoutingDecision::CurrentFollower => partition.current_follower().or_else(|| partition.leader.clone()),
            RoutingDecision::Unavailable => None,
        };
        picked.ok_or_else(|| Error::NoConnectionAvailable(method.to_string()))
    }
}

/// Hands out one [`LeaderPicker`] per channel, all sharing one classifier.
pub struct LeaderPickerBuilder {
    name: String,
    classifier: Arc<MethodClassifier>,
}

impl LeaderPickerBuilder {
    pub fn new(name: impl Into<String>, classifier: MethodClassifier) -> Self {
        Self {
            name: name.into(),
            classifier: Arc::new(classifier),
        }
    }
}

impl<C> PickerBuilder<C> for LeaderPickerBuilder where C: Clone + Send + Sync + 'static {
    fn name(&self) -> &str {
        &self.name
    }

    fn build(&self) -> Arc<dyn Picker<C>> {
        Arc::new(LeaderPicker::new(self.classifier.clone()))
    }
}
