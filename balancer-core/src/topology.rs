use ahash::{HashMap, HashMapExt};
use itertools::Itertools;

use crate::error::{Error, Result};
use crate::member::ClusterMember;

/// The membership learned by one discovery round.
///
/// A newer snapshot always carries a greater `version` than the one it
/// replaces. At most one member is flagged as leader.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TopologySnapshot {
    version: u64,
    members: Vec<ClusterMember>,
}

impl TopologySnapshot {
    /// Builds a snapshot from raw metadata records.
    ///
    /// Records sharing an address collapse into one member, the last record
    /// wins. More than one leader is rejected as malformed metadata.
    pub fn new(version: u64, members: Vec<ClusterMember>) -> Result<Self> {
        let mut by_address: HashMap<String, usize> = HashMap::with_capacity(members.len());
        let mut deduped: Vec<ClusterMember> = Vec::with_capacity(members.len());
        for member in members {
            match by_address.get(&member.address) {
                Some(index) => {
                    deduped[*index] = member;
                }
                None => {
                    by_address.insert(member.address.clone(), deduped.len());
                    deduped.push(member);
                }
            }
        }
        let leaders = deduped.iter().filter(|m| m.is_leader).collect_vec();
        if leaders.len() > 1 {
            let addresses = leaders.iter().map(|m| m.address.as_str()).join(", ");
            return Err(Error::DiscoveryFailed(format!("metadata reported {} leaders: {}", leaders.len(), addresses)));
        }
        Ok(Self {
            version,
            members: deduped,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn members(&self) -> &[ClusterMember] {
        &self.members
    }

    pub fn leader(&self) -> Option<&ClusterMember> {
        self.members.iter().find(|m| m.is_leader)
    }

    pub fn followers(&self) -> impl Iterator<Item=&ClusterMember> {
        self.members.iter().filter(|m| !m.is_leader)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::member::ClusterMember;
    use crate::topology::TopologySnapshot;

    #[test]
    fn test_partition_leader_and_followers() {
        let snapshot = TopologySnapshot::new(1, vec![
            ClusterMember::follower("127.0.0.1:15003"),
            ClusterMember::leader("127.0.0.1:15001"),
            ClusterMember::follower("127.0.0.1:15005"),
        ]).unwrap();
        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.leader().map(|m| m.address.as_str()), Some("127.0.0.1:15001"));
        assert_eq!(snapshot.followers().count(), 2);
    }

    #[test]
    fn test_duplicate_address_last_record_wins() {
        let snapshot = TopologySnapshot::new(3, vec![
            ClusterMember::leader("127.0.0.1:15001"),
            ClusterMember::follower("127.0.0.1:15003"),
            ClusterMember::follower("127.0.0.1:15001"),
        ]).unwrap();
        assert_eq!(snapshot.members().len(), 2);
        assert!(snapshot.leader().is_none());
    }

    #[test]
    fn test_reject_multiple_leaders() {
        let result = TopologySnapshot::new(1, vec![
            ClusterMember::leader("127.0.0.1:15001"),
            ClusterMember::leader("127.0.0.1:15003"),
        ]);
        assert!(matches!(result, Err(Error::DiscoveryFailed(_))));
    }
}
