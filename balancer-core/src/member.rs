use std::fmt::{Display, Formatter};

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// One node of the replicated service as reported by the metadata RPC.
///
/// Members carry no identity beyond their address, two members with the same
/// address describe the same node.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Encode, Decode)]
pub struct ClusterMember {
    pub address: String,
    pub is_leader: bool,
}

impl ClusterMember {
    pub fn new(address: impl Into<String>, is_leader: bool) -> Self {
        Self {
            address: address.into(),
            is_leader,
        }
    }

    pub fn leader(address: impl Into<String>) -> Self {
        Self::new(address, true)
    }

    pub fn follower(address: impl Into<String>) -> Self {
        Self::new(address, false)
    }

    pub fn role(&self) -> &'static str {
        if self.is_leader {
            "leader"
        } else {
            "follower"
        }
    }
}

impl Display for ClusterMember {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.address, self.role())
    }
}
