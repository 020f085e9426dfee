//! Channel membership view used to pick endorsers

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use peertx_api::error::Result;

/// Role a channel member plays
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Endorser,
    Committer,
    Validator,
}

/// A peer known to be a member of the channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub endpoint: String,
    pub msp_id: String,
    /// Empty means the member plays every role
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl Member {
    pub fn new(msp_id: &str, endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            msp_id: msp_id.to_string(),
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: &[Role]) -> Self {
        self.roles = roles.to_vec();
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.is_empty() || self.roles.contains(&role)
    }
}

/// Source of channel membership, maintained outside this service
pub trait MembershipProvider: Send + Sync {
    fn members(&self, channel_id: &str) -> Result<Vec<Member>>;
}

pub(crate) fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

/// Membership of one channel
pub struct Discovery {
    channel_id: String,
    provider: Arc<dyn MembershipProvider>,
}

impl Discovery {
    pub fn new(channel_id: &str, provider: Arc<dyn MembershipProvider>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            provider,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn members(&self) -> Result<Vec<Member>> {
        self.provider.members(&self.channel_id)
    }

    /// The member at `endpoint`, compared without scheme and case
    pub fn get_member(&self, endpoint: &str) -> Option<Member> {
        let members = match self.members() {
            Ok(members) => members,
            Err(e) => {
                warn!("[{}] Failed to get channel members: {}", self.channel_id, e);
                return None;
            }
        };

        let wanted = strip_scheme(endpoint);
        members
            .into_iter()
            .find(|m| strip_scheme(&m.endpoint).eq_ignore_ascii_case(wanted))
    }
}
