//! Peer abstractions and selection filters

use std::sync::Arc;

use crate::error::Result;
use crate::model::{ProposalResponse, SignedProposal};

/// A remote endorsing peer
#[async_trait::async_trait]
pub trait Peer: Send + Sync {
    /// Endpoint URL, possibly including a scheme (e.g. `grpcs://peer0.org1:7051`)
    fn url(&self) -> &str;

    /// MSP (organization) the peer belongs to
    fn msp_id(&self) -> &str;

    /// Send a signed proposal to the peer for endorsement
    async fn process_proposal(&self, proposal: &SignedProposal) -> Result<ProposalResponse>;
}

impl std::fmt::Debug for dyn Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("url", &self.url())
            .field("msp_id", &self.msp_id())
            .finish()
    }
}

/// Endpoint and organization of a candidate endorser, as seen by caller-supplied filters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub endpoint: String,
    pub msp_id: String,
}

impl PeerInfo {
    pub fn new(msp_id: &str, endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            msp_id: msp_id.to_string(),
        }
    }
}

/// Caller-supplied endorser selection predicate
pub trait PeerFilter: Send + Sync {
    fn accept(&self, peer: &PeerInfo) -> bool;
}

impl<F> PeerFilter for F
where
    F: Fn(&PeerInfo) -> bool + Send + Sync,
{
    fn accept(&self, peer: &PeerInfo) -> bool {
        self(peer)
    }
}

/// Filter applied by the dispatch layer to discovered peers
pub trait TargetFilter: Send + Sync {
    fn accept(&self, peer: &dyn Peer) -> bool;
}

pub type PeerRef = Arc<dyn Peer>;
