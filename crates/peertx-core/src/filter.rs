//! Peer target filters
//!
//! `TargetFilterAdapter` exposes a caller's endpoint/organization predicate
//! to the dispatch layer. `EndorserFilter` additionally drops discovered
//! peers the channel membership says are not endorsers.

use std::sync::Arc;

use peertx_api::peer::{Peer, PeerFilter, PeerInfo, TargetFilter};

use crate::discovery::{Discovery, Role};

pub struct TargetFilterAdapter {
    filter: Arc<dyn PeerFilter>,
}

impl TargetFilterAdapter {
    pub fn new(filter: Arc<dyn PeerFilter>) -> Self {
        Self { filter }
    }
}

impl TargetFilter for TargetFilterAdapter {
    fn accept(&self, peer: &dyn Peer) -> bool {
        self.filter.accept(&PeerInfo::new(peer.msp_id(), peer.url()))
    }
}

/// No predicate means no filter
pub fn new_target_filter(filter: Option<Arc<dyn PeerFilter>>) -> Option<Arc<dyn TargetFilter>> {
    filter.map(|f| Arc::new(TargetFilterAdapter::new(f)) as Arc<dyn TargetFilter>)
}

pub struct EndorserFilter {
    discovery: Arc<Discovery>,
    filter: Option<Arc<dyn TargetFilter>>,
}

impl EndorserFilter {
    pub fn new(discovery: Arc<Discovery>, filter: Option<Arc<dyn TargetFilter>>) -> Self {
        Self { discovery, filter }
    }
}

impl TargetFilter for EndorserFilter {
    fn accept(&self, peer: &dyn Peer) -> bool {
        // Peers without membership info carry no role restriction
        if let Some(member) = self.discovery.get_member(peer.url())
            && !member.has_role(Role::Endorser)
        {
            return false;
        }

        self.filter.as_ref().is_none_or(|f| f.accept(peer))
    }
}
