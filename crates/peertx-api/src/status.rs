//! Failure-domain classified status errors
//!
//! Every error produced by a remote round trip is tagged with the group
//! (failure domain) it came from and a numeric code within that group.
//! Retry policies match on the `(group, code)` pair.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Failure domain of a status error
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Group {
    Unknown,
    /// Local client-side validation or selection failure
    Client,
    EndorserClient,
    EndorserServer,
    OrdererClient,
    OrdererServer,
    /// Commit (validation) status delivered by the event service
    EventServer,
    /// Status returned by the chaincode itself
    Chaincode,
    GrpcTransport,
}

impl Group {
    pub fn as_str(self) -> &'static str {
        match self {
            Group::Unknown => "Unknown",
            Group::Client => "Client Status",
            Group::EndorserClient => "Endorser Client Status",
            Group::EndorserServer => "Endorser Server Status",
            Group::OrdererClient => "Orderer Client Status",
            Group::OrdererServer => "Orderer Server Status",
            Group::EventServer => "Event Server Status",
            Group::Chaincode => "Chaincode Status",
            Group::GrpcTransport => "gRPC Transport Status",
        }
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codes raised by the client side of a connection
pub mod client {
    pub const OK: i32 = 0;
    pub const UNKNOWN: i32 = 1;
    pub const CONNECTION_FAILED: i32 = 2;
    pub const ENDORSEMENT_MISMATCH: i32 = 3;
    pub const EMPTY_CERT: i32 = 4;
    pub const TIMEOUT: i32 = 5;
    pub const NO_PEERS_FOUND: i32 = 6;
    pub const MULTIPLE_ERRORS: i32 = 7;
    pub const SIGNATURE_VERIFICATION_FAILED: i32 = 8;
    pub const MISSING_ENDORSEMENT: i32 = 9;
    pub const QUERY_ENDORSERS: i32 = 11;
    pub const GENERIC_TRANSIENT: i32 = 12;
    pub const PREMATURE_CHAINCODE_EXECUTION: i32 = 21;
    pub const CHAINCODE_ALREADY_LAUNCHING: i32 = 22;
    pub const CHAINCODE_NAME_NOT_FOUND: i32 = 23;
}

/// Codes returned by endorsing and ordering servers
pub mod server {
    pub const SUCCESS: i32 = 200;
    pub const BAD_REQUEST: i32 = 400;
    pub const FORBIDDEN: i32 = 403;
    pub const NOT_FOUND: i32 = 404;
    pub const INTERNAL_SERVER_ERROR: i32 = 500;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
}

/// gRPC transport codes
pub mod grpc {
    pub const DEADLINE_EXCEEDED: i32 = 4;
    pub const UNAVAILABLE: i32 = 14;
}

/// A status error tagged with its failure domain
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{group} : code: {code} : {message}")]
pub struct Status {
    pub group: Group,
    pub code: i32,
    pub message: String,
}

impl Status {
    pub fn new(group: Group, code: i32, message: impl Into<String>) -> Self {
        Self {
            group,
            code,
            message: message.into(),
        }
    }
}
