//! Built-in handler steps and the chains assembled from them
//!
//! - `endorse_chain`: select targets, endorse, validate responses, verify signatures
//! - `endorse_and_commit_chain`: the endorse chain followed by the commit decision and commit
//! - `pre_endorsed_commit_chain`: commit decision and commit for an existing endorsement

mod commit;
mod endorsement;
mod selection;
mod validation;

pub use commit::{CheckForCommitHandler, CommitHandler, PreEndorsedHandler, has_writes};
pub use endorsement::{EndorsementHandler, NONCE_SIZE, new_nonce};
pub use selection::ProposalProcessorHandler;
pub use validation::{EndorsementValidationHandler, SignatureValidationHandler, validate_responses};

use peertx_api::handler::HandlerChain;
use peertx_api::model::Response;
use peertx_api::request::{CommitType, Namespace};

pub fn endorse_chain() -> HandlerChain {
    HandlerChain::new()
        .then(ProposalProcessorHandler)
        .then(EndorsementHandler)
        .then(EndorsementValidationHandler)
        .then(SignatureValidationHandler)
}

pub fn endorse_and_commit_chain(
    ignore_namespaces: Vec<Namespace>,
    commit_type: CommitType,
    async_commit: bool,
) -> HandlerChain {
    endorse_chain()
        .then(CheckForCommitHandler::new(ignore_namespaces, commit_type))
        .then(CommitHandler::new(async_commit))
}

pub fn pre_endorsed_commit_chain(
    response: Response,
    ignore_namespaces: Vec<Namespace>,
    commit_type: CommitType,
    async_commit: bool,
) -> HandlerChain {
    HandlerChain::new()
        .then(PreEndorsedHandler::new(response))
        .then(CheckForCommitHandler::new(ignore_namespaces, commit_type))
        .then(CommitHandler::new(async_commit))
}
