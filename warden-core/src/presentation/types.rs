use derive_more::Display;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::types::{AttributeInfo, PredicateInfo};

/// ProofRequest is what an operator asks a prover to show
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProofRequest {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// format picks the presentation engine, the first registered engine when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(rename = "requestedAttributes", default)]
    pub requested_attributes: BTreeMap<String, AttributeInfo>,

    #[serde(rename = "requestedPredicates", default)]
    pub requested_predicates: BTreeMap<String, PredicateInfo>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// PresentationState is ordered, `verified`, `rejected` and `abandoned` are terminal
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PresentationState {
    #[display("idle")]
    Idle,
    #[display("request-sent")]
    RequestSent,
    #[display("presentation-received")]
    PresentationReceived,
    #[display("verified")]
    Verified,
    #[display("rejected")]
    Rejected,
    #[display("abandoned")]
    Abandoned,
}

impl PresentationState {
    pub const ALL: [PresentationState; 6] = [
        PresentationState::Idle,
        PresentationState::RequestSent,
        PresentationState::PresentationReceived,
        PresentationState::Verified,
        PresentationState::Rejected,
        PresentationState::Abandoned,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PresentationState::Verified | PresentationState::Rejected | PresentationState::Abandoned
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationEvent {
    Request,
    Present,
    Verify,
    Reject,
    Propose,
    ProblemReport,
}

impl PresentationEvent {
    pub const ALL: [PresentationEvent; 6] = [
        PresentationEvent::Request,
        PresentationEvent::Present,
        PresentationEvent::Verify,
        PresentationEvent::Reject,
        PresentationEvent::Propose,
        PresentationEvent::ProblemReport,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Advance(PresentationState),
    Duplicate,
    Ignore,
}

pub fn poll(state: PresentationState, event: PresentationEvent) -> Step {
    use PresentationEvent as E;
    use PresentationState as S;

    match (event, state) {
        (E::Request, S::Idle) => Step::Advance(S::RequestSent),
        (E::Request, S::RequestSent) => Step::Duplicate,

        (E::Present, S::RequestSent) => Step::Advance(S::PresentationReceived),
        (E::Present, S::PresentationReceived | S::Verified | S::Rejected) => Step::Duplicate,

        (E::Verify, S::PresentationReceived) => Step::Advance(S::Verified),
        (E::Reject, S::PresentationReceived) => Step::Advance(S::Rejected),

        (E::Propose | E::ProblemReport, S::Abandoned) => Step::Duplicate,
        (E::Propose | E::ProblemReport, S::Verified | S::Rejected) => Step::Ignore,
        (E::Propose | E::ProblemReport, _) => Step::Advance(S::Abandoned),

        _ => Step::Ignore,
    }
}
