use derive_more::Display;
use serde::{Deserialize, Serialize};

/// IssuanceState is ordered, a transition only ever moves to a greater state
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum IssuanceState {
    #[display("idle")]
    Idle,
    #[display("proposal-received")]
    ProposalReceived,
    #[display("offer-sent")]
    OfferSent,
    #[display("request-received")]
    RequestReceived,
    #[display("credential-issued")]
    CredentialIssued,
    #[display("done")]
    Done,
    #[display("abandoned")]
    Abandoned,
}

impl IssuanceState {
    pub const ALL: [IssuanceState; 7] = [
        IssuanceState::Idle,
        IssuanceState::ProposalReceived,
        IssuanceState::OfferSent,
        IssuanceState::RequestReceived,
        IssuanceState::CredentialIssued,
        IssuanceState::Done,
        IssuanceState::Abandoned,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, IssuanceState::Done | IssuanceState::Abandoned)
    }
}

/// IssuanceEvent is anything that can move an issuance forward
///
/// `Offer` comes from the control plane, `Issue` and `Fail` are raised by the supervisor itself
/// around the engine call, the others arrive on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceEvent {
    Propose,
    Offer,
    Request,
    Issue,
    Ack,
    Fail,
    ProblemReport,
}

impl IssuanceEvent {
    pub const ALL: [IssuanceEvent; 7] = [
        IssuanceEvent::Propose,
        IssuanceEvent::Offer,
        IssuanceEvent::Request,
        IssuanceEvent::Issue,
        IssuanceEvent::Ack,
        IssuanceEvent::Fail,
        IssuanceEvent::ProblemReport,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Advance(IssuanceState),
    /// the event already produced the current state, re-emit the last outbound message
    Duplicate,
    Ignore,
}

pub fn poll(state: IssuanceState, event: IssuanceEvent) -> Step {
    use IssuanceEvent as E;
    use IssuanceState as S;

    match (event, state) {
        (E::ProblemReport | E::Fail, S::Abandoned) => Step::Duplicate,
        (E::ProblemReport | E::Fail, S::Done) => Step::Ignore,
        (E::ProblemReport | E::Fail, _) => Step::Advance(S::Abandoned),

        (E::Propose, S::Idle) => Step::Advance(S::ProposalReceived),
        (E::Propose, S::ProposalReceived) => Step::Duplicate,

        (E::Offer, S::Idle | S::ProposalReceived) => Step::Advance(S::OfferSent),
        (E::Offer, S::OfferSent) => Step::Duplicate,

        (E::Request, S::OfferSent) => Step::Advance(S::RequestReceived),
        (E::Request, S::RequestReceived | S::CredentialIssued) => Step::Duplicate,

        (E::Issue, S::RequestReceived) => Step::Advance(S::CredentialIssued),

        (E::Ack, S::CredentialIssued) => Step::Advance(S::Done),
        (E::Ack, S::Done) => Step::Duplicate,

        _ => Step::Ignore,
    }
}
