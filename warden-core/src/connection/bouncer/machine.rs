use super::types::{ExchangeState, Role};

/// Event is an inbound bootstrap message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Request,
    Response,
    Complete,
    ProblemReport,
}

impl Event {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "request" => Some(Event::Request),
            "response" => Some(Event::Response),
            "complete" | "ack" => Some(Event::Complete),
            "problem-report" => Some(Event::ProblemReport),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Advance(ExchangeState),
    Duplicate,
    Ignore,
}

/// poll decides what an event does to an exchange in the given state
pub fn poll(role: Role, state: ExchangeState, event: Event) -> Step {
    use ExchangeState::*;

    match (role, state, event) {
        (_, Abandoned, Event::ProblemReport) => Step::Duplicate,
        (_, Completed, Event::ProblemReport) => Step::Ignore,
        (_, _, Event::ProblemReport) => Step::Advance(Abandoned),

        (Role::Inviter, Invited, Event::Request) => Step::Advance(Responded),
        (Role::Inviter, Responded, Event::Request) => Step::Duplicate,
        (Role::Inviter, Responded, Event::Complete) => Step::Advance(Completed),
        (Role::Inviter, Completed, Event::Complete) => Step::Duplicate,

        (Role::Invitee, Requested, Event::Response) => Step::Advance(Completed),
        (Role::Invitee, Completed, Event::Response) => Step::Duplicate,

        _ => Step::Ignore,
    }
}
