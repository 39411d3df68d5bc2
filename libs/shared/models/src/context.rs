use chrono::{DateTime, Utc};

use crate::auth::Actor;

/// Per-request state handed to every scheduling operation.
///
/// `now` is captured once when the request enters the system so that the
/// validation and re-check phases of a booking agree on what "past" means.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: Actor,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            now: Utc::now(),
        }
    }

    pub fn at(actor: Actor, now: DateTime<Utc>) -> Self {
        Self { actor, now }
    }
}
