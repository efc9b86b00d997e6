//! Types published by the poll scheduler.

use std::fmt;
use uuid::Uuid;

use crate::error::{DeckError, PublicError};
use crate::models::DomainSnapshot;

/// Opaque handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One tick's result for a subscription.
#[derive(Debug, Clone)]
pub struct PollEvent {
    pub subscription: SubscriptionHandle,
    pub widget_id: String,
    pub outcome: Result<DomainSnapshot, DeckError>,
}

impl PollEvent {
    /// The outcome with errors reduced to what the user may see.
    pub fn public_outcome(&self) -> Result<&DomainSnapshot, PublicError> {
        self.outcome.as_ref().map_err(DeckError::to_public)
    }
}
