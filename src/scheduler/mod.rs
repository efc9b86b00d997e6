//! Recurring polls with backoff, suspension and cancellation.
//!
//! - Transient failures stretch the delay between ticks (see [`ExponentialBackoff`]).
//! - Terminal failures suspend the subscription until the widget's
//!   configuration changes in the credential store.
//! - [`PollScheduler::unsubscribe`] guarantees no late delivery.

mod backoff;
mod poller;
mod types;

pub use backoff::{ExponentialBackoff, MAX_BACKOFF};
pub use poller::PollScheduler;
pub use types::{PollEvent, SubscriptionHandle};
