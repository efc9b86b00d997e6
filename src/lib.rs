//! deckhand: credential vault and session layer for a self-hosted dashboard.
//!
//! Widget secrets are encrypted at rest and never leave the crate in either
//! form. Each widget gets one upstream session that is shared by polling and
//! commands; failures reach callers as classified [`error::DeckError`]s.

pub mod adapters;
pub mod cli;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod integrations;
pub mod models;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod traits;
