//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP client operations (GET, POST, DELETE)
//! - [`ConfigStorage`] - Persistence of the widget configuration document
//! - [`Integration`] - One third-party service: login, poll, command, classify

pub mod http;
pub mod integration;
pub mod storage;

pub use http::{Headers, HttpClient, HttpError, Response, REPEATED_HEADER_SEPARATOR};
pub use integration::{Credentials, Integration, SessionToken, Target};
pub use storage::{ConfigStorage, StorageError};
