//! Mock implementations for testing.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - HTTP client with configurable responses
//! - [`InMemoryConfigStorage`] - In-memory widget document storage
//! - [`ScriptedIntegration`] - Integration with scripted login/poll/command results

pub mod http;
pub mod integration;
pub mod storage;

pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use integration::ScriptedIntegration;
pub use storage::InMemoryConfigStorage;
