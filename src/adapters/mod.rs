//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`FileConfigStorage`] - JSON file storage for the widget document
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles:
//! - [`mock::MockHttpClient`] - Configurable HTTP responses
//! - [`mock::InMemoryConfigStorage`] - In-memory document storage
//! - [`mock::ScriptedIntegration`] - Scripted integration results

pub mod file_storage;
pub mod mock;
pub mod reqwest_http;

pub use file_storage::FileConfigStorage;
pub use mock::{InMemoryConfigStorage, MockHttpClient, ScriptedIntegration};
pub use reqwest_http::ReqwestHttpClient;
