//! Authenticated sessions against widget services.
//!
//! [`SessionManager`] keeps one [`Session`] per [`SessionKey`] and drives it
//! through the [`SessionState`] machine. Every poll and command goes through
//! the manager so that logins are shared and bounded.

mod manager;
mod state;

pub use manager::SessionManager;
pub use state::{Session, SessionKey, SessionState};
