//! Quota-aware chat client.
//!
//! Holds the per-session state machine that talks to the chat relay, the
//! countdown timers it drives and the small persisted store that keeps the
//! daily quota window and API endpoint across restarts.

pub mod api;
pub mod config;
pub mod countdown;
pub mod error;
pub mod history;
pub mod quota_window;
pub mod session;
pub mod store;
pub mod view;

pub use error::ClientError;
pub use session::{ChatSession, SessionPhase};
