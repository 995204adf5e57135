//! Conversation management for veritas
//!
//! `ChatSession` owns the message list, the loading flag and the error slot
//! of one conversation, and drives the prompt backend on each send.
//! Observers follow changes through a `tokio::sync::watch` subscription.

pub mod options;
pub mod session;

pub use options::{SendOutcome, SessionOptions};
pub use session::{ChatSession, SEND_CANCELLED_ERROR};
