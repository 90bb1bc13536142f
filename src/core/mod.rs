//! Core chat components
//!
//! The registry owns the conversations, the reply generator picks canned
//! replies, and the controller ties both to the user-facing controls.

mod controller;
mod registry;
mod reply;
mod service;

pub use controller::{ChatController, ControlState, ControllerError, SendState};
pub use registry::ConversationRegistry;
pub use service::ChatService;
