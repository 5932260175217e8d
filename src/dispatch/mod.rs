//! Command dispatch. Turns inbound chat messages into session and render
//! operations.

pub mod commands;
pub mod dispatcher;
pub mod replies;

pub use commands::{Command, COMMANDS};
pub use dispatcher::{DispatchOutcome, Dispatcher};
