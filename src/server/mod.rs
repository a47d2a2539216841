//! SMTP server module.
//!
//! This module provides the TCP listener, reply formatting and the
//! per-connection SMTP session that feeds received mail into storage.
//! Command and DATA framing come from `smtp-proto`.

mod listener;
pub mod reply;
mod session;

pub use listener::{ConnectionPermit, SmtpServer};
pub use reply::Reply;
pub use session::{SessionSettings, SmtpSession, READ_BUFFER_SIZE};
