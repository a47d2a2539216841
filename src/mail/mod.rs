//! Mail module for junkmail.
//!
//! This module provides:
//! - The email data model
//! - Decoding of raw inbound messages
//! - The stored JSON representation of emails

mod codec;
mod decoder;
mod types;

pub use codec::{decode_email, encode_email};
pub use decoder::decode_message;
pub use types::{
    Attachment, Email, EmailAddress, InboxAddress, DEFAULT_ATTACHMENT_NAME, DEFAULT_SUBJECT,
    UNKNOWN_SENDER,
};
