//! Mail types for junkmail.

use serde::{Deserialize, Serialize};

/// Subject used when a message has none.
pub const DEFAULT_SUBJECT: &str = "(No subject)";

/// Filename used for attachments that declare none.
pub const DEFAULT_ATTACHMENT_NAME: &str = "unnamed";

/// Sender used when a message has no author field.
pub const UNKNOWN_SENDER: &str = "unknown@unknown";

/// A mailbox with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// `local@domain`, compared as an exact string.
    pub address: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EmailAddress {
    /// Create an address without a display name.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The sentinel sender for messages without an author.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_SENDER)
    }
}

/// A decoded attachment. `content` is an uninterpreted byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name.
    pub filename: String,
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Decoded payload; absent when the message carried no inline data.
    pub content: Option<Vec<u8>>,
}

impl Attachment {
    /// Create an attachment from its payload.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            size: content.len() as u64,
            content: Some(content),
        }
    }
}

/// A received message. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    /// Opaque unique token.
    pub id: String,
    /// Author.
    pub from: EmailAddress,
    /// Recipients, in declaration order; never empty.
    pub to: Vec<EmailAddress>,
    /// Subject.
    pub subject: String,
    /// Plain-text body (empty if none).
    pub text: String,
    /// HTML body.
    pub html: Option<String>,
    /// Receive time in epoch milliseconds.
    pub received_at: i64,
    /// Attachments in message order.
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Recipient addresses.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to.iter().map(|r| r.address.as_str())
    }

    /// Find an attachment by exact filename.
    pub fn attachment(&self, filename: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.filename == filename)
    }
}

/// Ephemeral inbox view of an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxAddress {
    /// Full address.
    pub address: String,
    /// Creation time in epoch milliseconds.
    pub created_at: i64,
    /// Absolute expiry in epoch milliseconds; 0 means it never expires.
    pub expires_at: i64,
}

impl InboxAddress {
    /// Whether the view is permanent.
    pub fn is_permanent(&self) -> bool {
        self.expires_at == 0
    }
}
