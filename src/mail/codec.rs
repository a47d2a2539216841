//! Stored representation of emails.
//!
//! Emails are written as JSON with camelCase fields. Attachment payloads are
//! arbitrary bytes, so they travel as standard base64 text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::types::{Attachment, Email, EmailAddress};
use crate::{JunkmailError, Result};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredAttachment {
    filename: String,
    content_type: String,
    size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEmail {
    id: String,
    from: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    received_at: i64,
    #[serde(default)]
    attachments: Vec<StoredAttachment>,
}

/// Encode an email for the ephemeral store.
pub fn encode_email(email: &Email) -> Result<String> {
    let stored = StoredEmail {
        id: email.id.clone(),
        from: email.from.clone(),
        to: email.to.clone(),
        subject: email.subject.clone(),
        text: email.text.clone(),
        html: email.html.clone(),
        received_at: email.received_at,
        attachments: email
            .attachments
            .iter()
            .map(|a| StoredAttachment {
                filename: a.filename.clone(),
                content_type: a.content_type.clone(),
                size: a.size,
                content: a.content.as_deref().map(|bytes| STANDARD.encode(bytes)),
            })
            .collect(),
    };
    Ok(serde_json::to_string(&stored)?)
}

/// Decode an email read back from the ephemeral store.
pub fn decode_email(data: &str) -> Result<Email> {
    let stored: StoredEmail = serde_json::from_str(data)?;

    let attachments = stored
        .attachments
        .into_iter()
        .map(|a| {
            let content = match a.content {
                Some(text) => Some(STANDARD.decode(text).map_err(|e| {
                    JunkmailError::Serialization(format!(
                        "attachment {} has invalid base64: {e}",
                        a.filename
                    ))
                })?),
                None => None,
            };
            Ok(Attachment {
                filename: a.filename,
                content_type: a.content_type,
                size: a.size,
                content,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Email {
        id: stored.id,
        from: stored.from,
        to: stored.to,
        subject: stored.subject,
        text: stored.text,
        html: stored.html,
        received_at: stored.received_at,
        attachments,
    })
}
