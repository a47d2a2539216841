//! Turns raw RFC 5322 messages into [`Email`] values.

use mail_parser::{Address, Addr, MessageParser, MimeHeaders, PartType};
use uuid::Uuid;

use super::types::{
    Attachment, Email, EmailAddress, DEFAULT_ATTACHMENT_NAME, DEFAULT_SUBJECT,
};
use crate::datetime::now_millis;
use crate::{JunkmailError, Result};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Decode a raw message.
///
/// Fails when the message cannot be parsed or names no recipient.
pub fn decode_message(raw: &[u8]) -> Result<Email> {
    if raw.is_empty() {
        return Err(JunkmailError::Decode("empty message".to_string()));
    }

    let msg = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| JunkmailError::Decode("unparseable message".to_string()))?;

    let from = msg
        .from()
        .map(flatten)
        .and_then(|list| list.into_iter().next())
        .unwrap_or_else(EmailAddress::unknown);

    let to = msg.to().map(flatten).unwrap_or_default();
    if to.is_empty() {
        return Err(JunkmailError::Decode("message has no recipients".to_string()));
    }

    let subject = msg
        .subject()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SUBJECT)
        .to_string();

    // mail-parser lists HTML parts as text alternatives (and vice versa) when
    // only one flavour exists; keep each body only in its own flavour.
    let text = match msg.text_part(0).map(|p| &p.body) {
        Some(PartType::Text(text)) => text.to_string(),
        _ => String::new(),
    };
    let html = match msg.html_part(0).map(|p| &p.body) {
        Some(PartType::Html(html)) => Some(html.to_string()),
        _ => None,
    };

    let attachments = msg
        .attachments()
        .map(|part| {
            let filename = part
                .attachment_name()
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_ATTACHMENT_NAME);
            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
            Attachment::new(filename, content_type, part.contents().to_vec())
        })
        .collect();

    Ok(Email {
        id: Uuid::new_v4().simple().to_string(),
        from,
        to,
        subject,
        text,
        html,
        received_at: now_millis(),
        attachments,
    })
}

/// Flatten plain lists and groups into one ordered list, skipping entries
/// without an address.
fn flatten(address: &Address<'_>) -> Vec<EmailAddress> {
    let addrs: Vec<&Addr<'_>> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };

    addrs
        .into_iter()
        .filter_map(|addr| {
            let address = addr.address().filter(|a| !a.is_empty())?;
            Some(EmailAddress {
                address: address.to_string(),
                name: addr.name().filter(|n| !n.is_empty()).map(str::to_string),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crlf(s: &str) -> Vec<u8> {
        s.replace('\n', "\r\n").into_bytes()
    }

    #[test]
    fn test_decode_simple_message() {
        let raw = crlf(
            "From: Alice <alice@example.com>\n\
             To: x@junk.test\n\
             Subject: Hello there\n\
             \n\
             Just a body.\n",
        );

        let email = decode_message(&raw).unwrap();

        assert_eq!(email.from.address, "alice@example.com");
        assert_eq!(email.from.name.as_deref(), Some("Alice"));
        assert_eq!(email.to, vec![EmailAddress::new("x@junk.test")]);
        assert_eq!(email.subject, "Hello there");
        assert!(email.text.contains("Just a body."));
        assert!(email.html.is_none());
        assert!(email.attachments.is_empty());
        assert_eq!(email.id.len(), 32);
        assert!(email.received_at > 0);
    }

    #[test]
    fn test_decode_defaults() {
        let raw = crlf("To: x@junk.test\n\nbody\n");

        let email = decode_message(&raw).unwrap();

        assert_eq!(email.from, EmailAddress::unknown());
        assert_eq!(email.subject, DEFAULT_SUBJECT);
    }

    #[test]
    fn test_decode_multiple_recipients_and_groups() {
        let raw = crlf(
            "From: a@example.com\n\
             To: b@junk.test, \"Cee\" <c@junk.test>, Team: d@junk.test, e@junk.test;\n\
             Subject: fan-out\n\
             \n\
             hi\n",
        );

        let email = decode_message(&raw).unwrap();
        let recipients: Vec<&str> = email.recipients().collect();

        assert_eq!(
            recipients,
            vec!["b@junk.test", "c@junk.test", "d@junk.test", "e@junk.test"]
        );
        assert_eq!(email.to[1].name.as_deref(), Some("Cee"));
    }

    #[test]
    fn test_decode_no_recipients_fails() {
        let raw = crlf("From: a@example.com\nSubject: nobody\n\nbody\n");
        assert!(matches!(
            decode_message(&raw),
            Err(JunkmailError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_empty_fails() {
        assert!(matches!(decode_message(b""), Err(JunkmailError::Decode(_))));
    }

    #[test]
    fn test_decode_html_only() {
        let raw = crlf(
            "From: a@example.com\n\
             To: x@junk.test\n\
             Content-Type: text/html; charset=utf-8\n\
             \n\
             <p>Hello</p>\n",
        );

        let email = decode_message(&raw).unwrap();

        assert!(email.text.is_empty());
        assert!(email.html.unwrap().contains("<p>Hello</p>"));
    }

    #[test]
    fn test_decode_alternative_and_attachment() {
        let raw = crlf(
            "From: a@example.com\n\
             To: x@junk.test\n\
             Subject: with files\n\
             MIME-Version: 1.0\n\
             Content-Type: multipart/mixed; boundary=\"outer\"\n\
             \n\
             --outer\n\
             Content-Type: multipart/alternative; boundary=\"inner\"\n\
             \n\
             --inner\n\
             Content-Type: text/plain\n\
             \n\
             plain body\n\
             --inner\n\
             Content-Type: text/html\n\
             \n\
             <b>html body</b>\n\
             --inner--\n\
             --outer\n\
             Content-Type: application/pdf; name=\"doc.pdf\"\n\
             Content-Disposition: attachment; filename=\"doc.pdf\"\n\
             Content-Transfer-Encoding: base64\n\
             \n\
             AAEC/w==\n\
             --outer\n\
             Content-Type: application/octet-stream\n\
             Content-Disposition: attachment\n\
             Content-Transfer-Encoding: base64\n\
             \n\
             3q2+7w==\n\
             --outer--\n",
        );

        let email = decode_message(&raw).unwrap();

        assert!(email.text.contains("plain body"));
        assert!(email.html.as_deref().unwrap().contains("<b>html body</b>"));
        assert_eq!(email.attachments.len(), 2);

        let pdf = email.attachment("doc.pdf").unwrap();
        assert_eq!(pdf.content_type, "application/pdf");
        assert_eq!(pdf.content.as_deref(), Some(&[0x00, 0x01, 0x02, 0xff][..]));
        assert_eq!(pdf.size, 4);

        let unnamed = email.attachment(DEFAULT_ATTACHMENT_NAME).unwrap();
        assert_eq!(
            unnamed.content.as_deref(),
            Some(&[0xde, 0xad, 0xbe, 0xef][..])
        );
    }

    #[test]
    fn test_decode_ids_are_unique() {
        let raw = crlf("To: x@junk.test\n\nbody\n");
        let a = decode_message(&raw).unwrap();
        let b = decode_message(&raw).unwrap();
        assert_ne!(a.id, b.id);
    }
}
