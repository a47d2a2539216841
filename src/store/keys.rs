//! Key layout in the ephemeral store.

/// Serialized email body.
pub fn email_key(id: &str) -> String {
    format!("email:{id}")
}

/// Sorted set of email ids for a recipient, scored by receive time.
pub fn inbox_key(address: &str) -> String {
    format!("inbox:{address}")
}

/// Serialized inbox view for an address.
pub fn address_key(address: &str) -> String {
    format!("address:{address}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(email_key("abc"), "email:abc");
        assert_eq!(inbox_key("x@junk.test"), "inbox:x@junk.test");
        assert_eq!(address_key("x@junk.test"), "address:x@junk.test");
    }
}
