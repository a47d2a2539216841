//! Address validation and generation for junkmail.
//!
//! Local-parts are limited to ASCII letters, digits, `.`, `-` and `_`, and
//! may not start or end with a dot. Full addresses only need one `@` with no
//! whitespace on either side, so `localhost`-style domains are accepted.

use rand::Rng;
use thiserror::Error;

use crate::JunkmailError;

/// Length of a generated local-part.
pub const GENERATED_LOCAL_PART_LENGTH: usize = 10;

/// Characters used for generated local-parts.
const LOCAL_PART_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Address validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Local-part contains forbidden characters or dots at the edges.
    #[error("invalid local part: only letters, digits, '.', '-' and '_' are allowed")]
    InvalidLocalPart,

    /// Full address is malformed.
    #[error("invalid email format")]
    InvalidFormat,

    /// Address uses a domain other than ours.
    #[error("email must use domain @{0}")]
    WrongDomain(String),
}

impl From<AddressError> for JunkmailError {
    fn from(err: AddressError) -> Self {
        JunkmailError::Validation(err.to_string())
    }
}

/// Check a local-part.
///
/// # Examples
///
/// ```
/// use junkmail::address::is_valid_local_part;
///
/// assert!(is_valid_local_part("john.doe"));
/// assert!(!is_valid_local_part(".john"));
/// assert!(!is_valid_local_part("jo hn"));
/// ```
pub fn is_valid_local_part(local: &str) -> bool {
    !local.is_empty()
        && !local.starts_with('.')
        && !local.ends_with('.')
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

/// Check that an address has exactly one `@` with non-blank text on both
/// sides.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let ok = |part: &str| !part.is_empty() && !part.contains(|c: char| c.is_whitespace() || c == '@');
    ok(local) && ok(domain)
}

/// Text before the first `@`.
pub fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or_default()
}

/// Text between the first and second `@`, or empty.
pub fn domain(email: &str) -> &str {
    email.split('@').nth(1).unwrap_or_default()
}

/// Generate a random address on `domain`.
pub fn generate_address(domain: &str) -> String {
    let mut rng = rand::rng();
    let local: String = (0..GENERATED_LOCAL_PART_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..LOCAL_PART_CHARS.len());
            LOCAL_PART_CHARS[idx] as char
        })
        .collect();
    format!("{local}@{domain}")
}

/// Turn a requested address into the address to create.
///
/// - no request: a generated address
/// - a bare local-part: `local@domain`
/// - a full address: accepted as-is if it is well formed and on `domain`
pub fn resolve_requested_address(
    custom: Option<&str>,
    domain_name: &str,
) -> Result<String, AddressError> {
    let Some(custom) = custom.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(generate_address(domain_name));
    };

    if custom.contains('@') {
        if !is_valid_email(custom) {
            return Err(AddressError::InvalidFormat);
        }
        if !is_valid_local_part(local_part(custom)) {
            return Err(AddressError::InvalidLocalPart);
        }
        if domain(custom) != domain_name {
            return Err(AddressError::WrongDomain(domain_name.to_string()));
        }
        return Ok(custom.to_string());
    }

    if !is_valid_local_part(custom) {
        return Err(AddressError::InvalidLocalPart);
    }
    Ok(format!("{custom}@{domain_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_local_parts() {
        assert!(is_valid_local_part("abc"));
        assert!(is_valid_local_part("John.Doe"));
        assert!(is_valid_local_part("a-b_c.d"));
        assert!(is_valid_local_part("0"));
    }

    #[test]
    fn test_invalid_local_parts() {
        assert!(!is_valid_local_part(""));
        assert!(!is_valid_local_part(".abc"));
        assert!(!is_valid_local_part("abc."));
        assert!(!is_valid_local_part("a+b"));
        assert!(!is_valid_local_part("a b"));
        assert!(!is_valid_local_part("a@b"));
        assert!(!is_valid_local_part("ünïcode"));
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("x@localhost"));
        assert!(is_valid_email("x.y@junk.test"));
        assert!(!is_valid_email("x"));
        assert!(!is_valid_email("@junk.test"));
        assert!(!is_valid_email("x@"));
        assert!(!is_valid_email("x@@junk.test"));
        assert!(!is_valid_email("x y@junk.test"));
        assert!(!is_valid_email("x@a@b"));
    }

    #[test]
    fn test_split_helpers() {
        assert_eq!(local_part("x@junk.test"), "x");
        assert_eq!(domain("x@junk.test"), "junk.test");
        assert_eq!(local_part("plain"), "plain");
        assert_eq!(domain("plain"), "");
    }

    #[test]
    fn test_generate_address() {
        let address = generate_address("junk.test");
        let local = local_part(&address);

        assert_eq!(local.len(), GENERATED_LOCAL_PART_LENGTH);
        assert!(local
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        assert_eq!(domain(&address), "junk.test");
        assert_ne!(generate_address("junk.test"), address);
    }

    #[test]
    fn test_resolve_generated() {
        let address = resolve_requested_address(None, "junk.test").unwrap();
        assert_eq!(domain(&address), "junk.test");

        let blank = resolve_requested_address(Some("  "), "junk.test").unwrap();
        assert_eq!(local_part(&blank).len(), GENERATED_LOCAL_PART_LENGTH);
    }

    #[test]
    fn test_resolve_local_part() {
        assert_eq!(
            resolve_requested_address(Some("hello"), "junk.test").unwrap(),
            "hello@junk.test"
        );
        assert_eq!(
            resolve_requested_address(Some("bad!"), "junk.test"),
            Err(AddressError::InvalidLocalPart)
        );
    }

    #[test]
    fn test_resolve_full_address() {
        assert_eq!(
            resolve_requested_address(Some("hello@junk.test"), "junk.test").unwrap(),
            "hello@junk.test"
        );
        assert_eq!(
            resolve_requested_address(Some("hello@other.test"), "junk.test"),
            Err(AddressError::WrongDomain("junk.test".to_string()))
        );
        assert_eq!(
            resolve_requested_address(Some(".hello@junk.test"), "junk.test"),
            Err(AddressError::InvalidLocalPart)
        );
        assert_eq!(
            resolve_requested_address(Some("a b@junk.test"), "junk.test"),
            Err(AddressError::InvalidFormat)
        );
    }

    #[test]
    fn test_error_converts_to_validation() {
        let err: JunkmailError = AddressError::InvalidFormat.into();
        assert!(matches!(err, JunkmailError::Validation(_)));
    }
}
