//! Helpers to build LDAP search filters (RFC 4515) from untrusted values.

use core::fmt::Write;

/// Escapes a string so that it can be used as the value of an equality filter.
pub fn escape_filter_value(value: &str) -> String {
    let mut res = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' => res.push_str("\\2a"),
            '(' => res.push_str("\\28"),
            ')' => res.push_str("\\29"),
            '\\' => res.push_str("\\5c"),
            '\0' => res.push_str("\\00"),
            c => res.push(c),
        }
    }
    res
}

/// Escapes every byte, for binary attributes like objectSid or schemaIDGUID.
pub fn escape_filter_bytes(bytes: &[u8]) -> String {
    let mut res = String::with_capacity(bytes.len() * 3);
    for b in bytes {
        let _ = write!(res, "\\{:02x}", b);
    }
    res
}
