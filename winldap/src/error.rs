use core::fmt::{Display, Formatter};
use windows::Win32::Networking::Ldap::LDAP_NO_SUCH_OBJECT;
use crate::utils::get_ldap_errmsg;

#[derive(Debug, Clone)]
pub enum LdapError {
    ConnectionFailed(u32),
    BindFailed(u32),
    UnbindFailed(u32),
    SearchFailed {
        base: Option<String>,
        filter: Option<String>,
        only_attributes: Option<Vec<String>>,
        code: u32,
    },
    /// A low-level call of the LDAP client library returned `code`
    ApiCallFailed {
        call: &'static str,
        code: u32,
    },
    RequiredObjectCollision {
        dn: String,
    },
    RequiredObjectMissing {
        dn: String,
    },
    RequiredAttributeMissing {
        dn: String,
        name: String,
    },
    /// Reading the values of `name`, or the attribute list itself when `None`, failed
    AttributeReadFailed {
        dn: String,
        name: Option<String>,
        code: u32,
    },
    AttributeReturnedTwice {
        dn: String,
        name: String,
    },
    AttributeValuesCollision {
        dn: String,
        name: String,
        val1: String,
        val2: String,
    },
}

impl LdapError {
    /// Whether a search failed because its base object does not exist.
    pub fn is_no_such_object(&self) -> bool {
        matches!(self, Self::SearchFailed { code, .. } if *code == LDAP_NO_SUCH_OBJECT.0 as u32)
    }
}

impl Display for LdapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectionFailed(code) => write!(f, "connection failed ({})", get_ldap_errmsg(*code)),
            Self::BindFailed(code) => write!(f, "bind with the process identity failed ({})", get_ldap_errmsg(*code)),
            Self::UnbindFailed(code) => write!(f, "unbind failed ({})", get_ldap_errmsg(*code)),
            Self::SearchFailed { base, filter, only_attributes, code } => write!(f, "search in \"{}\" (filter={:?}) (attributes={:?}) failed ({})", base.as_deref().unwrap_or(""), filter, only_attributes, get_ldap_errmsg(*code)),
            Self::ApiCallFailed { call, code } => write!(f, "{}() failed ({})", call, get_ldap_errmsg(*code)),
            Self::RequiredObjectCollision { dn } => write!(f, "more than one object matches {}", dn),
            Self::RequiredObjectMissing { dn } => write!(f, "object \"{}\" not found", dn),
            Self::RequiredAttributeMissing { dn, name } => write!(f, "required attribute \"{}\" missing on {}", name, dn),
            Self::AttributeReadFailed { dn, name: Some(name), code } => write!(f, "reading attribute \"{}\" of {} failed ({})", name, dn, get_ldap_errmsg(*code)),
            Self::AttributeReadFailed { dn, name: None, code } => write!(f, "listing attributes of {} failed ({})", dn, get_ldap_errmsg(*code)),
            Self::AttributeReturnedTwice { dn, name } => write!(f, "attribute \"{}\" returned twice for {}", name, dn),
            Self::AttributeValuesCollision { dn, name, val1, val2 } => write!(f, "single-valued attribute {} of {} has several values ({} / {})", name, dn, val1, val2),
        }
    }
}

impl std::error::Error for LdapError {}
