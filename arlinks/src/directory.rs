use std::convert::TryFrom;
use authz::{Guid, Sid};
use serde::Deserialize;
use crate::error::ArlinksError;

/// A directory object resolved from user input or from a reference held by a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DirectoryObject {
    pub dn: String,
    pub sid: Option<Sid>,
}

/// Delegation of an access template's permissions on a directory object to a trustee.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct AccessTemplateLink {
    #[serde(default)]
    pub dn: String,
    pub trustee: Sid,
    pub directory_object: String,
    pub access_template: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkFilter<'a> {
    Trustee(&'a Sid),
    DirectoryObject(&'a str),
    AccessTemplate(&'a str),
}

/// Localized labels for one schema class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct DisplaySpecifier {
    #[serde(default)]
    pub class_display_name: Option<String>,
    /// Raw `attributeDisplayNames` values, each formatted as `name,Label`
    #[serde(default)]
    pub attribute_display_names: Vec<String>,
}

impl DisplaySpecifier {
    /// Label of `name` in this class' attribute display names, compared case-insensitively.
    pub fn attribute_label(&self, name: &str) -> Option<&str> {
        self.attribute_display_names.iter()
            .filter_map(|pair| pair.split_once(','))
            .find(|(left, _)| left.trim().eq_ignore_ascii_case(name))
            .map(|(_, right)| right.trim())
    }
}

/// The administration service, as seen by the report: object lookups and link enumeration.
pub(crate) trait Directory {
    /// Resolves a user-supplied identity (DN, SID, DOMAIN\name or name) to a single object.
    fn find_object(&self, identity: &Identity) -> Result<Option<DirectoryObject>, ArlinksError>;

    /// Resolves an access template by DN or name.
    fn find_access_template(&self, identity: &Identity) -> Result<Option<DirectoryObject>, ArlinksError>;

    fn find_object_by_sid(&self, sid: &Sid) -> Result<Option<DirectoryObject>, ArlinksError>;

    fn enumerate_links(&self, filter: LinkFilter<'_>) -> Result<Vec<AccessTemplateLink>, ArlinksError>;

    /// Effective ACE list of an access template, as a string of bracketed ACEs.
    fn access_template_aces(&self, template_dn: &str) -> Result<Option<String>, ArlinksError>;

    /// lDAPDisplayName of the classSchema or attributeSchema object with this schemaIDGUID.
    fn schema_name(&self, schema_id: &Guid) -> Result<Option<String>, ArlinksError>;

    /// Whether display specifiers exist for this locale (hexadecimal LCID, e.g. "409").
    fn has_display_specifier_locale(&self, locale: &str) -> Result<bool, ArlinksError>;

    fn display_specifier(&self, locale: &str, ldap_name: &str) -> Result<Option<DisplaySpecifier>, ArlinksError>;

    /// displayName of the controlAccessRight with this rightsGuid.
    fn extended_right_name(&self, rights_guid: &Guid) -> Result<Option<String>, ArlinksError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Identity {
    DistinguishedName(String),
    Sid(Sid),
    Account {
        domain: String,
        name: String,
    },
    Name(String),
}

impl Identity {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.get(..4).map(|p| p.eq_ignore_ascii_case("S-1-")).unwrap_or(false) {
            if let Ok(sid) = Sid::try_from(input) {
                return Self::Sid(sid);
            }
        }
        // Escaped DN characters also use backslashes, so DNs are recognized before DOMAIN\name
        if looks_like_rdn(first_rdn(input)) {
            return Self::DistinguishedName(input.to_owned());
        }
        if let Some((domain, name)) = input.split_once('\\') {
            return Self::Account {
                domain: domain.to_owned(),
                name: name.to_owned(),
            };
        }
        Self::Name(input.to_owned())
    }

    /// Last component of the identity, for name-based lookups.
    pub fn short_name(&self) -> String {
        match self {
            Self::DistinguishedName(dn) => rdn_value(dn).to_owned(),
            Self::Sid(sid) => sid.to_string(),
            Self::Account { name, .. } => name.clone(),
            Self::Name(name) => name.clone(),
        }
    }
}

/// Value of the first RDN of a DN, e.g. "Helpdesk" for "CN=Helpdesk,OU=Groups,DC=corp".
pub(crate) fn rdn_value(dn: &str) -> &str {
    let first = first_rdn(dn);
    first.split_once('=').map(|(_, v)| v).unwrap_or(first)
}

/// Whether `s` is an `attributeType=value` pair, e.g. "OU=Sales\\, EMEA" or "1.2.840.113556.1.4.1=x".
pub(crate) fn looks_like_rdn(s: &str) -> bool {
    match s.trim().split_once('=') {
        Some((key, _)) => key.chars().next().map(|c| c.is_ascii_alphanumeric()).unwrap_or(false)
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.'),
        None => false,
    }
}

/// Text before the first unescaped comma.
pub(crate) fn first_rdn(dn: &str) -> &str {
    let bytes = dn.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b',' => return &dn[..i],
            _ => i += 1,
        }
    }
    dn
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_env_log::test;

    #[test]
    fn identity_forms() {
        assert_eq!(Identity::parse("CN=Helpdesk,OU=Groups,DC=corp,DC=local"), Identity::DistinguishedName("CN=Helpdesk,OU=Groups,DC=corp,DC=local".to_owned()));
        assert!(matches!(Identity::parse("S-1-5-21-1-2-3-1105"), Identity::Sid(_)));
        assert_eq!(Identity::parse(" CORP\\jdoe "), Identity::Account { domain: "CORP".to_owned(), name: "jdoe".to_owned() });
        assert_eq!(Identity::parse("Helpdesk"), Identity::Name("Helpdesk".to_owned()));
        // Not a valid SID, so treated as a plain name
        assert_eq!(Identity::parse("S-1-team"), Identity::Name("S-1-team".to_owned()));
    }

    #[test]
    fn escaped_dn_is_not_an_account() {
        assert_eq!(Identity::parse("CN=Smith\\, John,OU=Users,DC=corp,DC=local"),
            Identity::DistinguishedName("CN=Smith\\, John,OU=Users,DC=corp,DC=local".to_owned()));
        assert_eq!(Identity::parse("OU=Sales\\, EMEA,DC=corp,DC=local").short_name(), "Sales\\, EMEA");
        assert_eq!(Identity::parse("CORP\\svc=backup"), Identity::Account { domain: "CORP".to_owned(), name: "svc=backup".to_owned() });
        assert_eq!(Identity::parse("=Helpdesk"), Identity::Name("=Helpdesk".to_owned()));
    }

    #[test]
    fn rdn_detection() {
        assert!(looks_like_rdn("CN=Helpdesk"));
        assert!(looks_like_rdn(" ou=Sales\\, EMEA"));
        assert!(looks_like_rdn("1.2.840.113556.1.4.1=x"));
        assert!(!looks_like_rdn("Server Admins"));
        assert!(!looks_like_rdn("CORP\\a=b"));
        assert_eq!(first_rdn("OU=Sales\\, EMEA,DC=corp"), "OU=Sales\\, EMEA");
    }

    #[test]
    fn rdn_value_handles_escapes() {
        assert_eq!(rdn_value("CN=Smith\\, John,OU=Users,DC=corp"), "Smith\\, John");
        assert_eq!(Identity::parse("CN=User Management,CN=Access Templates,CN=Configuration").short_name(), "User Management");
        assert_eq!(rdn_value("Helpdesk"), "Helpdesk");
    }

    #[test]
    fn attribute_label_lookup() {
        let spec = DisplaySpecifier {
            class_display_name: Some("User".to_owned()),
            attribute_display_names: vec!["mail,E-mail Address".to_owned(), "telephoneNumber,Telephone Number".to_owned(), "garbage".to_owned()],
        };
        assert_eq!(spec.attribute_label("Mail"), Some("E-mail Address"));
        assert_eq!(spec.attribute_label("cn"), None);
    }
}
