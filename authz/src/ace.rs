use core::fmt::{Display, Formatter};
use std::convert::TryFrom;
use crate::error::AuthzError;
use crate::Guid;

const FIELD_EFFECT: usize = 0;
const FIELD_RIGHTS: usize = 2;
const FIELD_OBJECT_TYPE: usize = 3;
const FIELD_INHERITED_OBJECT_TYPE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AceEffect {
    Allow,
    Deny,
    Other(String),
}

impl From<&str> for AceEffect {
    fn from(s: &str) -> Self {
        match s {
            "A" => Self::Allow,
            "D" => Self::Deny,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl Display for AceEffect {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Allow => f.write_str("Allow"),
            Self::Deny => f.write_str("Deny"),
            Self::Other(_) => Ok(()),
        }
    }
}

/// Optional GUID field of an ACE. A value which is not a GUID is kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GuidField {
    Empty,
    Guid(Guid),
    Malformed(String),
}

impl GuidField {
    fn parse(field: Option<&str>) -> Self {
        match field.map(str::trim) {
            None | Some("") => Self::Empty,
            Some(value) => match Guid::try_from(value) {
                Ok(guid) => Self::Guid(guid),
                Err(_) => Self::Malformed(value.to_owned()),
            },
        }
    }

    pub fn guid(&self) -> Option<&Guid> {
        match self {
            Self::Guid(guid) => Some(guid),
            _ => None,
        }
    }
}

/// One entry of an effective ACE list, in its textual `effect;flags;rights;object;inherited_object` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AceToken {
    pub effect: AceEffect,
    pub rights: String,
    /// Attribute, property set, extended right or child class the rights apply to
    pub object_type: GuidField,
    /// Class of the objects this ACE applies to
    pub inherited_object_type: GuidField,
}

impl AceToken {
    /// Parses the inside of one bracketed group (brackets already removed).
    pub fn parse(token: &str) -> Result<Self, AuthzError> {
        let fields: Vec<&str> = token.split(';').collect();
        if fields.len() <= FIELD_RIGHTS {
            return Err(AuthzError::MissingAceFields {
                token: token.to_owned(),
                field_count: fields.len(),
            });
        }
        Ok(Self {
            effect: AceEffect::from(fields[FIELD_EFFECT].trim()),
            rights: fields[FIELD_RIGHTS].trim().to_owned(),
            object_type: GuidField::parse(fields.get(FIELD_OBJECT_TYPE).copied()),
            inherited_object_type: GuidField::parse(fields.get(FIELD_INHERITED_OBJECT_TYPE).copied()),
        })
    }
}

/// Iterates over the bracketed groups of an effective ACE list, yielding each group
/// without its opening and closing bracket. Groups do not nest: a group ends at the
/// first `]` following its `[`, and an unterminated trailing group is ignored.
pub fn bracketed_tokens(ace_list: &str) -> impl Iterator<Item = &str> {
    let mut rest = ace_list;
    std::iter::from_fn(move || {
        let start = rest.find('[')?;
        let len = rest[start..].find(']')?;
        let token = &rest[start + 1..start + len];
        rest = &rest[start + len + 1..];
        Some(token)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_env_log::test;

    #[test]
    fn extracts_groups_in_order() {
        let list = "O:DAG:DAD:[A;;RP;;;][D;;SD;;][A;CI;CCDC;bf967aba-0de6-11d0-a285-00aa003049e2;;]";
        let tokens: Vec<&str> = bracketed_tokens(list).collect();
        assert_eq!(tokens, vec!["A;;RP;;;", "D;;SD;;", "A;CI;CCDC;bf967aba-0de6-11d0-a285-00aa003049e2;;"]);
    }

    #[test]
    fn unterminated_group_is_ignored() {
        let tokens: Vec<&str> = bracketed_tokens("[A;;LC;;][A;;RC").collect();
        assert_eq!(tokens, vec!["A;;LC;;"]);
        assert_eq!(bracketed_tokens("no groups here").count(), 0);
    }

    #[test]
    fn parses_fields() {
        let ace = AceToken::parse("A;CI;WP;bf967a86-0de6-11d0-a285-00aa003049e2;bf967aba-0de6-11d0-a285-00aa003049e2;S-1-5-10").unwrap();
        assert_eq!(ace.effect, AceEffect::Allow);
        assert_eq!(ace.rights, "WP");
        assert_eq!(ace.object_type.guid().unwrap().to_string(), "bf967a86-0de6-11d0-a285-00aa003049e2");
        assert_eq!(ace.inherited_object_type.guid().unwrap().to_string(), "bf967aba-0de6-11d0-a285-00aa003049e2");
    }

    #[test]
    fn optional_fields_may_be_missing() {
        let ace = AceToken::parse("D;;SD").unwrap();
        assert_eq!(ace.effect, AceEffect::Deny);
        assert_eq!(ace.object_type, GuidField::Empty);
        assert_eq!(ace.inherited_object_type, GuidField::Empty);
    }

    #[test]
    fn too_few_fields_is_an_error() {
        assert_eq!(AceToken::parse("A;"), Err(AuthzError::MissingAceFields { token: "A;".to_owned(), field_count: 2 }));
        assert!(AceToken::parse("").is_err());
    }

    #[test]
    fn bad_guid_is_kept_as_text() {
        let ace = AceToken::parse("A;;RP; mail ;bf967aba-0de6-11d0-a285-00aa003049e2;").unwrap();
        assert_eq!(ace.effect, AceEffect::Allow);
        assert_eq!(ace.rights, "RP");
        assert_eq!(ace.object_type, GuidField::Malformed("mail".to_owned()));
        assert_eq!(ace.object_type.guid(), None);
        assert!(ace.inherited_object_type.guid().is_some());
    }

    #[test]
    fn unknown_effect_displays_blank() {
        let ace = AceToken::parse("AU;;RP;;").unwrap();
        assert_eq!(ace.effect, AceEffect::Other("AU".to_owned()));
        assert_eq!(ace.effect.to_string(), "");
    }
}
