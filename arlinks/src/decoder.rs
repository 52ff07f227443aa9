use authz::{AceEffect, AceToken, GuidField, bracketed_tokens};
use crate::error::ArlinksError;
use crate::names::NameResolver;

const ALL_CLASSES: &str = "All Classes";

/// How a rights code reads once decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RightsDescription {
    Fixed(&'static str),
    /// `{verb} {attribute or all} {suffix}`, the attribute coming from the ACE object type
    Templated {
        verb: &'static str,
        all: &'static str,
        suffix: &'static str,
    },
    /// Name of the extended right or validated write in the ACE object type, or `all`
    ExtendedRight {
        all: &'static str,
    },
}

use RightsDescription::{ExtendedRight, Fixed, Templated};

static RIGHTS_TABLE: &[(&str, RightsDescription)] = &[
    ("CCDCLCSWRPWPDTLOCRCOSDRCWDWO", Fixed("Full Control")),
    ("RP", Templated { verb: "Read", all: "All Properties", suffix: "" }),
    ("WP", Templated { verb: "Write", all: "All Properties", suffix: "" }),
    ("RPWP", Templated { verb: "Read/Write", all: "All Properties", suffix: "" }),
    ("CC", Templated { verb: "Create", all: "All Child", suffix: " Objects" }),
    ("DC", Templated { verb: "Delete", all: "All Child", suffix: " Objects" }),
    ("CCDC", Templated { verb: "Create/Delete", all: "All Child", suffix: " Objects" }),
    ("MT", Templated { verb: "Move", all: "All Child", suffix: " into this container" }),
    ("SD", Fixed("Delete")),
    ("DT", Fixed("Delete Tree")),
    ("RC", Fixed("Read Control")),
    ("WD", Fixed("Write Control")),
    ("RCWD", Fixed("Read/Write Control")),
    ("LC", Fixed("List Contents")),
    ("LO", Fixed("List")),
    ("CO", Fixed("Copy")),
    ("MF", Fixed("Move Out")),
    ("CR", ExtendedRight { all: "All Extended Rights" }),
    ("SW", ExtendedRight { all: "All Validated Writes" }),
];

fn describe_rights(code: &str) -> Option<RightsDescription> {
    RIGHTS_TABLE.iter()
        .find(|(c, _)| *c == code)
        .map(|(_, d)| *d)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodedPermission {
    pub effect: AceEffect,
    pub permissions: String,
    pub apply_to: String,
}

/// Outcome of decoding one bracketed ACE of an effective ACE list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DecodedAce {
    Permission(DecodedPermission),
    Failed {
        token: String,
        reason: String,
    },
}

impl DecodedAce {
    pub fn permission(&self) -> Option<&DecodedPermission> {
        match self {
            Self::Permission(p) => Some(p),
            Self::Failed { .. } => None,
        }
    }
}

fn describe(ace: &AceToken, names: &mut NameResolver<'_>) -> Result<String, ArlinksError> {
    let description = match describe_rights(&ace.rights) {
        Some(d) => d,
        None => {
            log::debug!("unrecognized rights code \"{}\"", ace.rights);
            return Ok(String::new());
        },
    };
    let text = match description {
        Fixed(text) => text.to_owned(),
        Templated { verb, all, suffix } => {
            let target = match &ace.object_type {
                GuidField::Guid(attribute) => names.attribute_display_name(attribute, ace.inherited_object_type.guid())?,
                GuidField::Malformed(value) => malformed(value),
                GuidField::Empty => all.to_owned(),
            };
            format!("{} {}{}", verb, target, suffix)
        },
        ExtendedRight { all } => match &ace.object_type {
            GuidField::Guid(right) => names.extended_right_name(right)?,
            GuidField::Malformed(value) => malformed(value),
            GuidField::Empty => all.to_owned(),
        },
    };
    Ok(text)
}

fn apply_to(class_id: &GuidField, names: &mut NameResolver<'_>) -> Result<String, ArlinksError> {
    match class_id {
        GuidField::Guid(class_id) => names.class_display_name(class_id),
        GuidField::Malformed(value) => Ok(malformed(value)),
        GuidField::Empty => Ok(ALL_CLASSES.to_owned()),
    }
}

/// A GUID field which does not parse is shown as written, the rest of the ACE still decodes.
fn malformed(value: &str) -> String {
    log::warn!("ACE field \"{}\" is not a GUID, shown as is", value);
    value.to_owned()
}

/// Decodes the inside of one bracketed ACE.
pub(crate) fn decode_token(token: &str, names: &mut NameResolver<'_>) -> Result<DecodedPermission, ArlinksError> {
    let ace = AceToken::parse(token)?;
    Ok(DecodedPermission {
        permissions: describe(&ace, names)?,
        apply_to: apply_to(&ace.inherited_object_type, names)?,
        effect: ace.effect,
    })
}

/// Decodes every ACE of an effective ACE list, in order. An ACE which cannot be decoded
/// yields a `Failed` entry and does not stop the others from being decoded.
pub(crate) fn decode_ace_list(ace_list: &str, names: &mut NameResolver<'_>) -> Vec<DecodedAce> {
    bracketed_tokens(ace_list)
        .map(|token| match decode_token(token, names) {
            Ok(p) => DecodedAce::Permission(p),
            Err(e) => {
                log::warn!("unable to decode ACE [{}] : {}", token, e);
                DecodedAce::Failed {
                    token: token.to_owned(),
                    reason: e.to_string(),
                }
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_env_log::test;
    use crate::directory::Directory;
    use crate::snapshot::tests::{fixture, USER_MANAGEMENT};

    const USER: &str = "bf967aba-0de6-11d0-a285-00aa003049e2";
    const MAIL: &str = "bf967a86-0de6-11d0-a285-00aa003049e3";

    fn decode_one(token: &str) -> DecodedPermission {
        let dir = fixture();
        let mut names = NameResolver::new(&dir, None).unwrap();
        decode_token(token, &mut names).unwrap()
    }

    #[test]
    fn every_code_without_guid_has_its_literal() {
        let expected = [
            ("CCDCLCSWRPWPDTLOCRCOSDRCWDWO", "Full Control"),
            ("RP", "Read All Properties"),
            ("WP", "Write All Properties"),
            ("RPWP", "Read/Write All Properties"),
            ("CC", "Create All Child Objects"),
            ("DC", "Delete All Child Objects"),
            ("CCDC", "Create/Delete All Child Objects"),
            ("MT", "Move All Child into this container"),
            ("SD", "Delete"),
            ("DT", "Delete Tree"),
            ("RC", "Read Control"),
            ("WD", "Write Control"),
            ("RCWD", "Read/Write Control"),
            ("LC", "List Contents"),
            ("LO", "List"),
            ("CO", "Copy"),
            ("MF", "Move Out"),
            ("CR", "All Extended Rights"),
            ("SW", "All Validated Writes"),
        ];
        assert_eq!(expected.len(), RIGHTS_TABLE.len());
        for (code, text) in expected {
            let p = decode_one(&format!("A;;{};;;", code));
            assert_eq!(p.permissions, text, "code {}", code);
            assert_eq!(p.apply_to, "All Classes");
        }
    }

    #[test]
    fn effects() {
        assert_eq!(decode_one("A;;SD;;;").effect.to_string(), "Allow");
        assert_eq!(decode_one("D;;SD;;;").effect.to_string(), "Deny");
        assert_eq!(decode_one("OA;;SD;;;").effect.to_string(), "");
    }

    #[test]
    fn unknown_code_degrades_to_empty_text() {
        let p = decode_one("A;;GA;;;");
        assert_eq!(p.permissions, "");
        assert_eq!(p.effect, AceEffect::Allow);
    }

    #[test]
    fn attribute_guid_is_resolved() {
        assert_eq!(decode_one(&format!("A;;RP;{};;", MAIL)).permissions, "Read mail");
        assert_eq!(decode_one(&format!("A;;RPWP;{};{};", MAIL, USER)).permissions, "Read/Write E-mail Address");
        assert_eq!(decode_one("A;;CC;bf967a86-0de6-11d0-a285-00aa003049e2;;").permissions, "Create Computer Objects");
    }

    #[test]
    fn class_guid_sets_apply_to() {
        assert_eq!(decode_one("A;;LC;;;").apply_to, "All Classes");
        assert_eq!(decode_one(&format!("A;;LC;;{};", USER)).apply_to, "User");
    }

    #[test]
    fn extended_rights_are_resolved() {
        assert_eq!(decode_one("A;;CR;00299570-246d-11d0-a768-00aa006e0529;;").permissions, "Reset Password");
        assert_eq!(decode_one("A;;SW;11111111-2222-3333-4444-555555555555;;").permissions,
            "Unknown extended right 11111111-2222-3333-4444-555555555555");
    }

    #[test]
    fn decodes_n_tokens_in_order() {
        let dir = fixture();
        let mut names = NameResolver::new(&dir, None).unwrap();
        let codes = ["SD", "RC", "LC", "LO", "DT", "WD", "CO"];
        let list: String = codes.iter().map(|c| format!("[A;;{};;;]", c)).collect();
        let decoded = decode_ace_list(&list, &mut names);
        let texts: Vec<&str> = decoded.iter().map(|d| d.permission().unwrap().permissions.as_str()).collect();
        assert_eq!(texts, vec!["Delete", "Read Control", "List Contents", "List", "Delete Tree", "Write Control", "Copy"]);
    }

    #[test]
    fn decoding_twice_is_identical() {
        let dir = fixture();
        let list = dir.access_template_aces(USER_MANAGEMENT).unwrap().unwrap();
        let mut names = NameResolver::new(&dir, None).unwrap();
        let first = decode_ace_list(&list, &mut names);
        let second = decode_ace_list(&list, &mut names);
        assert_eq!(first, second);
        let mut fresh = NameResolver::new(&dir, None).unwrap();
        assert_eq!(first, decode_ace_list(&list, &mut fresh));
        assert_eq!(first.iter().map(|d| d.permission().unwrap().permissions.as_str()).collect::<Vec<_>>(),
            vec!["Read All Properties", "Write E-mail Address", "Reset Password"]);
    }

    #[test]
    fn malformed_tokens_fail_without_stopping_the_rest() {
        let dir = fixture();
        let mut names = NameResolver::new(&dir, None).unwrap();
        let decoded = decode_ace_list("[A;;RC;;;][A;][D;;RP;not-a-guid;;][D;;SD;;;]", &mut names);
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0].permission().unwrap().permissions, "Read Control");
        assert!(matches!(&decoded[1], DecodedAce::Failed { token, .. } if token == "A;"));
        assert_eq!(decoded[2].permission().unwrap().permissions, "Read not-a-guid");
        assert_eq!(decoded[3].permission().unwrap().permissions, "Delete");
    }

    #[test]
    fn malformed_guid_only_degrades_its_field() {
        let dir = fixture();
        let mut names = NameResolver::new(&dir, None).unwrap();
        let bad_object = decode_token("D;CI;RP;not-a-guid;bf967aba-0de6-11d0-a285-00aa003049e2;", &mut names).unwrap();
        assert_eq!(bad_object, DecodedPermission {
            effect: AceEffect::Deny,
            permissions: "Read not-a-guid".to_owned(),
            apply_to: "User".to_owned(),
        });
        let bad_class = decode_token("A;CI;CCDC;bf967a86-0de6-11d0-a285-00aa003049e2;{oops};", &mut names).unwrap();
        assert_eq!(bad_class.effect, AceEffect::Allow);
        assert_eq!(bad_class.permissions, "Create/Delete Computer Objects");
        assert_eq!(bad_class.apply_to, "{oops}");
        let bad_right = decode_token("A;;CR;12345;;", &mut names).unwrap();
        assert_eq!(bad_right.permissions, "12345");
        assert_eq!(bad_right.apply_to, ALL_CLASSES);
    }
}
