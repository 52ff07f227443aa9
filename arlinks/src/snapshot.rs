//! Offline directory backed by a JSON export, for reporting without access to the
//! administration service. Expected layout:
//!
//! ```json
//! {
//!   "objects": [{ "dn": "CN=Helpdesk,OU=Groups,DC=corp,DC=local", "sid": "S-1-5-21-1-2-3-1105",
//!                 "sam_account_name": "Helpdesk", "domain": "CORP" }],
//!   "access_templates": [{ "dn": "CN=User Management,CN=Access Templates,CN=Configuration",
//!                          "ace_list": "[A;;RP;;;][A;;WP;bf967a86-...;;]" }],
//!   "links": [{ "trustee": "S-1-5-21-1-2-3-1105", "directory_object": "OU=Users,DC=corp,DC=local",
//!               "access_template": "CN=User Management,CN=Access Templates,CN=Configuration" }],
//!   "schema": { "bf967aba-0de6-11d0-a285-00aa003049e2": "user" },
//!   "display_specifiers": { "409": { "user": { "class_display_name": "User",
//!                                              "attribute_display_names": ["mail,E-mail Address"] } } },
//!   "extended_rights": { "00299570-246d-11d0-a768-00aa006e0529": "Reset Password" }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use authz::{Guid, Sid};
use serde::Deserialize;
use crate::directory::{AccessTemplateLink, Directory, DirectoryObject, DisplaySpecifier, Identity, LinkFilter, rdn_value};
use crate::error::ArlinksError;

#[derive(Debug, Clone, Deserialize)]
struct SnapshotObject {
    dn: String,
    #[serde(default)]
    sid: Option<Sid>,
    #[serde(default)]
    sam_account_name: Option<String>,
    #[serde(default)]
    domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SnapshotTemplate {
    dn: String,
    #[serde(default)]
    ace_list: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SnapshotDirectory {
    #[serde(default)]
    objects: Vec<SnapshotObject>,
    #[serde(default)]
    access_templates: Vec<SnapshotTemplate>,
    #[serde(default)]
    links: Vec<AccessTemplateLink>,
    #[serde(default)]
    schema: HashMap<Guid, String>,
    #[serde(default)]
    display_specifiers: HashMap<String, HashMap<String, DisplaySpecifier>>,
    #[serde(default)]
    extended_rights: HashMap<Guid, String>,
}

impl SnapshotObject {
    fn matches(&self, identity: &Identity) -> bool {
        match identity {
            Identity::DistinguishedName(dn) => self.dn.eq_ignore_ascii_case(dn),
            Identity::Sid(sid) => self.sid.as_ref() == Some(sid),
            Identity::Account { domain, name } => {
                self.sam_account_name.as_deref().map(|s| s.eq_ignore_ascii_case(name)).unwrap_or(false) &&
                    self.domain.as_deref().map(|d| d.eq_ignore_ascii_case(domain)).unwrap_or(true)
            },
            Identity::Name(name) => {
                self.sam_account_name.as_deref().map(|s| s.eq_ignore_ascii_case(name)).unwrap_or(false) ||
                    rdn_value(&self.dn).eq_ignore_ascii_case(name)
            },
        }
    }

    fn to_object(&self) -> DirectoryObject {
        DirectoryObject {
            dn: self.dn.clone(),
            sid: self.sid.clone(),
        }
    }
}

fn unique<'a, T: 'a>(identity: &Identity, candidates: impl Iterator<Item = &'a T>, dn: impl Fn(&T) -> &str) -> Result<Option<&'a T>, ArlinksError> {
    let found: Vec<&T> = candidates.collect();
    if found.len() > 1 {
        return Err(ArlinksError::AmbiguousIdentity {
            identity: identity.short_name(),
            candidates: found.iter().map(|c| dn(c).to_owned()).collect(),
        });
    }
    Ok(found.into_iter().next())
}

impl SnapshotDirectory {
    pub fn load(path: &Path) -> Result<Self, ArlinksError> {
        let json = std::fs::read_to_string(path).map_err(|e| ArlinksError::SnapshotUnreadable {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        let snapshot = Self::from_json(&json).map_err(|e| ArlinksError::SnapshotUnreadable {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        log::info!("loaded snapshot {} ({} objects, {} access templates, {} links)",
            path.display(), snapshot.objects.len(), snapshot.access_templates.len(), snapshot.links.len());
        Ok(snapshot)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Directory for SnapshotDirectory {
    fn find_object(&self, identity: &Identity) -> Result<Option<DirectoryObject>, ArlinksError> {
        let found = unique(identity, self.objects.iter().filter(|o| o.matches(identity)), |o| &o.dn)?;
        Ok(found.map(SnapshotObject::to_object))
    }

    fn find_access_template(&self, identity: &Identity) -> Result<Option<DirectoryObject>, ArlinksError> {
        let name = identity.short_name();
        let found = unique(identity, self.access_templates.iter().filter(|t| match identity {
            Identity::DistinguishedName(dn) => t.dn.eq_ignore_ascii_case(dn),
            _ => rdn_value(&t.dn).eq_ignore_ascii_case(&name),
        }), |t| &t.dn)?;
        Ok(found.map(|t| DirectoryObject {
            dn: t.dn.clone(),
            sid: None,
        }))
    }

    fn find_object_by_sid(&self, sid: &Sid) -> Result<Option<DirectoryObject>, ArlinksError> {
        Ok(self.objects.iter()
            .find(|o| o.sid.as_ref() == Some(sid))
            .map(SnapshotObject::to_object))
    }

    fn enumerate_links(&self, filter: LinkFilter<'_>) -> Result<Vec<AccessTemplateLink>, ArlinksError> {
        Ok(self.links.iter()
            .filter(|l| match filter {
                LinkFilter::Trustee(sid) => &l.trustee == sid,
                LinkFilter::DirectoryObject(dn) => l.directory_object.eq_ignore_ascii_case(dn),
                LinkFilter::AccessTemplate(dn) => l.access_template.eq_ignore_ascii_case(dn),
            })
            .cloned()
            .collect())
    }

    fn access_template_aces(&self, template_dn: &str) -> Result<Option<String>, ArlinksError> {
        Ok(self.access_templates.iter()
            .find(|t| t.dn.eq_ignore_ascii_case(template_dn))
            .and_then(|t| t.ace_list.clone()))
    }

    fn schema_name(&self, schema_id: &Guid) -> Result<Option<String>, ArlinksError> {
        Ok(self.schema.get(schema_id).cloned())
    }

    fn has_display_specifier_locale(&self, locale: &str) -> Result<bool, ArlinksError> {
        Ok(self.display_specifiers.keys().any(|k| k.eq_ignore_ascii_case(locale)))
    }

    fn display_specifier(&self, locale: &str, ldap_name: &str) -> Result<Option<DisplaySpecifier>, ArlinksError> {
        Ok(self.display_specifiers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(locale))
            .and_then(|(_, classes)| classes.iter().find(|(name, _)| name.eq_ignore_ascii_case(ldap_name)))
            .map(|(_, spec)| spec.clone()))
    }

    fn extended_right_name(&self, rights_guid: &Guid) -> Result<Option<String>, ArlinksError> {
        Ok(self.extended_rights.get(rights_guid).cloned())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::convert::TryFrom;
    use test_env_log::test;

    pub(crate) const HELPDESK_SID: &str = "S-1-5-21-1-2-3-1105";
    pub(crate) const USER_MANAGEMENT: &str = "CN=User Management,CN=Access Templates,CN=Configuration";
    pub(crate) const USERS_OU: &str = "OU=Users,DC=corp,DC=local";

    /// Small forest shared by the tests of every module.
    pub(crate) fn fixture() -> SnapshotDirectory {
        SnapshotDirectory::from_json(r#"{
            "objects": [
                { "dn": "CN=Helpdesk,OU=Groups,DC=corp,DC=local", "sid": "S-1-5-21-1-2-3-1105", "sam_account_name": "Helpdesk", "domain": "CORP" },
                { "dn": "CN=Server Admins,OU=Groups,DC=corp,DC=local", "sid": "S-1-5-21-1-2-3-1106", "sam_account_name": "ServerAdmins", "domain": "CORP" },
                { "dn": "CN=Nobody,OU=Users,DC=corp,DC=local", "sid": "S-1-5-21-1-2-3-1107", "sam_account_name": "nobody", "domain": "CORP" },
                { "dn": "OU=Users,DC=corp,DC=local" },
                { "dn": "OU=Servers,DC=corp,DC=local" },
                { "dn": "OU=Sales\\, EMEA,DC=corp,DC=local" }
            ],
            "access_templates": [
                { "dn": "CN=User Management,CN=Access Templates,CN=Configuration",
                  "ace_list": "D:[A;CI;RP;;bf967aba-0de6-11d0-a285-00aa003049e2;][A;CI;WP;bf967a86-0de6-11d0-a285-00aa003049e3;bf967aba-0de6-11d0-a285-00aa003049e2;][A;CI;CR;00299570-246d-11d0-a768-00aa006e0529;bf967aba-0de6-11d0-a285-00aa003049e2;]" },
                { "dn": "CN=Computer Management,CN=Access Templates,CN=Configuration",
                  "ace_list": "[A;CI;CCDC;bf967a86-0de6-11d0-a285-00aa003049e2;;][D;CI;SD;;;]" },
                { "dn": "CN=Broken,CN=Access Templates,CN=Configuration" }
            ],
            "links": [
                { "trustee": "S-1-5-21-1-2-3-1105", "directory_object": "OU=Users,DC=corp,DC=local", "access_template": "CN=User Management,CN=Access Templates,CN=Configuration" },
                { "trustee": "S-1-5-21-1-2-3-1106", "directory_object": "OU=Users,DC=corp,DC=local", "access_template": "CN=User Management,CN=Access Templates,CN=Configuration" },
                { "trustee": "S-1-5-21-1-2-3-1106", "directory_object": "OU=Servers,DC=corp,DC=local", "access_template": "CN=Computer Management,CN=Access Templates,CN=Configuration" },
                { "trustee": "S-1-5-21-9-9-9-500", "directory_object": "OU=Servers,DC=corp,DC=local", "access_template": "CN=Computer Management,CN=Access Templates,CN=Configuration" },
                { "trustee": "S-1-5-21-9-9-9-500", "directory_object": "OU=Sales\\, EMEA,DC=corp,DC=local", "access_template": "CN=Computer Management,CN=Access Templates,CN=Configuration" }
            ],
            "schema": {
                "bf967aba-0de6-11d0-a285-00aa003049e2": "user",
                "bf967a86-0de6-11d0-a285-00aa003049e2": "computer",
                "bf967a86-0de6-11d0-a285-00aa003049e3": "mail"
            },
            "display_specifiers": {
                "409": {
                    "user": { "class_display_name": "User", "attribute_display_names": ["mail,E-mail Address", "cn,Common Name"] },
                    "computer": { "class_display_name": "Computer" }
                },
                "40c": {
                    "user": { "class_display_name": "Utilisateur", "attribute_display_names": ["mail,Adresse de messagerie"] }
                }
            },
            "extended_rights": {
                "00299570-246d-11d0-a768-00aa006e0529": "Reset Password"
            }
        }"#).unwrap()
    }

    #[test]
    fn finds_objects_by_any_identity_form() {
        let dir = fixture();
        let by_name = dir.find_object(&Identity::parse("helpdesk")).unwrap().unwrap();
        let by_sid = dir.find_object(&Identity::parse(HELPDESK_SID)).unwrap().unwrap();
        let by_account = dir.find_object(&Identity::parse("CORP\\Helpdesk")).unwrap().unwrap();
        let by_dn = dir.find_object(&Identity::parse("cn=helpdesk,ou=groups,dc=corp,dc=local")).unwrap().unwrap();
        assert_eq!(by_name, by_sid);
        assert_eq!(by_account, by_dn);
        assert_eq!(by_name.dn, "CN=Helpdesk,OU=Groups,DC=corp,DC=local");
        assert!(dir.find_object(&Identity::parse("OTHER\\Helpdesk")).unwrap().is_none());
        assert!(dir.find_object(&Identity::parse("ghost")).unwrap().is_none());
    }

    #[test]
    fn finds_templates_by_name_or_dn() {
        let dir = fixture();
        let t = dir.find_access_template(&Identity::parse("user management")).unwrap().unwrap();
        assert_eq!(t.dn, USER_MANAGEMENT);
        assert!(dir.find_access_template(&Identity::parse(USER_MANAGEMENT)).unwrap().is_some());
    }

    #[test]
    fn links_filtered_along_each_axis() {
        let dir = fixture();
        let sid = Sid::try_from("S-1-5-21-1-2-3-1106").unwrap();
        assert_eq!(dir.enumerate_links(LinkFilter::Trustee(&sid)).unwrap().len(), 2);
        assert_eq!(dir.enumerate_links(LinkFilter::DirectoryObject("ou=users,dc=corp,dc=local")).unwrap().len(), 2);
        let links = dir.enumerate_links(LinkFilter::AccessTemplate(USER_MANAGEMENT)).unwrap();
        assert_eq!(links.iter().map(|l| l.trustee.to_string()).collect::<Vec<_>>(), vec![HELPDESK_SID, "S-1-5-21-1-2-3-1106"]);
    }

    #[test]
    fn ambiguous_name_is_reported() {
        let dir = SnapshotDirectory::from_json(r#"{ "objects": [ { "dn": "CN=Ops,OU=A,DC=x" }, { "dn": "CN=Ops,OU=B,DC=x" } ] }"#).unwrap();
        assert!(matches!(dir.find_object(&Identity::parse("Ops")), Err(ArlinksError::AmbiguousIdentity { .. })));
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(SnapshotDirectory::from_json(r#"{ "links": [ { "trustee": "nope" } ] }"#).is_err());
    }
}
