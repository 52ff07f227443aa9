//! Directory backed by the administration service, reached over LDAP.

use std::convert::TryFrom;
use authz::{Guid, Sid};
use winldap::connection::LdapConnection;
use winldap::error::LdapError;
use winldap::filter::{escape_filter_bytes, escape_filter_value};
use winldap::search::{LdapEntry, LdapScope};
use crate::directory::{AccessTemplateLink, Directory, DirectoryObject, DisplaySpecifier, Identity, LinkFilter};
use crate::error::ArlinksError;

// Virtual containers published by the administration service
const ACCESS_TEMPLATES_CONTAINER: &str = "CN=Access Templates,CN=Configuration";
const LINKS_CONTAINER: &str = "CN=Access Template Links,CN=Configuration";
const DISPLAY_SPECIFIERS_CONTAINER: &str = "CN=Consolidated Display Specifiers,CN=Configuration";

const LINK_CLASS: &str = "edsACE";
const TEMPLATE_CLASS: &str = "edsAccessTemplate";
const ATTR_LINK_TRUSTEE: &str = "edsaTrusteeSID";
const ATTR_LINK_TEMPLATE: &str = "edsaAccessTemplateDN";
const ATTR_LINK_OBJECT: &str = "edsaDirectoryObjectDN";
const ATTR_ACE_LIST: &str = "edsaEffectiveACEList";

const OBJECT_ATTRIBUTES: [&str; 2] = ["distinguishedName", "objectSid"];

pub(crate) struct LdapDirectory {
    conn: LdapConnection,
}

fn entry_to_object(entry: &LdapEntry) -> Result<DirectoryObject, ArlinksError> {
    let sid = match entry.get_bytes("objectSid").first() {
        Some(bytes) => Some(Sid::from_bytes(bytes)?),
        None => None,
    };
    Ok(DirectoryObject {
        dn: entry.dn.clone(),
        sid,
    })
}

fn entry_to_link(entry: &LdapEntry) -> Result<AccessTemplateLink, ArlinksError> {
    let trustee = match entry.get_bytes(ATTR_LINK_TRUSTEE).first() {
        Some(bytes) => Sid::from_bytes(bytes)?,
        None => return Err(LdapError::RequiredAttributeMissing {
            dn: entry.dn.clone(),
            name: ATTR_LINK_TRUSTEE.to_owned(),
        }.into()),
    };
    Ok(AccessTemplateLink {
        dn: entry.dn.clone(),
        trustee,
        directory_object: entry.require_str(ATTR_LINK_OBJECT)?,
        access_template: entry.require_str(ATTR_LINK_TEMPLATE)?,
    })
}

impl LdapDirectory {
    pub fn connect(server: Option<&str>, port: u16) -> Result<Self, ArlinksError> {
        let conn = LdapConnection::new(server, port)?;
        log::info!("connected to {} (forest {})", conn.get_server(), conn.get_default_naming_context());
        Ok(Self { conn })
    }

    pub fn disconnect(&mut self) -> Result<(), ArlinksError> {
        Ok(self.conn.disconnect()?)
    }

    /// Returns the only entry matching, or an error naming all candidates.
    fn unique(&self, identity: &Identity, base: &str, filter: &str, attributes: &[&str]) -> Result<Option<LdapEntry>, ArlinksError> {
        let mut entries = self.conn.search(Some(base), LdapScope::Subtree, Some(filter), attributes)
            .collect::<Result<Vec<LdapEntry>, LdapError>>()?;
        if entries.len() > 1 {
            return Err(ArlinksError::AmbiguousIdentity {
                identity: identity.short_name(),
                candidates: entries.into_iter().map(|e| e.dn).collect(),
            });
        }
        Ok(entries.pop())
    }

    fn base_entry(&self, dn: &str, filter: &str, attributes: &[&str]) -> Result<Option<LdapEntry>, ArlinksError> {
        match self.conn.search_unique(Some(dn), LdapScope::Base, Some(filter), attributes) {
            Ok(entry) => Ok(entry),
            Err(e) if e.is_no_such_object() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn links(&self, filter: &str) -> Result<Vec<AccessTemplateLink>, ArlinksError> {
        let filter = format!("(&(objectClass={}){})", LINK_CLASS, filter);
        let mut links = Vec::new();
        for entry in self.conn.search(Some(LINKS_CONTAINER), LdapScope::Subtree, Some(&filter),
                                      &[ATTR_LINK_TRUSTEE, ATTR_LINK_TEMPLATE, ATTR_LINK_OBJECT]) {
            let entry = entry?;
            match entry_to_link(&entry) {
                Ok(link) => links.push(link),
                Err(e) => log::warn!("skipping malformed link {} : {}", entry.dn, e),
            }
        }
        Ok(links)
    }
}

impl Directory for LdapDirectory {
    fn find_object(&self, identity: &Identity) -> Result<Option<DirectoryObject>, ArlinksError> {
        let forest = self.conn.get_default_naming_context();
        let entry = match identity {
            Identity::DistinguishedName(dn) => self.base_entry(dn, "(objectClass=*)", &OBJECT_ATTRIBUTES)?,
            Identity::Sid(sid) => self.unique(identity, forest,
                &format!("(objectSid={})", escape_filter_bytes(sid.as_bytes())), &OBJECT_ATTRIBUTES)?,
            Identity::Account { domain, name } => {
                let candidates = self.conn.search(Some(forest), LdapScope::Subtree,
                        Some(&format!("(sAMAccountName={})", escape_filter_value(name))), &OBJECT_ATTRIBUTES)
                    .collect::<Result<Vec<LdapEntry>, LdapError>>()?;
                // The NetBIOS domain name is not published on objects, match it against the DN instead
                let domain_rdn = format!("dc={}", domain.to_ascii_lowercase());
                let mut matching: Vec<LdapEntry> = candidates.into_iter()
                    .filter(|e| e.dn.to_ascii_lowercase().split(',').any(|rdn| rdn.trim() == domain_rdn))
                    .collect();
                if matching.len() > 1 {
                    return Err(ArlinksError::AmbiguousIdentity {
                        identity: identity.short_name(),
                        candidates: matching.into_iter().map(|e| e.dn).collect(),
                    });
                }
                matching.pop()
            },
            Identity::Name(name) => {
                let value = escape_filter_value(name);
                self.unique(identity, forest, &format!("(|(sAMAccountName={v})(cn={v})(ou={v}))", v = value), &OBJECT_ATTRIBUTES)?
            },
        };
        entry.as_ref().map(entry_to_object).transpose()
    }

    fn find_access_template(&self, identity: &Identity) -> Result<Option<DirectoryObject>, ArlinksError> {
        let entry = match identity {
            Identity::DistinguishedName(dn) => self.base_entry(dn, &format!("(objectClass={})", TEMPLATE_CLASS), &["cn"])?,
            _ => self.unique(identity, ACCESS_TEMPLATES_CONTAINER,
                &format!("(&(objectClass={})(cn={}))", TEMPLATE_CLASS, escape_filter_value(&identity.short_name())), &["cn"])?,
        };
        Ok(entry.map(|e| DirectoryObject {
            dn: e.dn,
            sid: None,
        }))
    }

    fn find_object_by_sid(&self, sid: &Sid) -> Result<Option<DirectoryObject>, ArlinksError> {
        let filter = format!("(objectSid={})", escape_filter_bytes(sid.as_bytes()));
        let entry = self.conn.search(Some(self.conn.get_default_naming_context()), LdapScope::Subtree, Some(&filter), &OBJECT_ATTRIBUTES)
            .next()
            .transpose()?;
        entry.as_ref().map(entry_to_object).transpose()
    }

    fn enumerate_links(&self, filter: LinkFilter<'_>) -> Result<Vec<AccessTemplateLink>, ArlinksError> {
        let filter = match filter {
            LinkFilter::Trustee(sid) => format!("({}={})", ATTR_LINK_TRUSTEE, escape_filter_bytes(sid.as_bytes())),
            LinkFilter::DirectoryObject(dn) => format!("({}={})", ATTR_LINK_OBJECT, escape_filter_value(dn)),
            LinkFilter::AccessTemplate(dn) => format!("({}={})", ATTR_LINK_TEMPLATE, escape_filter_value(dn)),
        };
        self.links(&filter)
    }

    fn access_template_aces(&self, template_dn: &str) -> Result<Option<String>, ArlinksError> {
        match self.base_entry(template_dn, "(objectClass=*)", &[ATTR_ACE_LIST])? {
            Some(entry) => Ok(entry.get_str(ATTR_ACE_LIST)?),
            None => Ok(None),
        }
    }

    fn schema_name(&self, schema_id: &Guid) -> Result<Option<String>, ArlinksError> {
        let filter = format!("(schemaIDGUID={})", escape_filter_bytes(&schema_id.to_le_bytes()));
        match self.conn.search_unique(Some(self.conn.get_schema_naming_context()), LdapScope::Subtree, Some(&filter), &["lDAPDisplayName"])? {
            Some(entry) => Ok(entry.get_str("lDAPDisplayName")?),
            None => Ok(None),
        }
    }

    fn has_display_specifier_locale(&self, locale: &str) -> Result<bool, ArlinksError> {
        let dn = format!("CN={},{}", locale, DISPLAY_SPECIFIERS_CONTAINER);
        Ok(self.base_entry(&dn, "(objectClass=*)", &["cn"])?.is_some())
    }

    fn display_specifier(&self, locale: &str, ldap_name: &str) -> Result<Option<DisplaySpecifier>, ArlinksError> {
        let dn = format!("CN={}-Display,CN={},{}", ldap_name, locale, DISPLAY_SPECIFIERS_CONTAINER);
        Ok(self.base_entry(&dn, "(objectClass=*)", &["classDisplayName", "attributeDisplayNames"])?
            .map(|entry| DisplaySpecifier {
                class_display_name: entry.get_strs("classDisplayName").into_iter().next(),
                attribute_display_names: entry.get_strs("attributeDisplayNames"),
            }))
    }

    fn extended_right_name(&self, rights_guid: &Guid) -> Result<Option<String>, ArlinksError> {
        let base = format!("CN=Extended-Rights,{}", self.conn.get_configuration_naming_context());
        let filter = format!("(&(objectClass=controlAccessRight)(rightsGuid={}))", rights_guid);
        let entry = self.conn.search(Some(&base), LdapScope::Subtree, Some(&filter), &["rightsGuid", "displayName"])
            .next()
            .transpose()?;
        let entry = match entry {
            Some(e) => e,
            None => return Ok(None),
        };
        // rightsGuid is stored as a string, check it parses to what was asked for
        if let Some(stored) = entry.get_str("rightsGuid")? {
            if Guid::try_from(stored.as_str()).ok().as_ref() != Some(rights_guid) {
                log::warn!("{} has an unexpected rightsGuid \"{}\"", entry.dn, stored);
            }
        }
        Ok(entry.get_str("displayName")?)
    }
}
