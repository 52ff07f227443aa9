use std::collections::HashMap;
use authz::Guid;
use crate::directory::{Directory, DisplaySpecifier};
use crate::error::ArlinksError;

/// Locale whose display specifiers are always installed (English, United States).
pub(crate) const DEFAULT_LOCALE: &str = "409";

/// Turns schema and extended right GUIDs into the labels shown by the administration
/// console. Lookups are memoized for the lifetime of the resolver (one report run).
pub(crate) struct NameResolver<'a> {
    directory: &'a dyn Directory,
    locale: String,
    schema_names: HashMap<Guid, Option<String>>,
    display_specifiers: HashMap<(String, String), Option<DisplaySpecifier>>,
    extended_rights: HashMap<Guid, String>,
}

impl<'a> NameResolver<'a> {
    /// `client_locale` is the LCID to prefer when locale-aware display names are requested.
    /// Without display specifiers for that locale, the default locale is used.
    pub fn new(directory: &'a dyn Directory, client_locale: Option<u32>) -> Result<Self, ArlinksError> {
        let locale = match client_locale {
            Some(lcid) => {
                let locale = format!("{:x}", lcid);
                if directory.has_display_specifier_locale(&locale)? {
                    locale
                } else {
                    log::info!("no display specifiers for locale {}, falling back to {}", locale, DEFAULT_LOCALE);
                    DEFAULT_LOCALE.to_owned()
                }
            },
            None => DEFAULT_LOCALE.to_owned(),
        };
        log::debug!("using display specifiers of locale {}", locale);
        Ok(Self {
            directory,
            locale,
            schema_names: HashMap::new(),
            display_specifiers: HashMap::new(),
            extended_rights: HashMap::new(),
        })
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    fn schema_name(&mut self, schema_id: &Guid) -> Result<Option<String>, ArlinksError> {
        if let Some(name) = self.schema_names.get(schema_id) {
            return Ok(name.clone());
        }
        let name = self.directory.schema_name(schema_id)?;
        if name.is_none() {
            log::warn!("schema object {} not found", schema_id);
        }
        self.schema_names.insert(*schema_id, name.clone());
        Ok(name)
    }

    fn display_specifier(&mut self, ldap_name: &str) -> Result<Option<&DisplaySpecifier>, ArlinksError> {
        let key = (self.locale.clone(), ldap_name.to_ascii_lowercase());
        if !self.display_specifiers.contains_key(&key) {
            let spec = self.directory.display_specifier(&self.locale, ldap_name)?;
            self.display_specifiers.insert(key.clone(), spec);
        }
        Ok(self.display_specifiers.get(&key).and_then(|s| s.as_ref()))
    }

    /// classDisplayName of a schema class, else its lDAPDisplayName, else the GUID itself.
    pub fn class_display_name(&mut self, class_id: &Guid) -> Result<String, ArlinksError> {
        let ldap_name = match self.schema_name(class_id)? {
            Some(n) => n,
            None => return Ok(class_id.to_string()),
        };
        let display_name = self.display_specifier(&ldap_name)?
            .and_then(|spec| spec.class_display_name.clone());
        Ok(display_name.unwrap_or(ldap_name))
    }

    /// Label of an attribute, as displayed on objects of class `class_id` when given.
    pub fn attribute_display_name(&mut self, attribute_id: &Guid, class_id: Option<&Guid>) -> Result<String, ArlinksError> {
        let attribute_name = self.class_display_name(attribute_id)?;
        let class_id = match class_id {
            Some(c) => c,
            None => return Ok(attribute_name),
        };
        let class_name = match self.schema_name(class_id)? {
            Some(n) => n,
            None => return Ok(attribute_name),
        };
        let label = self.display_specifier(&class_name)?
            .and_then(|spec| spec.attribute_label(&attribute_name))
            .map(|l| l.to_owned());
        Ok(label.unwrap_or(attribute_name))
    }

    /// displayName of an extended right or validated write. Unregistered rights
    /// get a placeholder naming the GUID.
    pub fn extended_right_name(&mut self, rights_guid: &Guid) -> Result<String, ArlinksError> {
        if let Some(name) = self.extended_rights.get(rights_guid) {
            return Ok(name.clone());
        }
        let name = match self.directory.extended_right_name(rights_guid)? {
            Some(n) => n,
            None => {
                log::warn!("extended right {} is not registered", rights_guid);
                format!("Unknown extended right {}", rights_guid)
            },
        };
        self.extended_rights.insert(*rights_guid, name.clone());
        Ok(name)
    }
}
