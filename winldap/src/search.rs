use crate::connection::LdapConnection;
use crate::error::LdapError;
use windows::Win32::Networking::Ldap::{LDAP_SUCCESS, LDAPMessage, ldap_first_entry, ldap_next_entry, ldap_memfree, ldap_get_dnW, ldap_msgfree, ldap_first_attributeW, ldap_get_values_lenW, ldap_next_attributeW, ldap_search_ext_sW, ldapcontrolW, LDAP_BERVAL, ldap_create_page_controlW, ldap_control_freeW, ldap_parse_resultW, ldap_parse_page_controlW, ber_bvfree, ldap_controls_freeW, LDAP_CONTROL_NOT_FOUND, LDAP_SCOPE_BASE, LDAP_SCOPE_SUBTREE};
use windows::Win32::Foundation::{PSTR, BOOLEAN};
use std::ptr::{null_mut, null};
use std::collections::HashMap;
use crate::utils::{pwstr_to_str, str_to_wstr};

const PAGE_SIZE: u32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LdapScope {
    Base,
    Subtree,
}

impl LdapScope {
    fn as_raw(self) -> u32 {
        match self {
            Self::Base => LDAP_SCOPE_BASE,
            Self::Subtree => LDAP_SCOPE_SUBTREE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LdapEntry {
    pub dn: String,
    /// Attribute values, keyed by lowercase attribute name
    pub attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl LdapEntry {
    pub fn get_bytes(&self, attr_name: &str) -> &[Vec<u8>] {
        self.attrs.get(&attr_name.to_lowercase()).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn get_strs(&self, attr_name: &str) -> Vec<String> {
        self.get_bytes(attr_name).iter()
            .map(|v| String::from_utf8_lossy(v).to_string())
            .collect()
    }

    /// Returns the only value of a single-valued attribute, if it is set.
    pub fn get_str(&self, attr_name: &str) -> Result<Option<String>, LdapError> {
        let mut strs = self.get_strs(attr_name);
        if strs.len() > 1 {
            return Err(LdapError::AttributeValuesCollision {
                dn: self.dn.clone(),
                name: attr_name.to_owned(),
                val1: strs.swap_remove(0),
                val2: strs.swap_remove(0),
            });
        }
        Ok(strs.pop())
    }

    pub fn require_str(&self, attr_name: &str) -> Result<String, LdapError> {
        self.get_str(attr_name)?.ok_or_else(|| LdapError::RequiredAttributeMissing {
            dn: self.dn.clone(),
            name: attr_name.to_owned(),
        })
    }
}

#[derive(Debug)]
pub struct LdapSearch<'a> {
    connection: &'a LdapConnection,
    base: Option<String>,
    scope: LdapScope,
    filter: Option<String>,
    attr_names: Option<Vec<String>>,
    attr_names_u16: Option<Vec<Vec<u16>>>,
    attr_names_ptrs: Option<Vec<*const u16>>,
    page_cookie: Vec<u8>,
    result_page: *mut LDAPMessage,
    cursor_entry: *mut LDAPMessage,
    // Set once an error has been returned, so that callers which .collect()
    // us do not loop on the same error forever.
    failed: bool,
}

impl<'a> LdapSearch<'a> {
    pub fn new(connection: &'a LdapConnection,
               base: Option<&str>,
               scope: LdapScope,
               filter: Option<&str>,
               only_attributes: Option<&[&str]>,
    ) -> Self {
        let mut res = Self {
            connection,
            base: base.map(|s| s.to_owned()),
            scope,
            filter: filter.map(|s| s.to_owned()),
            attr_names: only_attributes.map(|v| v.iter().map(|s| s.to_string()).collect()),
            attr_names_u16: only_attributes.map(|v| v.iter().map(|s| str_to_wstr(s)).collect()),
            attr_names_ptrs: None,
            page_cookie: vec![],
            result_page: null_mut(),
            cursor_entry: null_mut(),
            failed: false,
        };
        // Pointers are only taken once the wide strings sit in their final location
        if let Some(vec) = &res.attr_names_u16 {
            res.attr_names_ptrs = Some(vec.iter().map(|v| v.as_ptr()).chain(std::iter::once(null())).collect());
        }
        log::debug!("LDAP search base={:?} filter={:?} attributes={:?}", res.base, res.filter, res.attr_names);
        res
    }

    fn search_failed(&self, code: u32) -> LdapError {
        LdapError::SearchFailed {
            base: self.base.clone(),
            filter: self.filter.clone(),
            only_attributes: self.attr_names.clone(),
            code,
        }
    }

    // Sends the next paged query and keeps the cookie returned by the server
    fn fetch_page(&mut self) -> Result<(), LdapError> {
        let attr_names: *const *const u16 = self.attr_names_ptrs.as_ref().map(|v| v.as_ptr()).unwrap_or(null());

        let mut page_control: *mut ldapcontrolW = null_mut();
        let page_cookie = LDAP_BERVAL {
            bv_len: self.page_cookie.len() as u32,
            bv_val: PSTR(self.page_cookie.as_ptr() as *mut _),
        };
        let cookie_ptr = if self.page_cookie.is_empty() { null_mut() } else { &page_cookie as *const _ as *mut _ };
        let res = unsafe { ldap_create_page_controlW(self.connection.handle, PAGE_SIZE, cookie_ptr, 1, &mut page_control as *mut _) };
        if res != (LDAP_SUCCESS.0 as u32) {
            return Err(LdapError::ApiCallFailed { call: "ldap_create_page_controlW", code: res });
        }
        let server_controls_ptrs: [*const ldapcontrolW; 2] = [page_control as *const ldapcontrolW, null()];

        let scope = self.scope.as_raw();
        let res = unsafe {
            match (&self.base, &self.filter) {
                (Some(base), Some(filter)) => ldap_search_ext_sW(self.connection.handle, base.as_str(), scope, filter.as_str(), attr_names, 0, server_controls_ptrs.as_ptr(), null_mut(), null_mut(), 0, &mut self.result_page as *mut *mut LDAPMessage),
                (Some(base), None) => ldap_search_ext_sW(self.connection.handle, base.as_str(), scope, None, attr_names, 0, server_controls_ptrs.as_ptr(), null_mut(), null_mut(), 0, &mut self.result_page as *mut *mut LDAPMessage),
                (None, Some(filter)) => ldap_search_ext_sW(self.connection.handle, None, scope, filter.as_str(), attr_names, 0, server_controls_ptrs.as_ptr(), null_mut(), null_mut(), 0, &mut self.result_page as *mut *mut LDAPMessage),
                (None, None) => ldap_search_ext_sW(self.connection.handle, None, scope, None, attr_names, 0, server_controls_ptrs.as_ptr(), null_mut(), null_mut(), 0, &mut self.result_page as *mut *mut LDAPMessage),
            }
        };
        unsafe { ldap_control_freeW(page_control); }
        if res != (LDAP_SUCCESS.0 as u32) || self.result_page.is_null() {
            // Partial results and referrals still allocate a result page
            if !self.result_page.is_null() {
                unsafe { ldap_msgfree(self.result_page) };
                self.result_page = null_mut();
            }
            return Err(self.search_failed(res));
        }

        let mut response_controls: *mut *mut ldapcontrolW = null_mut();
        let res = unsafe { ldap_parse_resultW(self.connection.handle, self.result_page, null_mut(), null_mut(), null_mut(), null_mut(), &mut response_controls as *mut _, BOOLEAN(0)) };
        if res != (LDAP_SUCCESS.0 as u32) {
            return Err(LdapError::ApiCallFailed { call: "ldap_parse_resultW", code: res });
        }
        let mut cookie: *mut LDAP_BERVAL = null_mut();
        let res = unsafe { ldap_parse_page_controlW(self.connection.handle, response_controls, null_mut(), &mut cookie as *mut _) };
        if res == (LDAP_CONTROL_NOT_FOUND.0 as u32) {
            // No paging control in the response: this was the last page
            self.page_cookie = vec![];
        } else if res != (LDAP_SUCCESS.0 as u32) {
            unsafe { ldap_controls_freeW(response_controls); }
            return Err(LdapError::ApiCallFailed { call: "ldap_parse_page_controlW", code: res });
        } else {
            unsafe {
                self.page_cookie = std::slice::from_raw_parts((*cookie).bv_val.0 as *const u8, (*cookie).bv_len as usize).to_vec();
                ber_bvfree(cookie);
            }
        }
        unsafe { ldap_controls_freeW(response_controls); }

        self.cursor_entry = unsafe { ldap_first_entry(self.connection.handle, self.result_page) };
        if self.cursor_entry.is_null() && self.connection.get_errcode() != 0 {
            return Err(LdapError::ApiCallFailed { call: "ldap_first_entry", code: self.connection.get_errcode() });
        }
        Ok(())
    }

    // Copies the DN and attributes of the entry under the cursor, then advances the cursor
    fn read_entry(&mut self) -> Result<LdapEntry, LdapError> {
        let dn = unsafe {
            let ptr = ldap_get_dnW(self.connection.handle, self.cursor_entry);
            if ptr.is_null() {
                return Err(LdapError::ApiCallFailed { call: "ldap_get_dnW", code: self.connection.get_errcode() });
            }
            let dn = pwstr_to_str(ptr.0);
            ldap_memfree(PSTR(ptr.0 as *mut u8));
            dn
        };

        let mut attrs = HashMap::new();
        let mut cursor_attr = null_mut();
        let mut attr_name = unsafe { ldap_first_attributeW(self.connection.handle, self.cursor_entry, &mut cursor_attr as *mut _) };
        while !attr_name.is_null() {
            let name = pwstr_to_str(attr_name.0).to_lowercase();
            let mut values = Vec::new();

            let values_raw = unsafe { ldap_get_values_lenW(self.connection.handle, self.cursor_entry, attr_name) };
            if values_raw.is_null() {
                // NULL means either "no value" or an error, only the connection knows
                if self.connection.get_errcode() != 0 {
                    return Err(LdapError::AttributeReadFailed {
                        dn,
                        name: Some(name),
                        code: self.connection.get_errcode(),
                    });
                }
            } else {
                for value_idx in 0isize.. {
                    let value_raw = unsafe { *(values_raw.offset(value_idx)) };
                    if value_raw.is_null() {
                        break;
                    }
                    let slice = unsafe { std::slice::from_raw_parts((*value_raw).bv_val.0 as *const u8, (*value_raw).bv_len as usize) };
                    values.push(slice.to_vec());
                }
            }
            unsafe { ldap_memfree(PSTR(attr_name.0 as *mut u8)); }

            if attrs.contains_key(&name) {
                return Err(LdapError::AttributeReturnedTwice { dn, name });
            }
            attrs.insert(name, values);
            attr_name = unsafe { ldap_next_attributeW(self.connection.handle, self.cursor_entry, cursor_attr) };
        }
        if self.connection.get_errcode() != 0 {
            return Err(LdapError::AttributeReadFailed {
                dn,
                name: None,
                code: self.connection.get_errcode(),
            });
        }

        self.cursor_entry = unsafe { ldap_next_entry(self.connection.handle, self.cursor_entry) };
        if self.connection.get_errcode() != 0 {
            return Err(LdapError::ApiCallFailed { call: "ldap_next_entry", code: self.connection.get_errcode() });
        }

        Ok(LdapEntry { dn, attrs })
    }
}

impl Drop for LdapSearch<'_> {
    fn drop(&mut self) {
        if !self.result_page.is_null() {
            unsafe { ldap_msgfree(self.result_page) };
            self.result_page = null_mut();
        }
    }
}

impl<'a> Iterator for LdapSearch<'a> {
    type Item = Result<LdapEntry, LdapError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while self.cursor_entry.is_null() {
            if !self.result_page.is_null() {
                // Page exhausted. Without a cookie, there is nothing left to fetch; keep the
                // page allocated so that subsequent calls land here again.
                if self.page_cookie.is_empty() {
                    return None;
                }
                unsafe { ldap_msgfree(self.result_page) };
                self.result_page = null_mut();
            }
            if let Err(e) = self.fetch_page() {
                self.failed = true;
                return Some(Err(e));
            }
        }
        let res = self.read_entry();
        if res.is_err() {
            self.failed = true;
        }
        Some(res)
    }
}
