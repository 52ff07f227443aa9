use core::ptr::null_mut;
use crate::error::LdapError;
use windows::Win32::Foundation::PWSTR;
use windows::Win32::Networking::Ldap::{ldap_initW, ldap_unbind, ldap_connect, LDAP_TIMEVAL, LDAP_SUCCESS, ldap_bind_sW, ldap};
use crate::utils::get_ldap_errcode;
use crate::search::{LdapSearch, LdapEntry, LdapScope};

const LDAP_AUTH_NEGOTIATE: u32 = 1158;
const ROOT_DSE: &str = "(rootDSE)";

#[derive(Debug)]
pub struct LdapConnection {
    pub(crate) handle: *mut ldap,
    server: String,
    default_naming_context: String,
    configuration_naming_context: String,
    schema_naming_context: String,
}

impl LdapConnection {
    /// Connects and binds with the identity of the current process (no explicit credentials).
    pub fn new(server: Option<&str>, port: u16) -> Result<Self, LdapError> {
        let handle = unsafe {
            if let Some(server) = server {
                ldap_initW(server, port as u32)
            } else {
                ldap_initW(None, port as u32)
            }
        };
        if handle.is_null() {
            return Err(LdapError::ConnectionFailed(get_ldap_errcode()));
        }

        // The actual connection timeout is much higher than that, since underlying
        // layers must fail before this timeout even starts: DNS, maybe mDNS, maybe
        // NBNS, etc.
        let mut timeout = LDAP_TIMEVAL {
            tv_sec: 2,
            tv_usec: 0,
        };
        let res = unsafe { ldap_connect(handle, &mut timeout) };
        if res != (LDAP_SUCCESS.0 as u32) {
            let code = get_ldap_errcode();
            unsafe { ldap_unbind(handle); }
            return Err(LdapError::ConnectionFailed(code));
        }

        let res = unsafe { ldap_bind_sW(handle, None, PWSTR(null_mut()), LDAP_AUTH_NEGOTIATE) };
        if res != (LDAP_SUCCESS.0 as u32) {
            let code = get_ldap_errcode();
            unsafe { ldap_unbind(handle); }
            return Err(LdapError::BindFailed(code));
        }

        // From here on, dropping conn unbinds
        let mut conn = Self {
            handle,
            server: server.unwrap_or("(default)").to_owned(),
            default_naming_context: String::new(),
            configuration_naming_context: String::new(),
            schema_naming_context: String::new(),
        };

        let rootdse = conn.search_unique(None, LdapScope::Base, None, &["defaultNamingContext", "configurationNamingContext", "schemaNamingContext"])?
            .ok_or_else(|| LdapError::RequiredObjectMissing { dn: ROOT_DSE.to_owned() })?;
        conn.default_naming_context = rootdse.require_str("defaultNamingContext")?;
        conn.configuration_naming_context = rootdse.require_str("configurationNamingContext")?;
        conn.schema_naming_context = rootdse.require_str("schemaNamingContext")?;
        log::info!("connected to {} (default naming context {})", conn.server, conn.default_naming_context);

        Ok(conn)
    }

    pub fn get_errcode(&self) -> u32 {
        unsafe { (*self.handle).ld_errno }
    }

    pub fn get_server(&self) -> &str {
        &self.server
    }

    pub fn get_default_naming_context(&self) -> &str {
        &self.default_naming_context
    }

    pub fn get_configuration_naming_context(&self) -> &str {
        &self.configuration_naming_context
    }

    pub fn get_schema_naming_context(&self) -> &str {
        &self.schema_naming_context
    }

    pub fn search<'a>(&'a self, base: Option<&str>, scope: LdapScope, filter: Option<&str>, only_attributes: &[&str]) -> LdapSearch<'a> {
        LdapSearch::new(self, base, scope, filter, Some(only_attributes))
    }

    /// Runs a search expected to return at most one entry.
    pub fn search_unique(&self, base: Option<&str>, scope: LdapScope, filter: Option<&str>, only_attributes: &[&str]) -> Result<Option<LdapEntry>, LdapError> {
        let mut entries = self.search(base, scope, filter, only_attributes)
            .collect::<Result<Vec<LdapEntry>, LdapError>>()?;
        if entries.len() > 1 {
            return Err(LdapError::RequiredObjectCollision {
                dn: format!("{} {}", base.unwrap_or(ROOT_DSE), filter.unwrap_or("")),
            });
        }
        Ok(entries.pop())
    }

    /// Unbinds. Safe to call more than once; `Drop` calls it too.
    pub fn disconnect(&mut self) -> Result<(), LdapError> {
        if self.handle.is_null() {
            return Ok(());
        }
        let res = unsafe { ldap_unbind(self.handle) };
        self.handle = null_mut();
        if res != LDAP_SUCCESS.0 as u32 {
            return Err(LdapError::UnbindFailed(get_ldap_errcode()));
        }
        log::debug!("disconnected from {}", self.server);
        Ok(())
    }
}

impl Drop for LdapConnection {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}
