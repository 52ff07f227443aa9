use core::fmt::{Display, Formatter};
use std::path::PathBuf;
use authz::AuthzError;
#[cfg(windows)]
use winldap::error::LdapError;

#[derive(Debug)]
pub(crate) enum ArlinksError {
    #[cfg(windows)]
    Ldap(LdapError),
    Authz(AuthzError),
    Io(std::io::Error),
    Csv(csv::Error),
    SnapshotUnreadable {
        path: PathBuf,
        reason: String,
    },
    ObjectNotFound {
        kind: &'static str,
        identity: String,
    },
    AmbiguousIdentity {
        identity: String,
        candidates: Vec<String>,
    },
    NotATrustee {
        dn: String,
    },
    AceListMissing {
        template: String,
    },
    ExportFailed {
        path: PathBuf,
        error: std::io::Error,
    },
    UnsupportedPlatform(&'static str),
}

impl Display for ArlinksError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            #[cfg(windows)]
            Self::Ldap(e) => write!(f, "LDAP error: {}", e),
            Self::Authz(e) => write!(f, "{}", e),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Csv(e) => write!(f, "unable to write CSV record: {}", e),
            Self::SnapshotUnreadable { path, reason } => write!(f, "unable to load directory snapshot {} : {}", path.display(), reason),
            Self::ObjectNotFound { kind, identity } => write!(f, "{} \"{}\" not found", kind, identity),
            Self::AmbiguousIdentity { identity, candidates } => write!(f, "\"{}\" is ambiguous, it matches {}", identity, candidates.join(" ; ")),
            Self::NotATrustee { dn } => write!(f, "{} has no objectSid and cannot be a trustee", dn),
            Self::AceListMissing { template } => write!(f, "access template {} has no effective ACE list", template),
            Self::ExportFailed { path, error } => write!(f, "unable to write {} : {}", path.display(), error),
            Self::UnsupportedPlatform(what) => write!(f, "{} is only available on Windows", what),
        }
    }
}

impl std::error::Error for ArlinksError {}

#[cfg(windows)]
impl From<LdapError> for ArlinksError {
    fn from(e: LdapError) -> Self {
        Self::Ldap(e)
    }
}

impl From<AuthzError> for ArlinksError {
    fn from(e: AuthzError) -> Self {
        Self::Authz(e)
    }
}

impl From<std::io::Error> for ArlinksError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for ArlinksError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}
