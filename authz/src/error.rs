use core::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    InvalidSidBytes(Vec<u8>),
    InvalidSidString(String),
    UnexpectedSidSize {
        bytes: Vec<u8>,
        expected_size: usize,
    },
    InvalidGuidString(String),
    MissingAceFields {
        token: String,
        field_count: usize,
    },
}

impl Display for AuthzError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidSidBytes(bytes) => write!(f, "invalid SID {:?}", bytes),
            Self::InvalidSidString(s) => write!(f, "unable to parse \"{}\" as a SID", s),
            Self::UnexpectedSidSize { bytes, expected_size } if *expected_size > bytes.len() => write!(f, "{} bytes truncated from SID {:?}", expected_size - bytes.len(), bytes),
            Self::UnexpectedSidSize { bytes, expected_size } => write!(f, "{} leftover bytes after SID {:?}", bytes.len() - expected_size, bytes),
            Self::InvalidGuidString(s) => write!(f, "unable to parse \"{}\" as a GUID", s),
            Self::MissingAceFields { token, field_count } => write!(f, "ACE \"{}\" has {} field(s), at least 3 are required", token, field_count),
        }
    }
}

impl std::error::Error for AuthzError {}
