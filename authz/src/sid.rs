use core::fmt::{Debug, Display, Formatter};
use std::convert::TryFrom;
use crate::error::AuthzError;

const SID_REVISION: u8 = 1;
const SID_MAX_SUB_AUTHORITIES: usize = 15;

/// Security identifier, stored in its binary (objectSid) layout.
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Sid {
    bytes: Vec<u8>,
}

impl Sid {
    pub fn from_bytes(slice: &[u8]) -> Result<Self, AuthzError> {
        if slice.len() < 8 || slice[0] != SID_REVISION || slice[1] as usize > SID_MAX_SUB_AUTHORITIES {
            return Err(AuthzError::InvalidSidBytes(slice.to_vec()));
        }
        let expected_size = 8 + 4 * (slice[1] as usize);
        if expected_size != slice.len() {
            return Err(AuthzError::UnexpectedSidSize { bytes: slice.to_vec(), expected_size });
        }
        Ok(Sid {
            bytes: slice.to_vec(),
        })
    }

    fn sub_authorities(&self) -> impl Iterator<Item = u32> + '_ {
        self.bytes[8..].chunks_exact(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
    }

    fn identifier_authority(&self) -> u64 {
        self.bytes[2..8].iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }
}

impl TryFrom<&str> for Sid {
    type Error = AuthzError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let err = || AuthzError::InvalidSidString(s.to_owned());
        let mut parts = s.trim().split('-');
        if !parts.next().map(|p| p.eq_ignore_ascii_case("S")).unwrap_or(false) {
            return Err(err());
        }
        if parts.next() != Some("1") {
            return Err(err());
        }
        let authority = match parts.next() {
            Some(a) if a.starts_with("0x") || a.starts_with("0X") => u64::from_str_radix(&a[2..], 16).map_err(|_| err())?,
            Some(a) => a.parse::<u64>().map_err(|_| err())?,
            None => return Err(err()),
        };
        if authority >= (1 << 48) {
            return Err(err());
        }
        let sub_authorities = parts.map(|p| p.parse::<u32>().map_err(|_| err()))
            .collect::<Result<Vec<u32>, AuthzError>>()?;
        if sub_authorities.len() > SID_MAX_SUB_AUTHORITIES {
            return Err(err());
        }

        let mut bytes = vec![SID_REVISION, sub_authorities.len() as u8];
        bytes.extend_from_slice(&authority.to_be_bytes()[2..8]);
        for sub_authority in sub_authorities {
            bytes.extend_from_slice(&sub_authority.to_le_bytes());
        }
        Ok(Self { bytes })
    }
}

impl Display for Sid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let authority = self.identifier_authority();
        if authority >= (1 << 32) {
            write!(f, "S-{}-0x{:012X}", self.bytes[0], authority)?;
        } else {
            write!(f, "S-{}-{}", self.bytes[0], authority)?;
        }
        for sub_authority in self.sub_authorities() {
            write!(f, "-{}", sub_authority)?;
        }
        Ok(())
    }
}

impl Debug for Sid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_env_log::test;

    #[test]
    fn string_round_trip() {
        let sid = Sid::try_from("S-1-5-21-1004336348-1177238915-682003330-512").unwrap();
        assert_eq!(sid.to_string(), "S-1-5-21-1004336348-1177238915-682003330-512");
        assert_eq!(Sid::from_bytes(sid.as_bytes()).unwrap(), sid);
    }

    #[test]
    fn binary_layout() {
        let sid = Sid::try_from("S-1-5-32-544").unwrap();
        assert_eq!(sid.as_bytes(), &[1, 2, 0, 0, 0, 0, 0, 5, 32, 0, 0, 0, 0x20, 0x02, 0, 0]);
    }

    #[test]
    fn rejects_malformed() {
        assert!(Sid::try_from("CN=Users").is_err());
        assert!(Sid::try_from("S-2-5").is_err());
        assert!(Sid::try_from("S-1-5-abc").is_err());
        assert!(Sid::from_bytes(&[1, 2, 0, 0, 0, 0, 0, 5, 32, 0, 0, 0]).is_err());
    }
}
