use core::fmt::{Debug, Display, Formatter};
use std::convert::TryFrom;
use crate::error::AuthzError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

impl Guid {
    pub fn from_values(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self { data1, data2, data3, data4 }
    }

    pub fn to_le_bytes(&self) -> [u8; 16] {
        let mut res = [0u8; 16];
        res[0..4].copy_from_slice(&self.data1.to_le_bytes());
        res[4..6].copy_from_slice(&self.data2.to_le_bytes());
        res[6..8].copy_from_slice(&self.data3.to_le_bytes());
        res[8..16].copy_from_slice(&self.data4);
        res
    }
}

fn parse_hex_group(s: &str, expected_len: usize) -> Option<u64> {
    if s.len() != expected_len || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}

impl TryFrom<&str> for Guid {
    type Error = AuthzError;

    // Accepts AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA, optionally enclosed in brackets
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let err = || AuthzError::InvalidGuidString(s.to_owned());
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .unwrap_or(trimmed);
        let groups: Vec<&str> = trimmed.split('-').collect();
        if groups.len() != 5 {
            return Err(err());
        }
        let data1 = parse_hex_group(groups[0], 8).ok_or_else(err)? as u32;
        let data2 = parse_hex_group(groups[1], 4).ok_or_else(err)? as u16;
        let data3 = parse_hex_group(groups[2], 4).ok_or_else(err)? as u16;
        let clock = parse_hex_group(groups[3], 4).ok_or_else(err)? as u16;
        let node = parse_hex_group(groups[4], 12).ok_or_else(err)?;
        let mut data4 = [0u8; 8];
        data4[0..2].copy_from_slice(&clock.to_be_bytes());
        data4[2..8].copy_from_slice(&node.to_be_bytes()[2..8]);
        Ok(Self::from_values(data1, data2, data3, data4))
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1, self.data2, self.data3,
            self.data4[0], self.data4[1], self.data4[2], self.data4[3],
            self.data4[4], self.data4[5], self.data4[6], self.data4[7]
        )
    }
}

impl Debug for Guid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Display::fmt(self, f)
    }
}
