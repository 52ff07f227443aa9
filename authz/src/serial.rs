use core::marker::PhantomData;
use std::convert::TryFrom;
use serde::de::Visitor;
use crate::{AuthzError, Guid, Sid};

// Both types travel as their canonical string forms (S-1-X-Y-Z, xxxxxxxx-xxxx-...)
struct StrVisitor<T> {
    expecting: &'static str,
    marker: PhantomData<T>,
}

impl<'de, T> Visitor<'de> for StrVisitor<T> where T: for<'a> TryFrom<&'a str, Error = AuthzError> {
    type Value = T;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str(self.expecting)
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> where E: serde::de::Error {
        T::try_from(v).map_err(|_| serde::de::Error::invalid_value(serde::de::Unexpected::Str(v), &self))
    }
}

impl serde::Serialize for Sid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: serde::Serializer {
        serializer.serialize_str(&self.to_string())
    }
}

impl serde::Serialize for Guid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: serde::Serializer {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Sid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: serde::Deserializer<'de> {
        deserializer.deserialize_str(StrVisitor {
            expecting: "a SID as string like S-1-X-Y-Z",
            marker: PhantomData,
        })
    }
}

impl<'de> serde::Deserialize<'de> for Guid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: serde::Deserializer<'de> {
        deserializer.deserialize_str(StrVisitor {
            expecting: "a GUID as hexadecimal string, optionally with brackets like {AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA}",
            marker: PhantomData,
        })
    }
}
