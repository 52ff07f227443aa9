mod error;
mod ace;
mod sid;
mod guid;
#[cfg(feature = "serial")]
mod serial;

pub use error::AuthzError;
pub use ace::{AceEffect, AceToken, GuidField, bracketed_tokens};
pub use sid::Sid;
pub use guid::Guid;
