pub mod filter;
#[cfg(windows)]
pub mod connection;
#[cfg(windows)]
pub mod error;
#[cfg(windows)]
pub mod search;
#[cfg(windows)]
mod utils;
