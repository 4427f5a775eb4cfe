#![forbid(unsafe_code)]

pub mod account;
pub mod common;
pub mod profile;
pub mod session;

pub use common::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};
