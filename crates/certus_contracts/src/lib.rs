#![forbid(unsafe_code)]

pub mod certificate;
pub mod common;
pub mod identity;
pub mod registry;
pub mod verdict;

pub use common::{ContractViolation, SchemaVersion, UnixTimeMs, Validate};
