#![forbid(unsafe_code)]

pub mod gateway;
pub mod journal;
pub mod repo;
pub mod store;
pub mod tables;

pub use gateway::{GatewayError, StorageGateway};
pub use store::LedgerStore;
pub use tables::{StatusWrite, StorageError, TableCounts};
