#![forbid(unsafe_code)]

pub mod access;
pub mod file_rules;
pub mod password;
pub mod token;
pub mod verdict;
