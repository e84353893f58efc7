//! Ferrous Policy Domain Layer
pub mod config;
pub mod errors;
pub mod ipv4;
pub mod query;
pub mod verdict;

pub use config::{RawConfig, RawFilterSection, RawParam};
pub use errors::DomainError;
pub use ipv4::parse_ipv4;
pub use query::PolicyQuery;
pub use verdict::Verdict;
