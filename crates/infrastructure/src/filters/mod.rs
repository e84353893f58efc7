//! Built-in filter kinds.
//!
//! Kinds are gathered here by an explicit init list: the daemon registers
//! everything once at startup and freezes the registry before the first
//! query is served.

pub mod iplist;

use ferrous_policy_application::ports::rbl_client::RblClientPort;
use ferrous_policy_application::FilterRegistry;
use ferrous_policy_domain::DomainError;
use std::sync::Arc;

pub fn register_builtin_kinds(
    registry: &mut FilterRegistry,
    rbl: Arc<dyn RblClientPort>,
) -> Result<(), DomainError> {
    iplist::register(registry, rbl)?;
    Ok(())
}
