//! Config-file to engine pipeline: map, lex, wire the kinds, validate.

use ferrous_policy_application::{load, FilterEngine, FilterRegistry};
use ferrous_policy_domain::{config, DomainError, RawConfig};
use ferrous_policy_infrastructure::{register_builtin_kinds, DnsRblClient, MappedFile};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEFAULT_RESOLVER: &str = "127.0.0.1:53";
const DEFAULT_RESOLVER_TIMEOUT_MS: u64 = 5000;

fn global<'a>(raw: &'a RawConfig, name: &str) -> Option<(&'a str, u32)> {
    raw.globals
        .iter()
        .rev()
        .find(|p| p.name == name)
        .map(|p| (p.value.as_str(), p.line))
}

fn resolver_settings(raw: &RawConfig) -> Result<(SocketAddr, Duration), DomainError> {
    let (value, line) = global(raw, "resolver").unwrap_or((DEFAULT_RESOLVER, 0));
    let resolver: SocketAddr = value
        .parse()
        .map_err(|_| DomainError::at_line(line, format!("invalid resolver address {value}")))?;

    let timeout = match global(raw, "resolver_timeout_ms") {
        Some((ms, line)) => ms.parse::<u64>().map_err(|_| {
            DomainError::at_line(line, format!("invalid resolver_timeout_ms value {ms}"))
        })?,
        None => DEFAULT_RESOLVER_TIMEOUT_MS,
    };
    Ok((resolver, Duration::from_millis(timeout)))
}

/// Load the filter configuration and assemble the dispatch engine.
pub fn load_engine(path: &Path) -> Result<FilterEngine, DomainError> {
    let map = MappedFile::open(path, false)?;
    let raw = config::parse(map.bytes())?;
    drop(map);

    let (resolver, timeout) = resolver_settings(&raw)?;
    let rbl = Arc::new(DnsRblClient::new(resolver, timeout));

    let mut registry = FilterRegistry::new();
    register_builtin_kinds(&mut registry, rbl)?;
    registry.freeze();

    let config = load(raw, &registry)?;
    info!(
        file = %path.display(),
        filters = config.filters.len(),
        entry = %config.filters[config.entry_point].name,
        "configuration loaded"
    );

    Ok(FilterEngine::new(Arc::new(registry), Arc::new(config)))
}
