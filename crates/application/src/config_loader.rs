//! Turns the raw section tree into the validated, immutable filter graph the
//! engine dispatches over.

use crate::filter::instance::{find_by_name, Filter, HookTarget};
use crate::filter::registry::{FilterRegistry, KindTag};
use compact_str::CompactString;
use ferrous_policy_domain::{DomainError, RawConfig, RawParam};
use rustc_hash::FxHashMap;
use std::any::Any;
use tracing::warn;

/// Global parameters the daemon itself consumes; anything else is a warning.
pub const KNOWN_GLOBALS: &[&str] = &["entry_point", "resolver", "resolver_timeout_ms"];

/// The loaded configuration: the filter graph plus the globals it was built
/// from. Immutable for the life of the process.
pub struct Config {
    pub filters: Vec<Filter>,
    pub entry_point: usize,
    pub globals: Vec<RawParam>,
}

impl Config {
    /// Last-one-wins lookup of a global parameter.
    pub fn global(&self, name: &str) -> Option<&str> {
        self.globals
            .iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

struct PendingFilter {
    name: String,
    kind: KindTag,
    data: Box<dyn Any + Send + Sync>,
    /// (hook name, raw target, line) — resolved once every name is known.
    edges: Vec<(CompactString, String, u32)>,
}

/// Build and validate the filter graph.
pub fn load(raw: RawConfig, registry: &FilterRegistry) -> Result<Config, DomainError> {
    for g in &raw.globals {
        if !KNOWN_GLOBALS.iter().any(|known| *known == g.name) {
            warn!(line = g.line, name = %g.name, "unknown global parameter");
        }
    }

    let mut pending: Vec<PendingFilter> = Vec::with_capacity(raw.filters.len());
    for section in &raw.filters {
        if pending.iter().any(|f| f.name == section.name) {
            return Err(DomainError::at_line(
                section.line,
                format!("duplicate filter name {}", section.name),
            ));
        }

        let mut kind_name: Option<&RawParam> = None;
        let mut params: Vec<RawParam> = Vec::new();
        let mut edges: Vec<(CompactString, String, u32)> = Vec::new();
        for entry in &section.entries {
            if entry.name == "type" {
                if kind_name.is_some() {
                    return Err(DomainError::at_line(
                        entry.line,
                        format!("filter {} declares its type twice", section.name),
                    ));
                }
                kind_name = Some(entry);
            } else if let Some(hook) = entry.name.strip_prefix("on_") {
                edges.push((CompactString::new(hook), entry.value.clone(), entry.line));
            } else {
                params.push(entry.clone());
            }
        }

        let kind_name = kind_name.ok_or_else(|| {
            DomainError::at_line(
                section.line,
                format!("filter {} has no type", section.name),
            )
        })?;
        let tag = registry.find_kind(&kind_name.value).ok_or_else(|| {
            DomainError::at_line(
                kind_name.line,
                format!("unknown filter kind {}", kind_name.value),
            )
        })?;

        for param in &params {
            if !registry.declares_param(tag, &param.name) {
                warn!(
                    line = param.line,
                    filter = %section.name,
                    param = %param.name,
                    "unknown parameter for this filter kind"
                );
            }
        }
        for (hook, _, line) in &edges {
            if !registry.declares_hook(tag, hook) {
                return Err(DomainError::at_line(
                    *line,
                    format!("filter {} has no hook named {hook}", section.name),
                ));
            }
        }

        let data = registry
            .entry(tag)?
            .kind
            .construct(&section.name, &params)?;
        pending.push(PendingFilter {
            name: section.name.clone(),
            kind: tag,
            data,
            edges,
        });
    }

    // Hook edges can reference filters declared later, so resolution is a
    // second pass.
    let names: Vec<String> = pending.iter().map(|f| f.name.clone()).collect();
    let mut filters = Vec::with_capacity(pending.len());
    for f in pending {
        let mut hooks = FxHashMap::default();
        for (hook, target, line) in f.edges {
            let resolved = if let Some(reply) = target.strip_prefix("postfix:") {
                HookTarget::Action(reply.to_string())
            } else if let Some(idx) = names.iter().position(|n| *n == target) {
                HookTarget::Jump(idx)
            } else {
                return Err(DomainError::at_line(
                    line,
                    format!("hook {hook} of filter {} targets unknown filter {target}", f.name),
                ));
            };
            hooks.insert(hook, resolved);
        }
        filters.push(Filter::new(f.name, f.kind, f.data, hooks));
    }

    let entry = raw
        .globals
        .iter()
        .rev()
        .find(|p| p.name == "entry_point")
        .ok_or_else(|| DomainError::at_line(0, "entry_point is not set"))?;
    let entry_point = find_by_name(&filters, &entry.value).ok_or_else(|| {
        DomainError::at_line(
            entry.line,
            format!("entry_point {} is not a filter", entry.value),
        )
    })?;

    warn_unreachable(&filters, entry_point);

    Ok(Config {
        filters,
        entry_point,
        globals: raw.globals,
    })
}

/// Filters no hook chain can reach still load; they just get flagged.
fn warn_unreachable(filters: &[Filter], entry_point: usize) {
    let mut reachable = vec![false; filters.len()];
    let mut stack = vec![entry_point];
    while let Some(i) = stack.pop() {
        if std::mem::replace(&mut reachable[i], true) {
            continue;
        }
        for (_, target) in filters[i].hook_targets() {
            if let HookTarget::Jump(next) = target {
                stack.push(*next);
            }
        }
    }
    for (i, filter) in filters.iter().enumerate() {
        if !reachable[i] {
            warn!(filter = %filter.name, "filter is unreachable from the entry point");
        }
    }
}
