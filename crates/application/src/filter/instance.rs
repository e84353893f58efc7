use super::registry::KindTag;
use compact_str::CompactString;
use ferrous_policy_domain::DomainError;
use rustc_hash::FxHashMap;
use std::any::Any;

/// Where a fired hook sends the evaluation next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookTarget {
    /// Continue with another filter (index into `Config::filters`).
    Jump(usize),
    /// Terminate with an MTA reply string.
    Action(String),
}

/// One configured filter: an immutable value built once at config load.
/// All mutable per-query scratch lives in the query context, never here.
pub struct Filter {
    pub name: String,
    pub kind: KindTag,
    data: Box<dyn Any + Send + Sync>,
    hooks: FxHashMap<CompactString, HookTarget>,
}

impl Filter {
    pub fn new(
        name: String,
        kind: KindTag,
        data: Box<dyn Any + Send + Sync>,
        hooks: FxHashMap<CompactString, HookTarget>,
    ) -> Self {
        Self {
            name,
            kind,
            data,
            hooks,
        }
    }

    pub fn hook_target(&self, hook: &str) -> Option<&HookTarget> {
        self.hooks.get(hook)
    }

    pub fn hook_targets(&self) -> impl Iterator<Item = (&str, &HookTarget)> {
        self.hooks.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Downcast the kind data. A mismatch means a filter was dispatched
    /// through the wrong kind, which the registry makes impossible.
    pub fn data_as<T: 'static>(&self) -> Result<&T, DomainError> {
        self.data.downcast_ref::<T>().ok_or_else(|| {
            DomainError::Logic(format!("filter {} holds foreign kind data", self.name))
        })
    }
}

/// Index of the filter called `name`, if any.
pub fn find_by_name(filters: &[Filter], name: &str) -> Option<usize> {
    filters.iter().position(|f| f.name == name)
}
