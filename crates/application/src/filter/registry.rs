use super::context::QueryContext;
use super::instance::Filter;
use crate::ports::rbl_client::RblResult;
use ferrous_policy_domain::{DomainError, PolicyQuery, RawParam, Verdict};
use std::any::Any;
use std::sync::Arc;

/// Dense handle for a registered filter kind; also indexes the per-kind
/// scratch slots in [`QueryContext`].
pub type KindTag = usize;

/// A filter kind: the behavior shared by every filter instance of one
/// `type = "..."` in the config.
pub trait FilterKind: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build the instance data for one configured filter from its parameter
    /// list. Parameter values the kind does not recognize are ignored here;
    /// the loader has already warned about them.
    fn construct(
        &self,
        filter_name: &str,
        params: &[RawParam],
    ) -> Result<Box<dyn Any + Send + Sync>, DomainError>;

    /// Synchronous entry point. Returning [`Verdict::Async`] suspends the
    /// query until the kind posts a final verdict through the context.
    fn run(
        &self,
        filter: &Filter,
        query: &PolicyQuery,
        ctx: &mut QueryContext,
    ) -> Result<Verdict, DomainError>;

    /// Called by the engine for each DNS completion while this kind's filter
    /// is suspended. Kinds that never return `Async` keep the default.
    fn on_async_result(
        &self,
        _filter: &Filter,
        _ctx: &mut QueryContext,
        _slot: usize,
        _result: RblResult,
    ) -> Result<(), DomainError> {
        Err(DomainError::Logic(format!(
            "kind {} received a DNS completion it never asked for",
            self.name()
        )))
    }
}

/// One registry entry: the kind plus its declared parameter and hook names.
pub struct RegisteredKind {
    pub kind: Arc<dyn FilterKind>,
    pub params: Vec<&'static str>,
    pub hooks: Vec<&'static str>,
    pub has_async: bool,
}

/// Process-wide table of filter kinds. Populated by the explicit init list at
/// startup, then frozen before the first query is served.
#[derive(Default)]
pub struct FilterRegistry {
    kinds: Vec<RegisteredKind>,
    frozen: bool,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        kind: Arc<dyn FilterKind>,
        has_async: bool,
    ) -> Result<KindTag, DomainError> {
        self.check_open()?;
        self.kinds.push(RegisteredKind {
            kind,
            params: Vec::new(),
            hooks: Vec::new(),
            has_async,
        });
        Ok(self.kinds.len() - 1)
    }

    pub fn register_param(&mut self, tag: KindTag, name: &'static str) -> Result<(), DomainError> {
        self.check_open()?;
        self.entry_mut(tag)?.params.push(name);
        Ok(())
    }

    pub fn register_hook(&mut self, tag: KindTag, name: &'static str) -> Result<(), DomainError> {
        self.check_open()?;
        self.entry_mut(tag)?.hooks.push(name);
        Ok(())
    }

    /// Seal the registry; registration afterwards is a protocol violation.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn find_kind(&self, name: &str) -> Option<KindTag> {
        self.kinds.iter().position(|k| k.kind.name() == name)
    }

    pub fn entry(&self, tag: KindTag) -> Result<&RegisteredKind, DomainError> {
        self.kinds
            .get(tag)
            .ok_or_else(|| DomainError::Logic(format!("unregistered kind tag {tag}")))
    }

    pub fn declares_param(&self, tag: KindTag, name: &str) -> bool {
        self.kinds
            .get(tag)
            .is_some_and(|k| k.params.iter().any(|p| *p == name))
    }

    pub fn declares_hook(&self, tag: KindTag, name: &str) -> bool {
        self.kinds
            .get(tag)
            .is_some_and(|k| k.hooks.iter().any(|h| *h == name))
    }

    /// Number of registered kinds; sizes the per-kind context slots.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    fn entry_mut(&mut self, tag: KindTag) -> Result<&mut RegisteredKind, DomainError> {
        self.kinds
            .get_mut(tag)
            .ok_or_else(|| DomainError::Logic(format!("unregistered kind tag {tag}")))
    }

    fn check_open(&self) -> Result<(), DomainError> {
        if self.frozen {
            return Err(DomainError::Logic(
                "filter registry is frozen, registration is a startup-only operation".into(),
            ));
        }
        Ok(())
    }
}
