use super::context::QueryContext;
use super::instance::HookTarget;
use super::registry::FilterRegistry;
use crate::config_loader::Config;
use crate::ports::rbl_client::RblCompletion;
use ferrous_policy_domain::{DomainError, PolicyQuery, Verdict};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Reply when a fired hook has no configured edge: the MTA-neutral answer.
pub const DEFAULT_REPLY: &str = "DUNNO";

/// Upper bound on hook jumps per query; a cycle in the hook graph becomes an
/// error instead of a hang.
const MAX_CHAIN_HOPS: usize = 64;

/// The dispatch engine: walks the hook graph from the entry point, running
/// one filter at a time and draining DNS completions whenever a filter
/// suspends.
///
/// Evaluation is cooperative and single-file per query: filter runs and
/// completion handling never overlap, so the query context needs no locking.
pub struct FilterEngine {
    registry: Arc<FilterRegistry>,
    config: Arc<Config>,
}

impl FilterEngine {
    pub fn new(registry: Arc<FilterRegistry>, config: Arc<Config>) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Evaluate one policy query to its terminal MTA reply.
    pub async fn evaluate(&self, query: &PolicyQuery) -> Result<String, DomainError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut ctx = QueryContext::new(self.registry.len(), tx);
        let mut current = self.config.entry_point;

        for _ in 0..MAX_CHAIN_HOPS {
            let filter = &self.config.filters[current];
            let entry = self.registry.entry(filter.kind)?;
            ctx.current = current;

            let mut verdict = entry.kind.run(filter, query, &mut ctx)?;
            if verdict == Verdict::Async {
                if !entry.has_async {
                    return Err(DomainError::Logic(format!(
                        "kind {} suspended but is not registered as asynchronous",
                        entry.kind.name()
                    )));
                }
                verdict = self.await_posted_verdict(current, &mut ctx, &mut rx).await?;
            }
            debug!(filter = %filter.name, verdict = ?verdict, "filter evaluated");

            match filter.hook_target(verdict.hook_name()) {
                Some(HookTarget::Jump(next)) => current = *next,
                Some(HookTarget::Action(reply)) => return Ok(reply.clone()),
                None => {
                    debug!(
                        filter = %filter.name,
                        hook = verdict.hook_name(),
                        "hook not configured, answering the default"
                    );
                    return Ok(DEFAULT_REPLY.to_string());
                }
            }
        }

        Err(DomainError::Logic(format!(
            "filter chain exceeded {MAX_CHAIN_HOPS} hops, the hook graph loops"
        )))
    }

    /// Drain completions for the suspended filter until it posts its final
    /// verdict. A posted `Async` is a protocol violation.
    async fn await_posted_verdict(
        &self,
        current: usize,
        ctx: &mut QueryContext,
        rx: &mut mpsc::UnboundedReceiver<RblCompletion>,
    ) -> Result<Verdict, DomainError> {
        let filter = &self.config.filters[current];
        let entry = self.registry.entry(filter.kind)?;
        loop {
            if let Some(verdict) = ctx.take_posted() {
                if !verdict.is_final() {
                    return Err(DomainError::Logic(format!(
                        "filter {} posted a non-final verdict",
                        filter.name
                    )));
                }
                return Ok(verdict);
            }

            let completion = rx.recv().await.ok_or_else(|| {
                DomainError::Logic("completion channel closed while answers were pending".into())
            })?;
            if completion.generation != ctx.generation() {
                debug!(
                    filter = %filter.name,
                    slot = completion.slot,
                    "discarding completion from a stale suspension"
                );
                continue;
            }
            entry
                .kind
                .on_async_result(filter, ctx, completion.slot, completion.result)?;
        }
    }
}
