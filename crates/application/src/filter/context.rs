use super::registry::KindTag;
use crate::ports::rbl_client::{CompletionSink, RblCompletion};
use ferrous_policy_domain::{DomainError, Verdict};
use std::any::Any;
use tokio::sync::mpsc;

/// Per-query evaluation state threaded through every filter run and every
/// DNS completion of one policy request.
///
/// Each kind gets one opaque scratch slot, indexed by its tag, created
/// lazily on first use and dropped with the query. Filters themselves stay
/// immutable.
pub struct QueryContext {
    states: Vec<Option<Box<dyn Any + Send>>>,
    tx: mpsc::UnboundedSender<RblCompletion>,
    generation: u64,
    posted: Option<Verdict>,
    /// Index of the filter currently being evaluated.
    pub current: usize,
}

impl QueryContext {
    pub fn new(kind_count: usize, tx: mpsc::UnboundedSender<RblCompletion>) -> Self {
        let mut states = Vec::with_capacity(kind_count);
        states.resize_with(kind_count, || None);
        Self {
            states,
            tx,
            generation: 0,
            posted: None,
            current: 0,
        }
    }

    /// Open a new suspension window and hand out the sink async probes must
    /// deliver through. Completions stamped with an older generation are
    /// stale and get discarded by the engine.
    pub fn begin_suspension(&mut self) -> CompletionSink {
        self.generation += 1;
        CompletionSink::new(self.tx.clone(), self.generation)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Supply the verdict a suspended filter deferred. The engine picks it up
    /// and resumes hook dispatch.
    pub fn post_async_result(&mut self, verdict: Verdict) {
        self.posted = Some(verdict);
    }

    pub fn take_posted(&mut self) -> Option<Verdict> {
        self.posted.take()
    }

    /// The scratch slot for `tag`, created on first access.
    pub fn state_mut<T: Default + Send + 'static>(
        &mut self,
        tag: KindTag,
    ) -> Result<&mut T, DomainError> {
        let slot = self
            .states
            .get_mut(tag)
            .ok_or_else(|| DomainError::Logic(format!("unregistered kind tag {tag}")))?;
        if slot.is_none() {
            *slot = Some(Box::new(T::default()));
        }
        slot.as_mut()
            .and_then(|s| s.downcast_mut::<T>())
            .ok_or_else(|| DomainError::Logic(format!("kind tag {tag} holds foreign scratch data")))
    }
}
