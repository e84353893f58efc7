use tokio::sync::mpsc;

/// Outcome of one DNS block-list probe.
///
/// `Pending` is the pre-result placeholder a filter seeds its result vector
/// with; a completion must never carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RblResult {
    Pending,
    Found,
    NotFound,
    Error,
}

/// One delivered DNS answer, stamped with the generation of the suspension
/// that issued the probe so the engine can discard answers that outlived
/// their query.
#[derive(Debug)]
pub struct RblCompletion {
    pub generation: u64,
    pub slot: usize,
    pub result: RblResult,
}

/// Sending half handed to the RBL client. The dispatch engine owns the
/// receiving half and consumes completions only between filter runs.
#[derive(Clone)]
pub struct CompletionSink {
    tx: mpsc::UnboundedSender<RblCompletion>,
    generation: u64,
}

impl CompletionSink {
    pub fn new(tx: mpsc::UnboundedSender<RblCompletion>, generation: u64) -> Self {
        Self { tx, generation }
    }

    /// Deliver the answer for `slot`. Delivery to a dropped query is silently
    /// discarded.
    pub fn deliver(&self, slot: usize, result: RblResult) {
        debug_assert!(result != RblResult::Pending);
        let _ = self.tx.send(RblCompletion {
            generation: self.generation,
            slot,
            result,
        });
    }
}

/// Capability to probe DNS block lists.
///
/// Hot-path contract: `check` must not block. A `true` return promises
/// exactly one future completion for `slot` through `sink`; a `false` return
/// means submission failed synchronously and no completion will ever arrive.
/// The completion is never delivered before `check` returns.
pub trait RblClientPort: Send + Sync {
    /// Submit the reverse-octet A lookup `d.c.b.a.<host>` for `ip`.
    fn check(&self, host: &str, ip: u32, slot: usize, sink: &CompletionSink) -> bool;
}
