use ferrous_policy_application::ports::rbl_client::{CompletionSink, RblClientPort, RblResult};
use ferrous_policy_application::{load, FilterEngine, FilterRegistry};
use ferrous_policy_domain::{config, PolicyQuery};
use ferrous_policy_infrastructure::register_builtin_kinds;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted RBL client: slot `i` answers `script[i]`; `None` refuses the
/// submission. All answers are held back until the last successful
/// submission, then delivered in submission or reverse order so tests can
/// prove completion order does not matter.
pub struct ScriptedRbl {
    script: Vec<Option<RblResult>>,
    reverse: bool,
    pending: Mutex<Vec<(usize, RblResult)>>,
    submitted: AtomicUsize,
}

impl ScriptedRbl {
    pub fn new(script: Vec<Option<RblResult>>, reverse: bool) -> Arc<Self> {
        Arc::new(Self {
            script,
            reverse,
            pending: Mutex::new(Vec::new()),
            submitted: AtomicUsize::new(0),
        })
    }

    fn expected(&self) -> usize {
        self.script.iter().filter(|r| r.is_some()).count()
    }

    /// Number of successful submissions so far.
    pub fn submissions(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

impl RblClientPort for ScriptedRbl {
    fn check(&self, _host: &str, _ip: u32, slot: usize, sink: &CompletionSink) -> bool {
        let Some(result) = self.script.get(slot).copied().flatten() else {
            return false;
        };
        self.submitted.fetch_add(1, Ordering::SeqCst);
        let mut pending = self.pending.lock().unwrap();
        pending.push((slot, result));
        if pending.len() == self.expected() {
            if self.reverse {
                pending.reverse();
            }
            for (slot, result) in pending.drain(..) {
                sink.deliver(slot, result);
            }
        }
        true
    }
}

pub fn engine_with_rbl(config_text: &str, rbl: Arc<dyn RblClientPort>) -> FilterEngine {
    let mut registry = FilterRegistry::new();
    register_builtin_kinds(&mut registry, rbl).unwrap();
    registry.freeze();
    let raw = config::parse(config_text.as_bytes()).unwrap();
    let cfg = load(raw, &registry).unwrap();
    FilterEngine::new(Arc::new(registry), Arc::new(cfg))
}

pub fn query_for(client_address: &str) -> PolicyQuery {
    PolicyQuery::parse(&format!(
        "request=smtpd_access_policy\nprotocol_state=RCPT\nclient_address={client_address}\n\n"
    ))
    .unwrap()
}
