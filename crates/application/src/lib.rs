//! Ferrous Policy Application Layer
//!
//! The filter framework: kind registry, filter instances with their hook
//! edges, the per-query context, the dispatch engine and the config loader.
//! Concrete filter kinds and the DNS-RBL transport live in the
//! infrastructure layer behind the ports defined here.
pub mod config_loader;
pub mod filter;
pub mod ports;

pub use config_loader::{load, Config};
pub use filter::context::QueryContext;
pub use filter::engine::{FilterEngine, DEFAULT_REPLY};
pub use filter::instance::{find_by_name, Filter, HookTarget};
pub use filter::registry::{FilterKind, FilterRegistry, KindTag};
pub use ports::rbl_client::{CompletionSink, RblClientPort, RblCompletion, RblResult};
