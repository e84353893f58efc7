pub mod rbl_client;

pub use rbl_client::{CompletionSink, RblClientPort, RblCompletion, RblResult};
