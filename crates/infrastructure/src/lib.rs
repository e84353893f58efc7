//! Ferrous Policy Infrastructure Layer
//!
//! Everything that touches the outside world: memory-mapped files, the
//! bucketed IP index built from RBL dumps, the UDP DNS-RBL client, and the
//! built-in filter kinds wired onto the application framework.
pub mod filters;
pub mod mapped_file;
pub mod rbl;

pub use filters::register_builtin_kinds;
pub use mapped_file::MappedFile;
pub use rbl::dns_client::DnsRblClient;
pub use rbl::ip_index::IpSet;
