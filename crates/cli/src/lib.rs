//! Ferrous Policyd — daemon wiring: bootstrap and the policy wire server.
pub mod bootstrap;
pub mod server;
