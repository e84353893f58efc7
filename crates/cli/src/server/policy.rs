//! The policy-delegation wire front-end.
//!
//! Requests are `key=value` lines ended by an empty line; the answer is
//! `action=<reply>` followed by an empty line. A connection serves requests
//! until the peer closes it; a request that does not parse closes it early.

use ferrous_policy_application::FilterEngine;
use ferrous_policy_domain::{DomainError, PolicyQuery};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

pub struct PolicyServer {
    listener: TcpListener,
}

impl PolicyServer {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until ctrl-c.
    pub async fn run(self, engine: Arc<FilterEngine>) -> std::io::Result<()> {
        info!(addr = %self.listener.local_addr()?, "policy server listening");
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, engine).await {
                            debug!(%peer, error = %e, "connection closed");
                        }
                    });
                }
            }
        }
    }
}

/// Read one blank-line terminated request. `None` on clean EOF.
async fn read_request(
    reader: &mut BufReader<OwnedReadHalf>,
) -> Result<Option<String>, DomainError> {
    let mut request = String::new();
    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| DomainError::Io(e.to_string()))?;
        if n == 0 {
            if request.is_empty() {
                return Ok(None);
            }
            return Err(DomainError::ParseQuery("truncated request".into()));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            if request.is_empty() {
                // Stray blank line between requests.
                continue;
            }
            return Ok(Some(request));
        }
        request.push_str(trimmed);
        request.push('\n');
    }
}

async fn handle_connection(
    stream: TcpStream,
    engine: Arc<FilterEngine>,
) -> Result<(), DomainError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    while let Some(request) = read_request(&mut reader).await? {
        let query = PolicyQuery::parse(&request)?;
        let reply = match engine.evaluate(&query).await {
            Ok(reply) => reply,
            Err(e @ DomainError::Logic(_)) => {
                // The async-result protocol broke; the process state is no
                // longer trustworthy.
                error!(error = %e, "protocol violation");
                std::process::abort();
            }
            Err(e) => {
                warn!(error = %e, "query evaluation failed");
                return Err(e);
            }
        };
        debug!(client = query.client_address(), reply = %reply, "query answered");
        write_half
            .write_all(format!("action={reply}\n\n").as_bytes())
            .await
            .map_err(|e| DomainError::Io(e.to_string()))?;
    }
    Ok(())
}
