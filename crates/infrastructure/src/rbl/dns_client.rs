//! DNS-RBL probes over UDP.
//!
//! For query address `a.b.c.d` and zone `H` the probe is an A-record lookup
//! of `d.c.b.a.H`. NOERROR with at least one A answer means the address is
//! listed; NXDOMAIN means it is not; everything else, timeouts included, is
//! a lookup failure.

use ferrous_policy_application::ports::rbl_client::{CompletionSink, RblClientPort, RblResult};
use ferrous_policy_domain::DomainError;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Maximum UDP DNS response size with EDNS(0)
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// UDP DNS-RBL client. One ephemeral socket per probe; the resolver address
/// and per-request timeout come from the daemon configuration.
pub struct DnsRblClient {
    resolver: SocketAddr,
    timeout: Duration,
}

impl DnsRblClient {
    pub fn new(resolver: SocketAddr, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    fn reverse_name(host: &str, ip: u32) -> String {
        format!(
            "{}.{}.{}.{}.{}",
            ip & 0xff,
            (ip >> 8) & 0xff,
            (ip >> 16) & 0xff,
            ip >> 24,
            host
        )
    }

    fn build_query(name: Name) -> Result<(u16, Vec<u8>), DomainError> {
        let mut query = Query::new();
        query.set_name(name);
        query.set_query_type(RecordType::A);
        query.set_query_class(DNSClass::IN);

        let id = fastrand::u16(..);
        let mut message = Message::new(id, MessageType::Query, OpCode::Query);
        message.metadata.recursion_desired = true;
        message.add_query(query);

        let mut buf = Vec::with_capacity(512);
        let mut encoder = BinEncoder::new(&mut buf);
        message
            .emit(&mut encoder)
            .map_err(|e| DomainError::Dns(format!("failed to serialize DNS query: {e}")))?;
        Ok((id, buf))
    }

    async fn probe(resolver: SocketAddr, timeout: Duration, name: Name) -> RblResult {
        match tokio::time::timeout(timeout, Self::lookup(resolver, name)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                debug!(error = %e, "rbl probe failed");
                RblResult::Error
            }
            Err(_) => {
                debug!(resolver = %resolver, "rbl probe timed out");
                RblResult::Error
            }
        }
    }

    async fn lookup(resolver: SocketAddr, name: Name) -> Result<RblResult, DomainError> {
        let (id, request) = Self::build_query(name)?;

        let bind_addr: SocketAddr = if resolver.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| DomainError::Io(format!("failed to bind UDP socket: {e}")))?;
        socket
            .send_to(&request, resolver)
            .await
            .map_err(|e| DomainError::Io(format!("failed to send to {resolver}: {e}")))?;

        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        loop {
            let (n, from) = socket
                .recv_from(&mut recv_buf)
                .await
                .map_err(|e| DomainError::Io(format!("failed to receive from {resolver}: {e}")))?;
            if from.ip() != resolver.ip() {
                warn!(expected = %resolver, received_from = %from, "response from unexpected source");
                continue;
            }

            let response = Message::from_vec(&recv_buf[..n])
                .map_err(|e| DomainError::Dns(format!("failed to parse DNS response: {e}")))?;
            if response.metadata.id != id {
                debug!(got = response.metadata.id, want = id, "mismatched response id");
                continue;
            }

            return Ok(match response.metadata.response_code {
                ResponseCode::NXDomain => RblResult::NotFound,
                ResponseCode::NoError => {
                    let listed = response
                        .answers
                        .iter()
                        .any(|r| matches!(r.data, RData::A(_)));
                    // NOERROR without an A answer is a broken zone, not an
                    // absence.
                    if listed {
                        RblResult::Found
                    } else {
                        RblResult::Error
                    }
                }
                other => {
                    debug!(rcode = ?other, "rbl lookup failed upstream");
                    RblResult::Error
                }
            });
        }
    }
}

impl RblClientPort for DnsRblClient {
    fn check(&self, host: &str, ip: u32, slot: usize, sink: &CompletionSink) -> bool {
        let name = match Name::from_str(&Self::reverse_name(host, ip)) {
            Ok(name) => name,
            Err(e) => {
                warn!(host = %host, error = %e, "invalid rbl host");
                return false;
            }
        };

        let resolver = self.resolver;
        let timeout = self.timeout;
        let sink = sink.clone();
        tokio::spawn(async move {
            let result = Self::probe(resolver, timeout, name).await;
            sink.deliver(slot, result);
        });
        true
    }
}
