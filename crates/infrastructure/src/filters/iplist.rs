//! The `iplist` filter kind: weighted combination of local IP lists and
//! DNS block lists scored against soft/hard thresholds.
//!
//! Local lists are consulted synchronously and can short-circuit to a hard
//! match. When DNS hosts are configured the filter suspends, probes them all
//! concurrently, and posts its verdict once the last answer lands.

use crate::rbl::ip_index::IpSet;
use ferrous_policy_application::ports::rbl_client::{RblClientPort, RblResult};
use ferrous_policy_application::{Filter, FilterKind, FilterRegistry, QueryContext};
use ferrous_policy_domain::ipv4::parse_ipv4_full;
use ferrous_policy_domain::{DomainError, PolicyQuery, RawParam, Verdict};
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, error, warn};

const WEIGHT_MAX: i32 = 1024;

pub const HOOKS: &[&str] = &["abort", "error", "fail", "hard_match", "soft_match", "async"];
pub const PARAMS: &[&str] = &["file", "rbldns", "dns", "hard_threshold", "soft_threshold"];

pub struct IpListKind {
    rbl: Arc<dyn RblClientPort>,
}

impl IpListKind {
    pub fn new(rbl: Arc<dyn RblClientPort>) -> Self {
        Self { rbl }
    }
}

/// Instance data for one configured `iplist` filter.
struct IpListData {
    dbs: Vec<IpSet>,
    db_weights: Vec<i32>,
    /// Hostnames flat-packed into one arena with parallel span and weight
    /// vectors.
    hosts: String,
    host_spans: Vec<(u32, u32)>,
    host_weights: Vec<i32>,
    hard_threshold: i32,
    soft_threshold: i32,
}

impl IpListData {
    fn add_host(&mut self, name: &str, weight: i32) {
        let offset = self.hosts.len() as u32;
        self.hosts.push_str(name);
        self.host_spans.push((offset, name.len() as u32));
        self.host_weights.push(weight);
    }

    fn host(&self, i: usize) -> &str {
        let (offset, len) = self.host_spans[i];
        &self.hosts[offset as usize..(offset + len) as usize]
    }

    fn host_count(&self) -> usize {
        self.host_spans.len()
    }

    fn scored_verdict(&self, sum: i32) -> Verdict {
        if sum >= self.hard_threshold {
            Verdict::HardMatch
        } else if sum >= self.soft_threshold {
            Verdict::SoftMatch
        } else {
            Verdict::Fail
        }
    }
}

/// Per-query scratch: lives from the first suspension to the last answer.
#[derive(Default)]
struct IpListScratch {
    results: Vec<RblResult>,
    awaited: usize,
    sum: i32,
    error: bool,
}

fn parse_weight(s: &str, line: u32) -> Result<i32, DomainError> {
    match s.parse::<i32>() {
        Ok(w) if (0..=WEIGHT_MAX).contains(&w) => Ok(w),
        _ => Err(DomainError::at_line(
            line,
            format!("illegal weight value {s}"),
        )),
    }
}

fn parse_threshold(s: &str, line: u32) -> Result<i32, DomainError> {
    s.parse::<i32>()
        .map_err(|_| DomainError::at_line(line, format!("invalid threshold value {s}")))
}

impl FilterKind for IpListKind {
    fn name(&self) -> &'static str {
        "iplist"
    }

    fn construct(
        &self,
        filter_name: &str,
        params: &[RawParam],
    ) -> Result<Box<dyn Any + Send + Sync>, DomainError> {
        let mut data = IpListData {
            dbs: Vec::new(),
            db_weights: Vec::new(),
            hosts: String::new(),
            host_spans: Vec::new(),
            host_weights: Vec::new(),
            hard_threshold: 1,
            soft_threshold: 1,
        };

        for param in params {
            match param.name.as_str() {
                // (lock|nolock):weight:path — an rsync-style dump of a block
                // list, loaded into memory at construction.
                "file" | "rbldns" => {
                    let mut parts = param.value.splitn(3, ':');
                    let lock = match parts.next() {
                        Some("lock") => true,
                        Some("nolock") => false,
                        other => {
                            return Err(DomainError::at_line(
                                param.line,
                                format!("illegal locking state {}", other.unwrap_or("")),
                            ))
                        }
                    };
                    let weight = match parts.next() {
                        Some(w) => parse_weight(w, param.line)?,
                        None => {
                            return Err(DomainError::at_line(
                                param.line,
                                "file parameter must contain a locking state and a weight",
                            ))
                        }
                    };
                    let path = parts.next().filter(|p| !p.is_empty()).ok_or_else(|| {
                        DomainError::at_line(param.line, "file parameter is missing its path")
                    })?;
                    let db = IpSet::build(std::path::Path::new(path), lock).map_err(|e| {
                        DomainError::at_line(
                            param.line,
                            format!("cannot load ip list from {path}: {e}"),
                        )
                    })?;
                    data.dbs.push(db);
                    data.db_weights.push(weight);
                }

                // weight:hostname — a block list queried through DNS.
                "dns" => {
                    let (weight, host) = param.value.split_once(':').ok_or_else(|| {
                        DomainError::at_line(
                            param.line,
                            "dns parameter must contain a weight option",
                        )
                    })?;
                    let weight = parse_weight(weight, param.line)?;
                    if host.is_empty() {
                        return Err(DomainError::at_line(
                            param.line,
                            "dns parameter is missing its hostname",
                        ));
                    }
                    data.add_host(host, weight);
                }

                "hard_threshold" => {
                    data.hard_threshold = parse_threshold(&param.value, param.line)?;
                }
                "soft_threshold" => {
                    data.soft_threshold = parse_threshold(&param.value, param.line)?;
                }

                // Unknown parameters were already flagged by the loader.
                _ => {}
            }
        }

        let section_line = params.first().map(|p| p.line).unwrap_or(0);
        if data.dbs.is_empty() && data.host_count() == 0 {
            return Err(DomainError::at_line(
                section_line,
                format!("no file or dns parameter in the filter {filter_name}"),
            ));
        }
        if data.soft_threshold > data.hard_threshold {
            return Err(DomainError::at_line(
                section_line,
                format!("soft_threshold above hard_threshold in the filter {filter_name}"),
            ));
        }

        Ok(Box::new(data))
    }

    fn run(
        &self,
        filter: &Filter,
        query: &PolicyQuery,
        ctx: &mut QueryContext,
    ) -> Result<Verdict, DomainError> {
        let data = filter.data_as::<IpListData>()?;

        let address = query.client_address();
        let ip = match parse_ipv4_full(address) {
            Some(ip) => ip,
            None => {
                if address.contains(':') {
                    // v6 clients are outside this filter's scope.
                    return Ok(Verdict::Fail);
                }
                warn!(filter = %filter.name, client = %address, "invalid client address, expected IPv4");
                return Ok(Verdict::Error);
            }
        };

        let mut sum: i32 = 0;
        let mut error = true;
        for (db, &weight) in data.dbs.iter().zip(&data.db_weights) {
            if db.contains(ip) {
                sum += weight;
                if sum >= data.hard_threshold {
                    return Ok(Verdict::HardMatch);
                }
            }
            error = false;
        }

        if data.host_count() > 0 {
            let sink = ctx.begin_suspension();
            let state = ctx.state_mut::<IpListScratch>(filter.kind)?;
            state.results.clear();
            state.results.resize(data.host_count(), RblResult::Pending);
            state.sum = sum;
            state.awaited = 0;
            for i in 0..data.host_count() {
                if self.rbl.check(data.host(i), ip, i, &sink) {
                    error = false;
                    state.awaited += 1;
                }
            }
            state.error = error;
            let awaited = state.awaited;
            debug!(filter = %filter.name, awaited, "awaiting dns answers");

            if awaited == 0 {
                // Nothing was submitted, so no completion will ever fire;
                // settle the verdict now instead of suspending forever.
                let verdict = if error {
                    Verdict::Error
                } else {
                    data.scored_verdict(sum)
                };
                ctx.post_async_result(verdict);
            }
            return Ok(Verdict::Async);
        }

        if error {
            error!(filter = %filter.name, "every ip list source failed");
            return Ok(Verdict::Error);
        }
        Ok(data.scored_verdict(sum))
    }

    fn on_async_result(
        &self,
        filter: &Filter,
        ctx: &mut QueryContext,
        slot: usize,
        result: RblResult,
    ) -> Result<(), DomainError> {
        let data = filter.data_as::<IpListData>()?;
        let state = ctx.state_mut::<IpListScratch>(filter.kind)?;

        if slot >= state.results.len() {
            return Err(DomainError::Logic(format!(
                "dns completion for slot {slot} of filter {} is out of range",
                filter.name
            )));
        }
        if result != RblResult::Error {
            state.error = false;
        }
        state.results[slot] = result;
        state.awaited = state.awaited.checked_sub(1).ok_or_else(|| {
            DomainError::Logic(format!(
                "filter {} received more dns answers than it awaited",
                filter.name
            ))
        })?;
        debug!(
            filter = %filter.name,
            slot,
            remaining = state.awaited,
            "dns answer received"
        );
        if state.awaited > 0 {
            return Ok(());
        }

        let verdict = if state.error {
            Verdict::Error
        } else {
            let mut sum = state.sum;
            for (i, &result) in state.results.iter().enumerate() {
                match result {
                    RblResult::Pending => {
                        return Err(DomainError::Logic(format!(
                            "no more awaited answers but slot {i} of filter {} is still pending",
                            filter.name
                        )))
                    }
                    RblResult::Found => sum += data.host_weights[i],
                    RblResult::NotFound | RblResult::Error => {}
                }
            }
            data.scored_verdict(sum)
        };
        debug!(filter = %filter.name, verdict = ?verdict, "posting dns verdict");
        ctx.post_async_result(verdict);
        Ok(())
    }
}

/// Register the kind with its declared hooks and parameters.
pub fn register(
    registry: &mut FilterRegistry,
    rbl: Arc<dyn RblClientPort>,
) -> Result<(), DomainError> {
    let tag = registry.register(Arc::new(IpListKind::new(rbl)), true)?;
    for hook in HOOKS.iter().copied() {
        registry.register_hook(tag, hook)?;
    }
    for param in PARAMS.iter().copied() {
        registry.register_param(tag, param)?;
    }
    Ok(())
}
