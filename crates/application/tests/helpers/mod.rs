#![allow(dead_code)]

use ferrous_policy_application::{Filter, FilterKind, FilterRegistry, QueryContext};
use ferrous_policy_domain::{DomainError, PolicyQuery, RawParam, Verdict};
use std::any::Any;
use std::sync::Arc;

/// Test kind answering whatever verdict its `verdict` parameter names.
pub struct StaticKind;

impl FilterKind for StaticKind {
    fn name(&self) -> &'static str {
        "static"
    }

    fn construct(
        &self,
        filter_name: &str,
        params: &[RawParam],
    ) -> Result<Box<dyn Any + Send + Sync>, DomainError> {
        let mut verdict = Verdict::Fail;
        for p in params {
            if p.name == "verdict" {
                verdict = Verdict::from_hook_name(&p.value).ok_or_else(|| {
                    DomainError::at_line(
                        p.line,
                        format!("unknown verdict {} in filter {filter_name}", p.value),
                    )
                })?;
            }
        }
        Ok(Box::new(verdict))
    }

    fn run(
        &self,
        filter: &Filter,
        _query: &PolicyQuery,
        _ctx: &mut QueryContext,
    ) -> Result<Verdict, DomainError> {
        Ok(*filter.data_as::<Verdict>()?)
    }
}

pub fn registry_with_static_kind() -> FilterRegistry {
    let mut registry = FilterRegistry::new();
    let tag = registry.register(Arc::new(StaticKind), false).unwrap();
    for hook in ["fail", "soft_match", "hard_match", "error"] {
        registry.register_hook(tag, hook).unwrap();
    }
    registry.register_param(tag, "verdict").unwrap();
    registry.freeze();
    registry
}

pub fn sample_query() -> PolicyQuery {
    PolicyQuery::parse(
        "request=smtpd_access_policy\nprotocol_state=RCPT\nclient_address=192.0.2.1\n\n",
    )
    .unwrap()
}
