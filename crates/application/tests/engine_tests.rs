mod helpers;

use ferrous_policy_application::{load, FilterEngine, DEFAULT_REPLY};
use ferrous_policy_domain::{config, DomainError};
use helpers::{registry_with_static_kind, sample_query};
use std::sync::Arc;

fn engine_from(input: &str) -> FilterEngine {
    let registry = registry_with_static_kind();
    let raw = config::parse(input.as_bytes()).unwrap();
    let config = load(raw, &registry).unwrap();
    FilterEngine::new(Arc::new(registry), Arc::new(config))
}

#[tokio::test]
async fn hooks_chain_to_a_terminal_action() {
    let engine = engine_from(
        r#"
        triage { type = "static"; verdict = "fail"; on_fail = "score"; }
        score  { type = "static"; verdict = "hard_match";
                 on_hard_match = "postfix:REJECT listed";
                 on_fail = "postfix:OK"; }
        entry_point = "triage";
        "#,
    );
    let reply = engine.evaluate(&sample_query()).await.unwrap();
    assert_eq!(reply, "REJECT listed");
}

#[tokio::test]
async fn unconfigured_hook_answers_the_default() {
    let engine = engine_from(
        r#"
        only { type = "static"; verdict = "soft_match"; on_fail = "postfix:OK"; }
        entry_point = "only";
        "#,
    );
    let reply = engine.evaluate(&sample_query()).await.unwrap();
    assert_eq!(reply, DEFAULT_REPLY);
}

#[tokio::test]
async fn error_verdict_selects_the_error_hook() {
    let engine = engine_from(
        r#"
        flaky { type = "static"; verdict = "error";
                on_error = "postfix:DEFER_IF_PERMIT try later";
                on_fail = "postfix:OK"; }
        entry_point = "flaky";
        "#,
    );
    let reply = engine.evaluate(&sample_query()).await.unwrap();
    assert_eq!(reply, "DEFER_IF_PERMIT try later");
}

#[tokio::test]
async fn hook_graph_cycles_are_cut_off() {
    let engine = engine_from(
        r#"
        ouro { type = "static"; verdict = "fail"; on_fail = "ouro"; }
        entry_point = "ouro";
        "#,
    );
    match engine.evaluate(&sample_query()).await {
        Err(DomainError::Logic(msg)) => assert!(msg.contains("hops")),
        other => panic!("expected a chain-length error, got {other:?}"),
    }
}
