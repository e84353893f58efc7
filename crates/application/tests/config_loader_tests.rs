mod helpers;

use ferrous_policy_application::{find_by_name, load, HookTarget};
use ferrous_policy_domain::{config, DomainError, RawConfig};
use helpers::registry_with_static_kind;

fn raw(input: &str) -> RawConfig {
    config::parse(input.as_bytes()).unwrap()
}

#[test]
fn graph_builds_and_names_resolve() {
    let registry = registry_with_static_kind();
    let config = load(
        raw(r#"
            first { type = "static"; verdict = "fail"; on_fail = "second"; }
            second { type = "static"; verdict = "hard_match";
                     on_hard_match = "postfix:REJECT listed"; }
            entry_point = "first";
        "#),
        &registry,
    )
    .unwrap();

    assert_eq!(config.filters.len(), 2);
    assert_eq!(find_by_name(&config.filters, "first"), Some(0));
    assert_eq!(find_by_name(&config.filters, "second"), Some(1));
    assert_eq!(find_by_name(&config.filters, "third"), None);
    assert_eq!(config.entry_point, 0);

    assert_eq!(
        config.filters[0].hook_target("fail"),
        Some(&HookTarget::Jump(1))
    );
    assert_eq!(
        config.filters[1].hook_target("hard_match"),
        Some(&HookTarget::Action("REJECT listed".into()))
    );
    assert_eq!(config.filters[1].hook_target("fail"), None);
}

#[test]
fn forward_references_resolve() {
    let registry = registry_with_static_kind();
    let config = load(
        raw(r#"
            entry_point = "a";
            a { type = "static"; on_fail = "b"; }
            b { type = "static"; }
        "#),
        &registry,
    )
    .unwrap();
    assert_eq!(
        config.filters[0].hook_target("fail"),
        Some(&HookTarget::Jump(1))
    );
}

#[test]
fn unknown_parameter_is_only_a_warning() {
    let registry = registry_with_static_kind();
    let config = load(
        raw(r#"f { type = "static"; frobnicate = "yes"; } entry_point = "f";"#),
        &registry,
    )
    .unwrap();
    assert_eq!(config.filters.len(), 1);
}

fn expect_load_error(input: &str, needle: &str) {
    let registry = registry_with_static_kind();
    match load(raw(input), &registry) {
        Err(DomainError::ParseConfig { msg, .. }) => {
            assert!(
                msg.contains(needle),
                "error {msg:?} does not mention {needle:?}"
            );
        }
        Ok(_) => panic!("expected load error for {input:?}"),
        Err(other) => panic!("unexpected error kind {other:?}"),
    }
}

#[test]
fn unknown_kind_is_rejected() {
    expect_load_error(
        r#"f { type = "no_such_kind"; } entry_point = "f";"#,
        "unknown filter kind",
    );
}

#[test]
fn missing_type_is_rejected() {
    expect_load_error(r#"f { verdict = "fail"; } entry_point = "f";"#, "has no type");
}

#[test]
fn undeclared_hook_is_rejected() {
    expect_load_error(
        r#"f { type = "static"; on_jackpot = "f"; } entry_point = "f";"#,
        "no hook named jackpot",
    );
}

#[test]
fn dangling_hook_target_is_rejected() {
    expect_load_error(
        r#"f { type = "static"; on_fail = "ghost"; } entry_point = "f";"#,
        "unknown filter ghost",
    );
}

#[test]
fn duplicate_filter_names_are_rejected() {
    expect_load_error(
        r#"f { type = "static"; } f { type = "static"; } entry_point = "f";"#,
        "duplicate filter name",
    );
}

#[test]
fn missing_entry_point_is_rejected() {
    expect_load_error(r#"f { type = "static"; }"#, "entry_point is not set");
}

#[test]
fn entry_point_must_name_a_filter() {
    expect_load_error(
        r#"f { type = "static"; } entry_point = "ghost";"#,
        "is not a filter",
    );
}
