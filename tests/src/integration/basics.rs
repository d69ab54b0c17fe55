//! Commit/dispatch fundamentals: the counter scenario, synchronous commit
//! semantics, and action completion joins.

#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arbor_store::{ModuleDefinition, Store, StoreDefinition, StoreError};
use serde_json::{json, Value};

fn counter_root() -> ModuleDefinition {
    ModuleDefinition::with_state(json!({"count": 0}))
        .mutation("increment", |state, payload| {
            let step = payload.and_then(Value::as_i64).unwrap_or(1);
            state["count"] = json!(state["count"].as_i64().unwrap_or(0) + step);
        })
        .action("incrementAsync", |ctx, _| async move {
            ctx.commit("increment", json!(1))?;
            Ok(json!(null))
        })
}

#[test]
fn test_commit_increments_count() {
    let store = Store::new(StoreDefinition::new(counter_root())).unwrap();
    store.commit("increment", json!(5)).unwrap();
    assert_eq!(store.state()["count"], json!(5));
}

#[tokio::test]
async fn test_dispatch_then_commit_visible() {
    let store = Store::new(StoreDefinition::new(counter_root())).unwrap();
    store.commit("increment", json!(5)).unwrap();
    store.dispatch("incrementAsync", None).await.unwrap();
    assert_eq!(store.state()["count"], json!(6));
}

#[tokio::test]
async fn test_dispatch_completes_after_all_commits() {
    // An action that commits twice with a suspension point in between:
    // once the dispatch future resolves, both commits must be visible.
    let root = ModuleDefinition::with_state(json!({"count": 0}))
        .mutation("increment", |state, _| {
            state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
        })
        .action("twice", |ctx, _| async move {
            ctx.commit("increment", None)?;
            tokio::time::sleep(Duration::from_millis(5)).await;
            ctx.commit("increment", None)?;
            Ok(json!("done"))
        });
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    let values = store.dispatch("twice", None).await.unwrap();
    assert_eq!(values, vec![json!("done")]);
    assert_eq!(store.state()["count"], json!(2));
}

#[test]
fn test_unknown_mutation_leaves_state_unchanged() {
    let store = Store::new(StoreDefinition::new(counter_root())).unwrap();
    let before = store.state();
    let err = store.commit("doesNotExist", None).unwrap_err();
    assert!(matches!(err, StoreError::UnknownMutation { .. }));
    assert_eq!(store.state(), before);
}

#[tokio::test]
async fn test_concurrent_dispatches_interleave() {
    crate::init_tracing();
    let root = ModuleDefinition::with_state(json!({"count": 0}))
        .mutation("increment", |state, _| {
            state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
        })
        .action("slowIncrement", |ctx, _| async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            ctx.commit("increment", None)?;
            Ok(json!(null))
        });
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    // No serialization of in-flight dispatches: all four land.
    let dispatches = (0..4).map(|_| {
        let store = store.clone();
        async move { store.dispatch("slowIncrement", None).await }
    });
    let results = futures::future::join_all(dispatches).await;
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(store.state()["count"], json!(4));
}

#[tokio::test]
async fn test_action_fan_out_failures_aggregate() {
    // Both handlers run to completion; the sibling is not cancelled and
    // its commit survives.
    let committed = Arc::new(AtomicUsize::new(0));
    let seen = committed.clone();
    let root = ModuleDefinition::with_state(json!({}))
        .mutation("mark", move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .module(
            "a",
            ModuleDefinition::new().action("go", |_, _| async move {
                Err(arbor_store::ActionError::from("a failed"))
            }),
        )
        .module(
            "b",
            ModuleDefinition::new().action("go", |ctx, _| async move {
                ctx.commit_root("mark", None)?;
                Ok(json!("b ok"))
            }),
        );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    let err = store.dispatch("go", None).await.unwrap_err();
    let StoreError::Action(failure) = err else {
        panic!("expected action failure");
    };
    assert_eq!(failure.kind, "go");
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.failures[0].to_string(), "a failed");
    assert_eq!(committed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dispatch_returns_values_in_registration_order() {
    let root = ModuleDefinition::with_state(json!({}))
        .module(
            "first",
            ModuleDefinition::new().action("emit", |_, _| async { Ok(json!(1)) }),
        )
        .module(
            "second",
            ModuleDefinition::new().action("emit", |_, _| async { Ok(json!(2)) }),
        );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    let values = store.dispatch("emit", None).await.unwrap();
    assert_eq!(values, vec![json!(1), json!(2)]);
}

#[test]
fn test_strict_mode_normal_operation() {
    let store = Store::new(StoreDefinition::new(counter_root()).strict(true)).unwrap();
    store.commit("increment", json!(3)).unwrap();
    store.replace_state(json!({"count": 7}));
    store.commit("increment", None).unwrap();
    assert_eq!(store.state()["count"], json!(8));
}
