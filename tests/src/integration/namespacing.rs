//! Namespace routing: prefixed keys, global fan-out, inherited prefixes,
//! and root escape from namespaced action contexts.

#![cfg(test)]

use std::sync::{Arc, Mutex};

use arbor_store::{ModuleDefinition, Store, StoreDefinition, StoreError};
use serde_json::{json, Value};

#[test]
fn test_namespaced_mutation_reachable_only_with_prefix() {
    let root = ModuleDefinition::with_state(json!({})).module(
        "cart",
        ModuleDefinition::with_state(json!({"items": 0}))
            .namespaced(true)
            .mutation("add", |state, _| {
                state["items"] = json!(state["items"].as_i64().unwrap_or(0) + 1);
            }),
    );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    store.commit("cart/add", None).unwrap();
    assert_eq!(store.state()["cart"]["items"], json!(1));

    // The bare name does not reach the namespaced module.
    let err = store.commit("add", None).unwrap_err();
    assert!(matches!(err, StoreError::UnknownMutation { .. }));
    assert_eq!(store.state()["cart"]["items"], json!(1));
}

#[test]
fn test_non_namespaced_fan_out_in_registration_order() {
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let root_sink = order.clone();
    let a_sink = order.clone();
    let b_sink = order.clone();

    let root = ModuleDefinition::with_state(json!({}))
        .mutation("reset", move |_, _| root_sink.lock().unwrap().push("root"))
        .module(
            "a",
            ModuleDefinition::new().mutation("reset", move |_, _| a_sink.lock().unwrap().push("a")),
        )
        .module(
            "b",
            ModuleDefinition::new().mutation("reset", move |_, _| b_sink.lock().unwrap().push("b")),
        );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    store.commit("reset", None).unwrap();
    assert_eq!(&*order.lock().unwrap(), &["root", "a", "b"]);
}

#[test]
fn test_fan_out_handlers_receive_own_subtree() {
    let root = ModuleDefinition::with_state(json!({"hits": 0}))
        .mutation("tick", |state, _| {
            state["hits"] = json!(state["hits"].as_i64().unwrap_or(0) + 1);
        })
        .module(
            "child",
            ModuleDefinition::with_state(json!({"hits": 10})).mutation("tick", |state, _| {
                state["hits"] = json!(state["hits"].as_i64().unwrap_or(0) + 1);
            }),
        );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    store.commit("tick", None).unwrap();
    assert_eq!(store.state()["hits"], json!(1));
    assert_eq!(store.state()["child"]["hits"], json!(11));
}

#[test]
fn test_nested_namespace_inheritance() {
    // `outer` is namespaced, `flat` is not, `inner` is: names resolve to
    // outer/..., outer/... and outer/inner/... respectively.
    let root = ModuleDefinition::with_state(json!({})).module(
        "outer",
        ModuleDefinition::with_state(json!({"v": 0}))
            .namespaced(true)
            .mutation("set", |state, payload| {
                state["v"] = payload.cloned().unwrap_or(Value::Null);
            })
            .module(
                "flat",
                ModuleDefinition::with_state(json!({"v": 0})).mutation("mark", |state, _| {
                    state["v"] = json!(true);
                }),
            )
            .module(
                "inner",
                ModuleDefinition::with_state(json!({"v": 0}))
                    .namespaced(true)
                    .mutation("mark", |state, _| {
                        state["v"] = json!(true);
                    }),
            ),
    );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    store.commit("outer/set", json!(5)).unwrap();
    store.commit("outer/mark", None).unwrap();
    store.commit("outer/inner/mark", None).unwrap();

    let state = store.state();
    assert_eq!(state["outer"]["v"], json!(5));
    assert_eq!(state["outer"]["flat"]["v"], json!(true));
    assert_eq!(state["outer"]["inner"]["v"], json!(true));
}

#[tokio::test]
async fn test_action_context_commits_in_own_namespace() {
    let root = ModuleDefinition::with_state(json!({})).module(
        "auth",
        ModuleDefinition::with_state(json!({"user": null}))
            .namespaced(true)
            .mutation("setUser", |state, payload| {
                state["user"] = payload.cloned().unwrap_or(Value::Null);
            })
            .action("login", |ctx, payload| async move {
                // Unprefixed name resolves inside the module's namespace.
                ctx.commit("setUser", payload)?;
                Ok(json!("ok"))
            }),
    );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    store.dispatch("auth/login", json!("ada")).await.unwrap();
    assert_eq!(store.state()["auth"]["user"], json!("ada"));
}

#[tokio::test]
async fn test_root_escape_from_namespaced_context() {
    let root = ModuleDefinition::with_state(json!({"announcements": 0}))
        .mutation("announce", |state, _| {
            state["announcements"] = json!(state["announcements"].as_i64().unwrap_or(0) + 1);
        })
        .module(
            "deep",
            ModuleDefinition::with_state(json!({}))
                .namespaced(true)
                .action("shout", |ctx, _| async move {
                    // Bypass the module's namespace and hit the global key.
                    ctx.commit_root("announce", None)?;
                    Ok(json!(null))
                }),
        );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    store.dispatch("deep/shout", None).await.unwrap();
    assert_eq!(store.state()["announcements"], json!(1));
}

#[tokio::test]
async fn test_root_registered_action_keeps_local_context() {
    let root = ModuleDefinition::with_state(json!({})).module(
        "session",
        ModuleDefinition::with_state(json!({"active": true}))
            .namespaced(true)
            .mutation("deactivate", |state, _| {
                state["active"] = json!(false);
            })
            .action_root("globalLogout", |ctx, _| async move {
                // Registered under the bare key, but commits still resolve
                // inside the module's own namespace.
                ctx.commit("deactivate", None)?;
                Ok(json!(null))
            }),
    );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    store.dispatch("globalLogout", None).await.unwrap();
    assert_eq!(store.state()["session"]["active"], json!(false));

    let err = store.dispatch("session/globalLogout", None).await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownAction { .. }));
}

#[test]
fn test_module_namespace_query() {
    let root = ModuleDefinition::with_state(json!({})).module(
        "a",
        ModuleDefinition::new()
            .namespaced(true)
            .module("b", ModuleDefinition::new())
            .module("c", ModuleDefinition::new().namespaced(true)),
    );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    assert_eq!(store.module_namespace(&["a"]).unwrap(), "a/");
    assert_eq!(store.module_namespace(&["a", "b"]).unwrap(), "a/");
    assert_eq!(store.module_namespace(&["a", "c"]).unwrap(), "a/c/");
}
