//! Getters, caching, cross-references, watch, and action hooks.

#![cfg(test)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use arbor_store::{ActionHooks, ModuleDefinition, Store, StoreDefinition};
use serde_json::{json, Value};

#[test]
fn test_registered_module_getter_tracks_state() {
    let store = Store::new(StoreDefinition::new(ModuleDefinition::with_state(json!({}))))
        .unwrap();

    let module_a = ModuleDefinition::with_state(json!({"count": 2}))
        .namespaced(true)
        .mutation("set", |state, payload| {
            state["count"] = payload.cloned().unwrap_or(Value::Null);
        })
        .getter("double", |view| {
            json!(view.state()["count"].as_i64().unwrap_or(0) * 2)
        });
    store.register_module(&["a"], module_a).unwrap();

    assert_eq!(store.getter("a/double").unwrap(), json!(4));
    store.commit("a/set", json!(21)).unwrap();
    assert_eq!(store.getter("a/double").unwrap(), json!(42));
}

#[test]
fn test_getter_cross_reference_same_snapshot() {
    let root = ModuleDefinition::with_state(json!({"base": 3}))
        .getter("base", |view| view.state()["base"].clone())
        .getter("squared", |view| {
            let base = view.getter("base").unwrap().as_i64().unwrap_or(0);
            json!(base * base)
        })
        .module(
            "stats",
            ModuleDefinition::with_state(json!({}))
                .namespaced(true)
                .getter("report", |view| {
                    json!({
                        "base": view.root_getter("base").unwrap(),
                        "squared": view.root_getter("squared").unwrap(),
                    })
                }),
        );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    assert_eq!(store.getter("squared").unwrap(), json!(9));
    assert_eq!(
        store.getter("stats/report").unwrap(),
        json!({"base": 3, "squared": 9})
    );
}

#[test]
fn test_getter_cache_avoids_recompute() {
    let computes = Arc::new(AtomicUsize::new(0));
    let counter = computes.clone();
    let root = ModuleDefinition::with_state(json!({"count": 1}))
        .mutation("bump", |state, _| {
            state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
        })
        .getter("count", move |view| {
            counter.fetch_add(1, Ordering::SeqCst);
            view.state()["count"].clone()
        });
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    store.getter("count").unwrap();
    store.getter("count").unwrap();
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    store.commit("bump", None).unwrap();
    assert_eq!(store.getter("count").unwrap(), json!(2));
    assert!(computes.load(Ordering::SeqCst) >= 2);
}

#[test]
fn test_watch_selector_fires_on_change_only() {
    let root = ModuleDefinition::with_state(json!({"count": 0, "other": 0}))
        .mutation("bump", |state, _| {
            state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
        })
        .mutation("noise", |state, _| {
            state["other"] = json!(state["other"].as_i64().unwrap_or(0) + 1);
        });
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    let observed: Arc<Mutex<Vec<(Value, Value)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = observed.clone();
    let _guard = store.watch(
        |state, _| state["count"].clone(),
        move |new, old| sink.lock().unwrap().push((new.clone(), old.clone())),
    );

    store.commit("noise", None).unwrap();
    assert!(observed.lock().unwrap().is_empty());

    store.commit("bump", None).unwrap();
    assert_eq!(&*observed.lock().unwrap(), &[(json!(1), json!(0))]);
}

#[test]
fn test_watch_selector_can_use_getters() {
    let root = ModuleDefinition::with_state(json!({"count": 1}))
        .mutation("bump", |state, _| {
            state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
        })
        .getter("double", |view| {
            json!(view.state()["count"].as_i64().unwrap_or(0) * 2)
        });
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    let observed: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = observed.clone();
    let _guard = store.watch(
        |_, getters| getters.get("double").unwrap_or(Value::Null),
        move |new, _| sink.lock().unwrap().push(new.clone()),
    );

    store.commit("bump", None).unwrap();
    assert_eq!(&*observed.lock().unwrap(), &[json!(4)]);
}

#[tokio::test]
async fn test_action_hooks_before_and_after() {
    let root = ModuleDefinition::with_state(json!({"count": 0}))
        .mutation("bump", |state, _| {
            state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
        })
        .action("work", |ctx, _| async move {
            ctx.commit("bump", None)?;
            Ok(json!(null))
        });
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let before_sink = log.clone();
    let after_sink = log.clone();
    let _guard = store.subscribe_action(
        ActionHooks::new()
            .before(move |record, state| {
                before_sink.lock().unwrap().push(format!(
                    "before {} count={}",
                    record.kind, state["count"]
                ));
            })
            .after(move |record, state| {
                after_sink.lock().unwrap().push(format!(
                    "after {} count={}",
                    record.kind, state["count"]
                ));
            }),
    );

    store.dispatch("work", None).await.unwrap();
    assert_eq!(
        &*log.lock().unwrap(),
        &["before work count=0", "after work count=1"]
    );
}

#[tokio::test]
async fn test_action_error_hook_fires_per_failure() {
    crate::init_tracing();
    let root = ModuleDefinition::with_state(json!({}))
        .module(
            "a",
            ModuleDefinition::new()
                .action("go", |_, _| async { Err("first".into()) }),
        )
        .module(
            "b",
            ModuleDefinition::new()
                .action("go", |_, _| async { Err("second".into()) }),
        );
    let store = Store::new(StoreDefinition::new(root)).unwrap();

    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    let _guard = store.subscribe_action(ActionHooks::new().on_error(move |_, _, error| {
        sink.lock().unwrap().push(error.to_string());
    }));

    let result = store.dispatch("go", None).await;
    assert!(result.is_err());
    assert_eq!(&*errors.lock().unwrap(), &["first", "second"]);
}

#[test]
fn test_getter_keys_lists_registrations() {
    let root = ModuleDefinition::with_state(json!({"n": 0}))
        .getter("n", |view| view.state()["n"].clone())
        .module(
            "m",
            ModuleDefinition::with_state(json!({}))
                .namespaced(true)
                .getter("g", |_| json!(null)),
        );
    let store = Store::new(StoreDefinition::new(root)).unwrap();
    assert_eq!(store.getter_keys(), vec!["m/g".to_string(), "n".to_string()]);
}

#[test]
fn test_plugin_subscription_survives_via_forget() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let root = ModuleDefinition::with_state(json!({"count": 0})).mutation(
        "bump",
        |state, _| {
            state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
        },
    );
    let store = Store::new(StoreDefinition::new(root).plugin(move |store| {
        let counter = counter.clone();
        store
            .subscribe(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .forget();
    }))
    .unwrap();

    store.commit("bump", None).unwrap();
    store.commit("bump", None).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}
