//! Integration tests for AsyncEventEmitter dispatch.
//! Pure in-memory: no runtime services needed beyond a Tokio test runtime.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use promisekit_emitter::{
    AsyncEventEmitter, EmitError, EmitterConfig, Listener, ListenerHandle, ListenerOptions, Order,
};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Log = Arc<Mutex<Vec<&'static str>>>;

/// Emitter whose listeners record their name and return it.
fn named_emitter() -> (AsyncEventEmitter<(), &'static str>, Log) {
    (AsyncEventEmitter::new(), Arc::new(Mutex::new(Vec::new())))
}

fn register(
    emitter: &AsyncEventEmitter<(), &'static str>,
    log: &Log,
    name: &'static str,
    options: ListenerOptions,
) {
    let log = log.clone();
    emitter.on_with("evt", options, move |()| {
        log.lock().unwrap().push(name);
        async move { Ok(name) }
    });
}

/// A boolean listener that fails loudly if it is ever invoked.
fn tripwire(flag: &Arc<AtomicBool>) -> impl Fn(()) -> futures::future::Ready<Result<bool>> {
    let flag = flag.clone();
    move |()| {
        flag.store(true, Ordering::SeqCst);
        futures::future::ready(Err(anyhow!("should not have been called")))
    }
}

// =========================================================================
// Ordering
// =========================================================================

#[tokio::test]
async fn untagged_listeners_fire_in_registration_order() {
    let (emitter, log) = named_emitter();
    for name in ["a", "b", "c", "d"] {
        register(&emitter, &log, name, ListenerOptions::default());
    }

    let results = emitter.emit("evt", ()).await.unwrap();

    assert_eq!(results, vec!["a", "b", "c", "d"]);
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn last_tagged_listener_fires_after_all_others() {
    let (emitter, log) = named_emitter();
    register(&emitter, &log, "last-1", ListenerOptions::last());
    register(&emitter, &log, "a", ListenerOptions::default());
    register(&emitter, &log, "last-2", ListenerOptions::new().with_order(Order::Last));
    register(&emitter, &log, "b", ListenerOptions::new().with_order(Order::Normal));

    let results = emitter.emit("evt", ()).await.unwrap();

    assert_eq!(results, vec!["a", "b", "last-1", "last-2"]);
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "last-1", "last-2"]);
}

#[tokio::test]
async fn listeners_never_overlap_even_when_they_suspend() {
    let emitter: AsyncEventEmitter<(), usize> = AsyncEventEmitter::new();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for i in 0..4 {
        let running = running.clone();
        let peak = peak.clone();
        emitter.on("evt", move |()| {
            let running = running.clone();
            let peak = peak.clone();
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(i)
            }
        });
    }

    let results = emitter.emit("evt", ()).await.unwrap();

    assert_eq!(results, vec![0, 1, 2, 3]);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

// =========================================================================
// Aggregation (chain mode)
// =========================================================================

#[tokio::test]
async fn emit_collects_one_result_per_listener_in_order() {
    let emitter: AsyncEventEmitter = AsyncEventEmitter::new();
    emitter.on("values", |_| async { Ok(json!(1)) });
    emitter.on("values", |_| async { Ok(json!("two")) });
    emitter.on("values", |_| async { Ok(Value::Null) });
    emitter.on("values", |_| async { Ok(json!({"four": 4})) });

    let results = emitter.emit("values", vec![]).await.unwrap();

    // A listener resolving to null still occupies its slot.
    assert_eq!(results, vec![json!(1), json!("two"), Value::Null, json!({"four": 4})]);
}

#[tokio::test]
async fn results_follow_registration_order_not_completion_order() {
    let emitter: AsyncEventEmitter<(), u64> = AsyncEventEmitter::new();
    for delay_ms in [30_u64, 1, 15] {
        emitter.on("evt", move |()| async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(delay_ms)
        });
    }

    let results = emitter.emit("evt", ()).await.unwrap();

    assert_eq!(results, vec![30, 1, 15]);
}

#[tokio::test]
async fn sum_listener_concatenates_positional_args() {
    let emitter: AsyncEventEmitter<(String, String), String> = AsyncEventEmitter::new();
    emitter.on("sum", |(a, b): (String, String)| async move { Ok(a + &b) });

    let results = emitter
        .emit("sum", ("x".to_string(), "y".to_string()))
        .await
        .unwrap();

    assert_eq!(results, vec!["xy".to_string()]);
}

#[tokio::test]
async fn json_args_reach_every_listener() {
    let emitter: AsyncEventEmitter = AsyncEventEmitter::new();
    for _ in 0..2 {
        emitter.on("test1", |args: Vec<Value>| async move {
            assert_eq!(args, vec![json!("11"), json!("22")]);
            Ok(json!(true))
        });
    }

    let results = emitter
        .emit("test1", vec![json!("11"), json!("22")])
        .await
        .unwrap();

    assert_eq!(results, vec![json!(true), json!(true)]);
}

#[tokio::test]
async fn single_listener_yields_single_result() {
    let emitter: AsyncEventEmitter = AsyncEventEmitter::new();
    emitter.on("test1", |args: Vec<Value>| async move {
        assert_eq!(args, vec![json!("11"), json!("22")]);
        Ok(json!(true))
    });

    let results = emitter
        .emit("test1", vec![json!("11"), json!("22")])
        .await
        .unwrap();

    assert_eq!(results, vec![json!(true)]);
}

// =========================================================================
// Short-circuit modes
// =========================================================================

#[tokio::test]
async fn emit_or_stops_at_first_truthy_result() {
    let emitter: AsyncEventEmitter<(), bool> = AsyncEventEmitter::new();
    let tripped = Arc::new(AtomicBool::new(false));
    emitter.on("check", |()| async { Ok(false) });
    emitter.on("check", |()| async { Ok(true) });
    emitter.on("check", tripwire(&tripped));

    assert!(emitter.emit_or("check", ()).await.unwrap());
    assert!(!tripped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn emit_and_stops_at_first_falsy_result() {
    let emitter: AsyncEventEmitter<(), bool> = AsyncEventEmitter::new();
    let tripped = Arc::new(AtomicBool::new(false));
    emitter.on("check", |()| async { Ok(true) });
    emitter.on("check", |()| async { Ok(false) });
    emitter.on("check", tripwire(&tripped));

    assert!(!emitter.emit_and("check", ()).await.unwrap());
    assert!(!tripped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn emit_or_returns_the_truthy_value_itself() {
    let emitter: AsyncEventEmitter = AsyncEventEmitter::new();
    emitter.on("resolve", |_| async { Ok(Value::Null) });
    emitter.on("resolve", |_| async { Ok(json!("")) });
    emitter.on("resolve", |_| async { Ok(json!({"handler": "cache"})) });
    emitter.on("resolve", |_| async { Ok(json!({"handler": "origin"})) });

    let winner = emitter.emit_or("resolve", vec![]).await.unwrap();

    assert_eq!(winner, json!({"handler": "cache"}));
}

#[tokio::test]
async fn emit_or_without_a_winner_ends_on_the_last_result() {
    let emitter: AsyncEventEmitter = AsyncEventEmitter::new();
    emitter.on("resolve", |_| async { Ok(json!(false)) });
    emitter.on("resolve", |_| async { Ok(json!(0)) });

    let outcome = emitter.emit_or("resolve", vec![]).await.unwrap();

    assert_eq!(outcome, json!(0));
}

#[tokio::test]
async fn emit_and_returns_the_falsy_value_itself() {
    let emitter: AsyncEventEmitter = AsyncEventEmitter::new();
    emitter.on("validate", |_| async { Ok(json!("ok")) });
    emitter.on("validate", |_| async { Ok(json!(0)) });
    emitter.on("validate", |_| async { Ok(json!("never")) });

    let verdict = emitter.emit_and("validate", vec![]).await.unwrap();

    assert_eq!(verdict, json!(0));
}

#[tokio::test]
async fn short_circuit_modes_respect_last_ordering() {
    let emitter: AsyncEventEmitter<(), bool> = AsyncEventEmitter::new();
    let tripped = Arc::new(AtomicBool::new(false));
    // Registered first, but tagged last: the truthy listener wins before it runs.
    emitter.on_with("check", ListenerOptions::last(), tripwire(&tripped));
    emitter.on("check", |()| async { Ok(true) });

    assert!(emitter.emit_or("check", ()).await.unwrap());
    assert!(!tripped.load(Ordering::SeqCst));
}

// =========================================================================
// Empty events
// =========================================================================

#[tokio::test]
async fn unregistered_event_yields_neutral_results() {
    let emitter: AsyncEventEmitter = AsyncEventEmitter::new();

    assert!(emitter.emit("unregistered", vec![]).await.unwrap().is_empty());
    assert_eq!(emitter.emit_or("unregistered", vec![]).await.unwrap(), json!(false));
    assert_eq!(emitter.emit_and("unregistered", vec![]).await.unwrap(), json!(true));
}

// =========================================================================
// Removal and clearing
// =========================================================================

#[tokio::test]
async fn removing_a_handle_silences_only_that_listener() {
    let (emitter, log) = named_emitter();
    register(&emitter, &log, "keep-1", ListenerOptions::default());
    let log_clone = log.clone();
    let handle = emitter.on("evt", move |()| {
        log_clone.lock().unwrap().push("gone");
        async { Ok("gone") }
    });
    register(&emitter, &log, "keep-2", ListenerOptions::default());

    assert!(handle.remove());
    let results = emitter.emit("evt", ()).await.unwrap();

    assert_eq!(results, vec!["keep-1", "keep-2"]);
    assert!(!log.lock().unwrap().contains(&"gone"));
}

#[tokio::test]
async fn same_function_registered_twice_is_removed_independently() {
    let emitter: AsyncEventEmitter<(), u32> = AsyncEventEmitter::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let listener = Arc::new(move |()| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { anyhow::Ok(7_u32) }
    });

    let first = {
        let listener = listener.clone();
        emitter.on("evt", move |args| listener(args))
    };
    let second = {
        let listener = listener.clone();
        emitter.on("evt", move |args| listener(args))
    };
    assert_ne!(first.id(), second.id());

    assert!(first.remove());
    let results = emitter.emit("evt", ()).await.unwrap();

    assert_eq!(results, vec![7]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn double_removal_is_a_no_op() {
    let emitter: AsyncEventEmitter<(), u8> = AsyncEventEmitter::new();
    let handle = emitter.on("evt", |()| async { Ok(1) });

    assert!(handle.remove());
    assert!(!handle.remove());
    assert_eq!(emitter.listener_count("evt"), 0);
}

#[tokio::test]
async fn removal_after_clear_is_a_no_op() {
    let emitter: AsyncEventEmitter<(), u8> = AsyncEventEmitter::new();
    let handle = emitter.on("evt", |()| async { Ok(1) });

    emitter.clear(["evt"]);

    assert!(!handle.remove());
}

#[tokio::test]
async fn handle_outliving_its_emitter_is_harmless() {
    let emitter: AsyncEventEmitter<(), u8> = AsyncEventEmitter::new();
    let handle = emitter.on("evt", |()| async { Ok(1) });
    drop(emitter);

    assert!(!handle.remove());
}

#[tokio::test]
async fn clear_removes_every_named_event() {
    let emitter: AsyncEventEmitter = AsyncEventEmitter::new();
    emitter.on("e1", |_| async { Ok(json!(1)) });
    emitter.on_with("e1", ListenerOptions::last(), |_| async { Ok(json!(2)) });
    emitter.on("e2", |_| async { Ok(json!(3)) });
    emitter.on("e3", |_| async { Ok(json!(4)) });

    emitter.clear(["e1", "e2"]);

    assert!(emitter.emit("e1", vec![]).await.unwrap().is_empty());
    assert_eq!(emitter.emit_or("e1", vec![]).await.unwrap(), json!(false));
    assert_eq!(emitter.emit_and("e2", vec![]).await.unwrap(), json!(true));
    assert_eq!(emitter.emit("e3", vec![]).await.unwrap(), vec![json!(4)]);
    assert_eq!(emitter.event_names(), vec!["e3".to_string()]);
}

#[tokio::test]
async fn clear_all_empties_the_registry() {
    let emitter: AsyncEventEmitter<(), u8> = AsyncEventEmitter::new();
    emitter.on("a", |()| async { Ok(1) });
    emitter.on("b", |()| async { Ok(2) });

    emitter.clear_all();

    assert!(emitter.event_names().is_empty());
}

#[tokio::test]
async fn removal_during_dispatch_applies_to_the_next_dispatch() {
    let emitter: AsyncEventEmitter<(), &'static str> = AsyncEventEmitter::new();
    let victim: Arc<Mutex<Option<ListenerHandle<(), &'static str>>>> = Arc::default();

    let slot = victim.clone();
    emitter.on("evt", move |()| {
        // Unregister the second listener while this dispatch is running.
        if let Some(handle) = slot.lock().unwrap().take() {
            handle.remove();
        }
        async { Ok("remover") }
    });
    let handle = emitter.on("evt", |()| async { Ok("victim") });
    *victim.lock().unwrap() = Some(handle);

    let first = emitter.emit("evt", ()).await.unwrap();
    let second = emitter.emit("evt", ()).await.unwrap();

    assert_eq!(first, vec!["remover", "victim"]);
    assert_eq!(second, vec!["remover"]);
}

// =========================================================================
// Failures
// =========================================================================

#[tokio::test]
async fn failing_listener_rejects_emit_and_stops_the_chain() {
    let emitter: AsyncEventEmitter<(), u8> = AsyncEventEmitter::new();
    let tail_ran = Arc::new(AtomicBool::new(false));
    emitter.on("evt", |()| async { Ok(1) });
    emitter.on("evt", |()| async { Err(anyhow!("listener exploded")) });
    let flag = tail_ran.clone();
    emitter.on("evt", move |()| {
        flag.store(true, Ordering::SeqCst);
        async { Ok(3) }
    });

    let err = emitter.emit("evt", ()).await.unwrap_err();

    assert!(matches!(err, EmitError::Listener { index: 1, .. }));
    assert_eq!(err.event(), "evt");
    assert_eq!(err.index(), 1);
    assert!(err.to_string().contains("listener exploded"));
    assert!(!tail_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failing_listener_rejects_emit_or_immediately() {
    let emitter: AsyncEventEmitter<(), bool> = AsyncEventEmitter::new();
    let tripped = Arc::new(AtomicBool::new(false));
    emitter.on("check", |()| async { Ok(false) });
    emitter.on("check", |()| async { Err(anyhow!("lookup failed")) });
    emitter.on("check", tripwire(&tripped));

    let err = emitter.emit_or("check", ()).await.unwrap_err();

    assert_eq!(err.index(), 1);
    assert!(!tripped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failing_listener_rejects_emit_and_immediately() {
    let emitter: AsyncEventEmitter<(), bool> = AsyncEventEmitter::new();
    let tripped = Arc::new(AtomicBool::new(false));
    emitter.on("check", |()| async { Err(anyhow!("validator crashed")) });
    emitter.on("check", tripwire(&tripped));

    let err = emitter.emit_and("check", ()).await.unwrap_err();

    assert_eq!(err.index(), 0);
    assert!(!tripped.load(Ordering::SeqCst));
}

// =========================================================================
// Instances, context and trait listeners
// =========================================================================

#[tokio::test]
async fn separate_emitters_do_not_share_listeners() {
    let left: AsyncEventEmitter<(), u8> = AsyncEventEmitter::new();
    let right: AsyncEventEmitter<(), u8> = AsyncEventEmitter::new();
    left.on("evt", |()| async { Ok(1) });

    assert_eq!(left.emit("evt", ()).await.unwrap(), vec![1]);
    assert!(right.emit("evt", ()).await.unwrap().is_empty());
}

#[tokio::test]
async fn clones_share_one_registry() {
    let emitter: AsyncEventEmitter<(), u8> = AsyncEventEmitter::new();
    let clone = emitter.clone();
    clone.on("evt", |()| async { Ok(9) });

    assert_eq!(emitter.emit("evt", ()).await.unwrap(), vec![9]);
}

#[tokio::test]
async fn listener_can_re_emit_through_a_weak_emitter() {
    let emitter: AsyncEventEmitter<u32, u32> = AsyncEventEmitter::new();
    emitter.on("double", |n| async move { Ok(n * 2) });

    let context = emitter.downgrade();
    emitter.on("quadruple", move |n| {
        let context = context.upgrade();
        async move {
            let context = context.ok_or_else(|| anyhow!("emitter dropped"))?;
            let doubled = context.emit("double", n).await?;
            let twice = context.emit("double", doubled[0]).await?;
            anyhow::Ok(twice[0])
        }
    });

    assert_eq!(emitter.emit("quadruple", 5).await.unwrap(), vec![20]);
}

/// Flips its flag when dropped, i.e. when the listener owning it is freed.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn listener_holding_a_weak_emitter_is_freed_with_the_emitter() {
    let freed = Arc::new(AtomicBool::new(false));
    let emitter: AsyncEventEmitter<u32, u32> = AsyncEventEmitter::new();

    let context = emitter.downgrade();
    let flag = DropFlag(freed.clone());
    let handle = emitter.on("echo", move |n| {
        let _keep = &flag;
        let alive = context.upgrade().is_some();
        async move { anyhow::Ok(if alive { n } else { 0 }) }
    });

    assert_eq!(emitter.emit("echo", 4).await.unwrap(), vec![4]);

    let weak = emitter.downgrade();
    drop(emitter);

    assert!(freed.load(Ordering::SeqCst));
    assert!(weak.upgrade().is_none());
    assert!(!handle.remove());
}

#[tokio::test]
async fn weak_emitter_upgrades_to_the_same_registry() {
    let emitter: AsyncEventEmitter<(), u8> = AsyncEventEmitter::new();
    let weak = emitter.downgrade();

    let upgraded = weak.upgrade().unwrap();
    upgraded.on("evt", |()| async { Ok(3) });

    assert_eq!(emitter.listener_count("evt"), 1);
    assert_eq!(emitter.emit("evt", ()).await.unwrap(), vec![3]);
}

struct Threshold {
    min: i64,
    seen: AtomicUsize,
}

#[async_trait]
impl Listener<i64, bool> for Threshold {
    async fn call(&self, value: i64) -> Result<bool> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        Ok(value >= self.min)
    }
}

#[tokio::test]
async fn trait_listeners_participate_like_closures() {
    let emitter: AsyncEventEmitter<i64, bool> = AsyncEventEmitter::new();
    emitter.subscribe(
        "accept",
        ListenerOptions::default(),
        Threshold {
            min: 10,
            seen: AtomicUsize::new(0),
        },
    );
    emitter.on_with("accept", ListenerOptions::last(), |value: i64| async move {
        Ok(value % 2 == 0)
    });

    assert!(emitter.emit_and("accept", 12).await.unwrap());
    assert!(!emitter.emit_and("accept", 11).await.unwrap());
    assert!(!emitter.emit_and("accept", 4).await.unwrap());
}

#[tokio::test]
async fn configured_emitter_still_dispatches() {
    let config = EmitterConfig::default()
        .with_label("slow-path")
        .with_slow_listener_threshold(Duration::from_millis(1))
        .with_trace_dispatch(true);
    let emitter: AsyncEventEmitter<(), u8> = AsyncEventEmitter::with_config(config);
    emitter.on("evt", |()| async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(1)
    });

    assert_eq!(emitter.config().label, "slow-path");
    assert_eq!(emitter.emit("evt", ()).await.unwrap(), vec![1]);
}
