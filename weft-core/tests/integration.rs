//! Integration Tests for Reactive System
//!
//! These tests verify that objects, refs, effects, computeds and watchers
//! work together correctly.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use weft_core::reactive::{ReactiveContext, Runtime, Value, WatchSource};
use weft_core::{ReactiveError, RuntimeConfig};

fn count_of(value: Value) -> i64 {
    value.as_i64().unwrap_or(-1)
}

/// The canonical scenario: repeated writes of the same value are dropped.
#[test]
fn effect_log_skips_equal_writes() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "count": 0 })).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let (state, l) = (s.clone(), log.clone());
    rt.effect(move || {
        l.lock().push(count_of(state.get("count")?));
        Ok(())
    })
    .unwrap();

    s.set("count", 1).unwrap();
    s.set("count", 1).unwrap();
    s.set("count", 2).unwrap();

    assert_eq!(*log.lock(), vec![0, 1, 2]);
}

/// Writing a key the effect never read does not re-run it.
#[test]
fn effect_only_tracks_what_it_reads() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "count": 0, "name": "weft" })).unwrap();
    let runs = Arc::new(AtomicI32::new(0));

    let (state, r) = (s.clone(), runs.clone());
    rt.effect(move || {
        state.get("count")?;
        r.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    s.set("name", "weft!").unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    s.set("count", 5).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Stale subscriptions from an earlier branch are cleared on re-run.
#[test]
fn branch_switch_drops_stale_dependencies() {
    let rt = Runtime::new();
    let s = rt
        .reactive_object(json!({ "use_a": false, "a": 1, "b": 2 }))
        .unwrap();
    let runs = Arc::new(AtomicI32::new(0));

    let (state, r) = (s.clone(), runs.clone());
    let effect = rt
        .effect(move || {
            r.fetch_add(1, Ordering::SeqCst);
            if state.get("use_a")?.as_bool().unwrap_or(false) {
                state.get("a")?;
            } else {
                state.get("b")?;
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(s.dependent_count("b"), 1);

    s.set("use_a", true).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(s.dependent_count("b"), 0);
    assert_eq!(effect.dependency_count(), 2);

    // b is no longer read: writing it must not re-run the effect.
    s.set("b", 20).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    s.set("a", 10).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// Reads outside of any effect register nothing.
#[test]
fn untracked_reads_are_not_recorded() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "count": 0 })).unwrap();

    assert_eq!(count_of(s.get("count").unwrap()), 0);
    assert_eq!(s.dependent_count("count"), 0);

    // Nor do reads inside an untracked block within an effect.
    let state = s.clone();
    let runtime = rt.clone();
    let runs = Arc::new(AtomicI32::new(0));
    let r = runs.clone();
    rt.effect(move || {
        runtime.untrack(|| state.get("count"))?;
        r.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    s.set("count", 1).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Reading the same computed twice without a write evaluates once.
#[test]
fn computed_memoizes_and_invalidates() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "count": 1 })).unwrap();
    let calls = Arc::new(AtomicI32::new(0));

    let (state, c) = (s.clone(), calls.clone());
    let doubled = rt.computed(move || {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(count_of(state.get("count")?) * 2)
    });

    assert_eq!(doubled.get().unwrap(), 2);
    assert_eq!(doubled.get().unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    s.set("count", 5).unwrap();
    // Invalidated but not recomputed until read.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(doubled.get().unwrap(), 10);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// An effect reading a computed re-runs when the computed's source changes.
#[test]
fn effect_depends_on_computed() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "count": 1 })).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let state = s.clone();
    let times_five = rt.computed(move || Ok(count_of(state.get("count")?) * 5));

    let (c, log) = (times_five.clone(), seen.clone());
    rt.effect(move || {
        log.lock().push(c.get()?);
        Ok(())
    })
    .unwrap();

    s.set("count", 2).unwrap();
    s.set("count", 3).unwrap();

    assert_eq!(*seen.lock(), vec![5, 10, 15]);
    assert_eq!(times_five.evaluations(), 3);
}

/// A change three levels down reaches the top-level effect.
#[test]
fn nested_computeds_propagate_transitively() {
    let rt = Runtime::new();
    let base = rt.reference(1);

    let b = base.clone();
    let doubled = rt.computed(move || Ok(b.get() * 2));

    let d = doubled.clone();
    let plus_ten = rt.computed(move || Ok(d.get()? + 10));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (p, log) = (plus_ten.clone(), seen.clone());
    rt.effect(move || {
        log.lock().push(p.get()?);
        Ok(())
    })
    .unwrap();

    base.set(5).unwrap();

    assert_eq!(*seen.lock(), vec![12, 20]);
    assert_eq!(doubled.get().unwrap(), 10);
    assert_eq!(plus_ten.get().unwrap(), 20);
    assert_eq!(doubled.dependent_count(), 1);
}

/// An effect that reads a source before a computed of that source never
/// sees the computed's value from before the write.
#[test]
fn effect_reading_source_first_sees_fresh_computed() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "x": 1 })).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let state = s.clone();
    let doubled = rt.computed(move || Ok(count_of(state.get("x")?) * 2));

    let (state, d, log) = (s.clone(), doubled.clone(), seen.clone());
    let effect = rt
        .effect(move || {
            let x = count_of(state.get("x")?);
            log.lock().push((x, d.get()?));
            Ok(())
        })
        .unwrap();

    s.set("x", 2).unwrap();
    s.set("x", 3).unwrap();

    let seen = seen.lock();
    for &(x, twice) in seen.iter() {
        assert_eq!(twice, x * 2, "inconsistent pair in {:?}", *seen);
    }
    assert_eq!(*seen, vec![(1, 2), (2, 4), (3, 6)]);
    assert_eq!(effect.run_count(), 3);
}

/// A write reaching one effect along several computed paths re-runs it once,
/// with every computed on those paths already invalidated.
#[test]
fn diamond_of_computeds_reruns_effect_once() {
    let rt = Runtime::new();
    let x = rt.reference(1);

    let x1 = x.clone();
    let plus_one = rt.computed(move || Ok(x1.get() + 1));
    let x2 = x.clone();
    let times_ten = rt.computed(move || Ok(x2.get() * 10));
    let (a, b) = (plus_one.clone(), times_ten.clone());
    let sum = rt.computed(move || Ok(a.get()? + b.get()?));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (x3, total, log) = (x.clone(), sum.clone(), seen.clone());
    let effect = rt
        .effect(move || {
            let x = x3.get();
            log.lock().push((x, total.get()?));
            Ok(())
        })
        .unwrap();

    x.set(2).unwrap();

    assert_eq!(*seen.lock(), vec![(1, 12), (2, 23)]);
    assert_eq!(effect.run_count(), 2);
    assert_eq!(sum.evaluations(), 2);
}

/// Watch callbacks fire only on change, with new and old values.
#[test]
fn watch_reports_changes_only() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "count": 0 })).unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let (state, log) = (s.clone(), calls.clone());
    rt.watch(
        WatchSource::getter(move || Ok(count_of(state.get("count")?))),
        move |new, old| {
            log.lock().push((*new, *old));
            Ok(())
        },
    )
    .unwrap();

    assert!(calls.lock().is_empty());

    s.set("count", 1).unwrap();
    s.set("count", 2).unwrap();

    assert_eq!(*calls.lock(), vec![(1, 0), (2, 1)]);
}

/// Nested objects are wrapped, so nested writes re-run effects.
#[test]
fn nested_object_writes_trigger() {
    let rt = Runtime::new();
    let s = rt
        .reactive_object(json!({ "user": { "name": "Alice", "age": 25 } }))
        .unwrap();
    let names = Arc::new(Mutex::new(Vec::new()));

    let (state, log) = (s.clone(), names.clone());
    rt.watch_effect(move || {
        let user = state.get("user")?;
        let name = match user.as_object() {
            Some(user) => user.get("name")?,
            None => Value::Null,
        };
        log.lock().push(name.as_str().unwrap_or_default().to_owned());
        Ok(())
    })
    .unwrap();

    let user = s.get("user").unwrap();
    user.as_object().unwrap().set("name", "Vob").unwrap();

    // Replacing the nested object re-runs through the outer key.
    s.set_json("user", json!({ "name": "Bob", "age": 30 })).unwrap();

    // The old nested object is no longer read.
    user.as_object().unwrap().set("name", "Nobody").unwrap();

    assert_eq!(*names.lock(), vec!["Alice", "Vob", "Bob"]);
}

/// Errors from re-runs surface at the write that caused them.
#[test]
fn rerun_error_propagates_to_writer() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "count": 0 })).unwrap();

    let state = s.clone();
    rt.effect(move || {
        if count_of(state.get("count")?) > 1 {
            return Err(ReactiveError::callback("count too large"));
        }
        Ok(())
    })
    .unwrap();

    s.set("count", 1).unwrap();
    let err = s.set("count", 2).unwrap_err();
    assert!(matches!(err, ReactiveError::Callback(_)));

    // The value was stored and tracking still works afterwards.
    assert_eq!(count_of(s.get_untracked("count").unwrap()), 2);
    assert_eq!(ReactiveContext::depth(), 0);
    s.set("count", 0).unwrap();
}

/// A panicking effect does not leave its frame on the context stack.
#[test]
fn panic_in_effect_unwinds_context() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "count": 0 })).unwrap();
    let runs = Arc::new(AtomicI32::new(0));

    let (state, r) = (s.clone(), runs.clone());
    rt.effect(move || {
        let count = count_of(state.get("count")?);
        r.fetch_add(1, Ordering::SeqCst);
        if count == 1 {
            panic!("effect blew up");
        }
        Ok(())
    })
    .unwrap();

    let writer = s.clone();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| writer.set("count", 1)));
    assert!(result.is_err());
    assert_eq!(ReactiveContext::depth(), 0);
    assert!(!ReactiveContext::is_tracking());

    // The effect read `count` before panicking, so it is still subscribed.
    s.set("count", 2).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// Disposed effects never run again.
#[test]
fn disposed_effect_does_not_run() {
    let rt = Runtime::new();
    let r = rt.reference(0);
    let runs = Arc::new(AtomicI32::new(0));

    let (r2, counter) = (r.clone(), runs.clone());
    let effect = rt
        .effect(move || {
            r2.get();
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    effect.dispose();
    r.set(1).unwrap();
    r.set(2).unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// An effect writing what it reads fails with a recursion error instead of
/// overflowing the stack.
#[test]
fn recursion_guard_reports_error() {
    let rt = Runtime::with_config(RuntimeConfig {
        max_effect_depth: Some(8),
    });
    let s = rt.reactive_object(json!({ "n": 0 })).unwrap();

    let state = s.clone();
    let err = rt
        .effect(move || {
            let n = count_of(state.get("n")?);
            state.set("n", n + 1)
        })
        .unwrap_err();

    assert!(matches!(err, ReactiveError::RecursionLimit { limit: 8 }));
    assert_eq!(ReactiveContext::depth(), 0);
}

/// An effect that writes back the value it read settles immediately.
#[test]
fn idempotent_self_write_settles() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "n": 3 })).unwrap();
    let runs = Arc::new(AtomicI32::new(0));

    let (state, r) = (s.clone(), runs.clone());
    rt.effect(move || {
        r.fetch_add(1, Ordering::SeqCst);
        let n = state.get("n")?;
        state.set("n", n)
    })
    .unwrap();

    s.set("n", 4).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Independent runtimes never observe each other's computations.
#[test]
fn runtimes_are_isolated() {
    let rt1 = Runtime::new();
    let rt2 = Runtime::new();
    let foreign = rt2.reactive_object(json!({ "x": 0 })).unwrap();
    let runs = Arc::new(AtomicI32::new(0));

    let (f, r) = (foreign.clone(), runs.clone());
    rt1.effect(move || {
        f.get("x")?;
        r.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    assert_eq!(foreign.dependent_count("x"), 0);
    foreign.set("x", 1).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Writes from another thread re-run effects on that thread.
#[test]
fn writes_from_another_thread() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "count": 0 })).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let (state, log) = (s.clone(), seen.clone());
    rt.effect(move || {
        log.lock().push(count_of(state.get("count")?));
        Ok(())
    })
    .unwrap();

    let writer = s.clone();
    std::thread::spawn(move || writer.set("count", 7))
        .join()
        .unwrap()
        .unwrap();

    assert_eq!(*seen.lock(), vec![0, 7]);
    assert_eq!(s.dependent_count("count"), 1);
}

/// Known hazard: a dependent may re-subscribe itself while its bucket is
/// being triggered. Triggering iterates a snapshot, so this is safe, but the
/// number of runs per write is not fixed. Only completion and the final state
/// are asserted.
#[test]
fn bucket_mutation_during_trigger_completes() {
    let rt = Runtime::new();
    let s = rt.reactive_object(json!({ "flag": 0, "mirror": 0 })).unwrap();
    let last_seen = Arc::new(Mutex::new(-1));

    // First dependent of `flag`: copies it into `mirror`.
    let state = s.clone();
    rt.effect(move || {
        let flag = state.get("flag")?;
        state.set("mirror", flag)
    })
    .unwrap();

    // Second dependent of `flag`: also reads `mirror`, so the first effect's
    // write re-runs it (and re-records it on `flag`) mid-trigger.
    let (state, last) = (s.clone(), last_seen.clone());
    let second = rt
        .effect(move || {
            let flag = count_of(state.get("flag")?);
            let mirror = count_of(state.get("mirror")?);
            *last.lock() = flag + mirror;
            Ok(())
        })
        .unwrap();

    s.set("flag", 1).unwrap();

    assert_eq!(*last_seen.lock(), 2);
    assert!(second.run_count() >= 2);
    assert_eq!(s.dependent_count("flag"), 2);
}
