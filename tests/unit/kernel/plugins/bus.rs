use super::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn emit_reaches_handlers_in_subscription_order() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let _a = bus.on("save", {
        let seen = seen.clone();
        move |payload| seen.lock().push(format!("a:{}", payload["file"]))
    });
    let _b = bus.on("save", {
        let seen = seen.clone();
        move |payload| seen.lock().push(format!("b:{}", payload["file"]))
    });

    assert_eq!(bus.emit("save", &json!({ "file": "x" })), 2);
    assert_eq!(*seen.lock(), vec!["a:\"x\"", "b:\"x\""]);
    assert_eq!(bus.emit("other", &Value::Null), 0);
}

#[test]
fn dispose_unsubscribes_and_is_idempotent() {
    let bus = EventBus::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let mut sub = bus.on("tick", {
        let hits = hits.clone();
        move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    });
    bus.emit("tick", &Value::Null);
    sub.dispose();
    sub.dispose();
    bus.emit("tick", &Value::Null);

    assert!(sub.is_disposed());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(bus.listener_count("tick"), 0);
}

#[test]
fn dropping_a_subscription_keeps_it_alive() {
    let bus = EventBus::new();
    drop(bus.on("tick", |_| {}));
    assert_eq!(bus.listener_count("tick"), 1);
}

#[test]
fn panicking_handler_does_not_stop_delivery() {
    let bus = EventBus::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let _bad = bus.on("evt", |_| panic!("handler exploded"));
    let _good = bus.on("evt", {
        let hits = hits.clone();
        move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    });

    assert_eq!(bus.emit("evt", &Value::Null), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn handler_may_subscribe_during_emit() {
    let bus = EventBus::new();
    let inner_bus = bus.clone();
    let _outer = bus.on("first", move |_| {
        std::mem::forget(inner_bus.on("second", |_| {}));
    });

    bus.emit("first", &Value::Null);
    assert_eq!(bus.listener_count("second"), 1);
}

#[test]
fn disposing_after_bus_is_gone_is_harmless() {
    let bus = EventBus::new();
    let mut sub = bus.on("evt", |_| {});
    drop(bus);
    sub.dispose();
    assert!(sub.is_disposed());
}
