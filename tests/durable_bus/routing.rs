use std::sync::{Arc, Mutex};
use std::time::Duration;

use durable_bus::{BusError, InMemoryStorage};

use crate::support::{in_memory_bus, init_tracing, AppendPayload, PayloadAppended, Recorder};

#[tokio::test]
async fn command_needs_exactly_one_subscriber() {
    init_tracing();
    let mut bus = in_memory_bus(&InMemoryStorage::new(), 1);

    let missing = bus.send(AppendPayload::new("0")).await;
    assert_eq!(
        missing,
        Err(BusError::NoSubscriber {
            message_type: "tests.AppendPayload"
        })
    );

    let recorder = Recorder::new();
    bus.register_subscription_for(recorder.commands());
    bus.send(AppendPayload::new("exact payload")).await.unwrap();
    assert_eq!(recorder.contents(), "exact payload");

    bus.register_subscription_for(recorder.commands());
    let ambiguous = bus.send_durable(AppendPayload::new("1")).await;
    assert_eq!(
        ambiguous,
        Err(BusError::DuplicateSubscriber {
            message_type: "tests.AppendPayload",
            count: 2
        })
    );
    assert_eq!(recorder.contents(), "exact payload");
    assert!(bus.pending_commands().is_empty());
}

#[tokio::test]
async fn event_reaches_identical_handlers_in_order() {
    let mut bus = in_memory_bus(&InMemoryStorage::new(), 1);
    let recorder = Recorder::new();
    let first = bus.register_subscription_for(recorder.events());
    let second = bus.register_subscription_for(recorder.events());

    bus.publish(PayloadAppended::new("ab")).await;

    assert_eq!(first, "tests.PayloadAppended");
    assert_eq!(second, "tests.PayloadAppended1");
    assert_eq!(bus.bus().registry().len(), 2);
    assert_eq!(recorder.contents(), "abab");
}

#[tokio::test]
async fn event_without_subscribers_is_silent() {
    let mut bus = in_memory_bus(&InMemoryStorage::new(), 3);
    bus.publish(PayloadAppended::new("x")).await;
    bus.publish_durable(PayloadAppended::new("x")).await;
    assert!(bus.pending_events().is_empty());
}

#[tokio::test]
async fn async_handlers_finish_before_the_next_subscriber() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (slow, fast) = (Arc::clone(&order), Arc::clone(&order));

    let mut bus = in_memory_bus(&InMemoryStorage::new(), 1);
    bus.register_async_subscription_for_key("slow", move |evt: PayloadAppended| {
        let slow = Arc::clone(&slow);
        async move {
            tokio::time::sleep(Duration::from_millis(25)).await;
            slow.lock().unwrap().push(format!("slow {}", evt.payload));
        }
    });
    bus.register_subscription_for_key("fast", move |evt: &PayloadAppended| {
        fast.lock().unwrap().push(format!("fast {}", evt.payload))
    });

    bus.publish_durable(PayloadAppended::new("e")).await;
    assert_eq!(
        *order.lock().unwrap(),
        vec!["slow e".to_string(), "fast e".to_string()]
    );

    bus.start().await;
    assert_eq!(order.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn messages_carry_the_bus_version() {
    let versions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&versions);
    let mut bus =
        in_memory_bus(&InMemoryStorage::new(), 1).with_version_provider(|| "3.2.1".to_string());
    bus.register_subscription_for(move |cmd: &AppendPayload| {
        sink.lock().unwrap().push(cmd.header.version.clone())
    });

    bus.send_durable(AppendPayload::new("v")).await.unwrap();

    assert_eq!(bus.message_version(), "3.2.1");
    assert_eq!(*versions.lock().unwrap(), vec!["3.2.1".to_string()]);
    assert_eq!(bus.pending_commands()[0].message().version(), "3.2.1");
}
