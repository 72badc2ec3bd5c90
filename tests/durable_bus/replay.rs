use std::sync::Arc;

use chrono::Duration;
use durable_bus::{Clock, InMemoryStorage, ManualClock, RetryPolicy};

use crate::support::{
    in_memory_bus, init_tracing, AppendPayload, Inbox, PayloadAppended, Recorder,
};

#[tokio::test]
async fn unacknowledged_messages_replay_once_per_retry() {
    init_tracing();
    let mut bus = in_memory_bus(&InMemoryStorage::new(), 1);
    let commands = Recorder::new();
    let events = Recorder::new();
    bus.register_subscription_for(commands.commands());
    bus.register_subscription_for(events.events());

    bus.send_durable(AppendPayload::new("0")).await.unwrap();
    bus.publish_durable(PayloadAppended::new("0")).await;
    assert_eq!(commands.contents(), "0");
    assert_eq!(events.contents(), "0");

    bus.start().await;
    assert_eq!(commands.contents(), "00");
    assert_eq!(events.contents(), "00");

    for _ in 0..9 {
        bus.start().await;
    }
    assert_eq!(commands.contents(), "00");
    assert_eq!(events.contents(), "00");
    assert!(bus.pending_commands().is_empty());
    assert!(bus.pending_events().is_empty());
}

#[tokio::test]
async fn larger_budget_replays_until_spent() {
    let mut bus = in_memory_bus(&InMemoryStorage::new(), 3);
    let commands = Recorder::new();
    bus.register_subscription_for(commands.commands());

    bus.send_durable(AppendPayload::new("x")).await.unwrap();
    for _ in 0..5 {
        bus.start().await;
    }

    assert_eq!(commands.contents(), "xxxx");
}

#[tokio::test]
async fn acknowledged_command_is_not_replayed() {
    let mut bus = in_memory_bus(&InMemoryStorage::new(), 5);
    let commands = Recorder::new();
    let inbox = Inbox::<AppendPayload>::new();
    let record = commands.commands();
    let keep = inbox.handler();
    bus.register_subscription_for(move |cmd: &AppendPayload| {
        record(cmd);
        keep(cmd);
    });

    bus.send_durable(AppendPayload::new("0")).await.unwrap();
    let sent = inbox.take();
    assert_eq!(sent.len(), 1);
    bus.acknowledge(&sent[0]);
    bus.acknowledge(&sent[0]);

    bus.start().await;
    assert_eq!(commands.contents(), "0");
    assert!(bus.pending_commands().is_empty());
}

#[tokio::test]
async fn acknowledging_one_subscriber_leaves_the_other_pending() {
    let mut bus = in_memory_bus(&InMemoryStorage::new(), 5);
    let ledger = Inbox::<PayloadAppended>::new();
    let mailer = Recorder::new();
    bus.register_subscription_for_key("ledger", ledger.handler());
    bus.register_subscription_for_key("mailer", mailer.events());

    bus.publish_durable(PayloadAppended::new("e")).await;
    assert_eq!(bus.pending_events().len(), 2);

    let copy = ledger.take().remove(0);
    bus.acknowledge(&copy);
    assert_eq!(bus.pending_events().len(), 1);
    assert_eq!(bus.pending_events()[0].subscriber_key(), "mailer");

    bus.start().await;
    assert!(ledger.take().is_empty());
    assert_eq!(mailer.contents(), "ee");
}

#[tokio::test]
async fn orphaned_event_is_dropped_silently() {
    let mut bus = in_memory_bus(&InMemoryStorage::new(), 5);
    let events = Recorder::new();
    bus.register_subscription_for(events.events());

    bus.publish_durable(PayloadAppended::new("0")).await;
    bus.unregister_all_subscriptions_for::<PayloadAppended>();

    // a newcomer under a different key never inherits the old envelope
    let newcomer = Recorder::new();
    bus.register_subscription_for_key("newcomer", newcomer.events());
    bus.start().await;

    assert_eq!(events.contents(), "0");
    assert_eq!(newcomer.contents(), "");
    assert!(bus.pending_events().is_empty());
}

#[tokio::test]
async fn orphaned_command_is_dropped() {
    let mut bus = in_memory_bus(&InMemoryStorage::new(), 5);
    let commands = Recorder::new();
    let key = bus.register_subscription_for(commands.commands());

    bus.send_durable(AppendPayload::new("0")).await.unwrap();
    assert!(bus.unregister_subscription(&key));
    assert!(!bus.has_subscription(&key));
    bus.start().await;

    assert_eq!(commands.contents(), "0");
    assert!(bus.pending_commands().is_empty());
}

#[tokio::test]
async fn expired_envelopes_are_cleared_before_replay() {
    let clock = Arc::new(ManualClock::starting_now());
    let policy = RetryPolicy::with_clock(5, Duration::minutes(10), &*clock);
    let mut bus = in_memory_bus(&InMemoryStorage::new(), 5)
        .with_clock(clock.clone())
        .with_default_policies(policy, policy);
    let commands = Recorder::new();
    let events = Recorder::new();
    bus.register_subscription_for(commands.commands());
    bus.register_subscription_for(events.events());

    bus.send_durable(AppendPayload::new("a")).await.unwrap();
    bus.publish_durable(PayloadAppended::new("b")).await;

    clock.advance(Duration::minutes(5));
    bus.start().await;
    assert_eq!(commands.contents(), "aa");
    assert_eq!(events.contents(), "bb");

    clock.advance(Duration::minutes(6));
    assert!(clock.now() > policy.expiry());
    bus.start().await;

    assert_eq!(commands.contents(), "aa");
    assert_eq!(events.contents(), "bb");
    assert!(bus.pending_commands().is_empty());
    assert!(bus.pending_events().is_empty());
}

#[tokio::test]
async fn zero_retry_policy_delivers_once_and_forgets() {
    let storage = InMemoryStorage::new();
    let mut bus = in_memory_bus(&storage, 0);
    let commands = Recorder::new();
    bus.register_subscription_for(commands.commands());

    bus.send_durable(AppendPayload::new("z")).await.unwrap();
    bus.start().await;

    assert_eq!(commands.contents(), "z");
    assert!(storage.is_empty());
}
