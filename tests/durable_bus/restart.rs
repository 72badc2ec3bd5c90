use durable_bus::{
    DurableBusConfig, DurableMessageBus, FileStorage, InMemoryStorage, MessagePersistence,
    RetrySettings, Storage,
};

use crate::support::{hour_policy, in_memory_bus, AppendPayload, PayloadAppended, Recorder};

#[tokio::test]
async fn pending_work_survives_a_restart() {
    let storage = InMemoryStorage::new();
    {
        let mut bus = in_memory_bus(&storage, 2);
        bus.register_subscription_for(Recorder::new().commands());
        bus.register_subscription_for_key("ledger", Recorder::new().events());
        bus.register_subscription_for_key("mailer", Recorder::new().events());

        bus.send_durable(AppendPayload::new("c")).await.unwrap();
        bus.publish_durable(PayloadAppended::new("e")).await;
        bus.stop();
    }

    let commands = Recorder::new();
    let ledger = Recorder::new();
    let mailer = Recorder::new();
    let mut bus = in_memory_bus(&storage, 2);
    bus.register_subscription_for(commands.commands());
    bus.register_subscription_for_key("ledger", ledger.events());
    bus.register_subscription_for_key("mailer", mailer.events());

    bus.start().await;

    assert_eq!(commands.contents(), "c");
    assert_eq!(ledger.contents(), "e");
    assert_eq!(mailer.contents(), "e");
    assert_eq!(bus.pending_commands()[0].retries_remaining(), 1);
    assert_eq!(bus.pending_events().len(), 2);
}

#[tokio::test]
async fn version_change_discards_pending_work() {
    let storage = InMemoryStorage::new();
    {
        let mut bus = in_memory_bus(&storage, 5).with_version_provider(|| "A".to_string());
        bus.register_subscription_for(Recorder::new().commands());
        bus.register_subscription_for(Recorder::new().events());
        bus.send_durable(AppendPayload::new("0")).await.unwrap();
        bus.publish_durable(PayloadAppended::new("0")).await;
        bus.stop();
    }

    let commands = Recorder::new();
    let events = Recorder::new();
    let mut bus = in_memory_bus(&storage, 5).with_version_provider(|| "B".to_string());
    bus.register_subscription_for(commands.commands());
    bus.register_subscription_for(events.events());
    bus.start().await;

    assert_eq!(commands.contents(), "");
    assert_eq!(events.contents(), "");
    assert!(bus.pending_commands().is_empty());
    assert!(bus.pending_events().is_empty());
    assert!(!bus.persistence().check_for_commands().unwrap());
    assert!(!bus.persistence().check_for_events().unwrap());
}

#[tokio::test]
async fn same_version_replays_after_restart() {
    let storage = InMemoryStorage::new();
    {
        let mut bus = in_memory_bus(&storage, 5).with_version_provider(|| "A".to_string());
        bus.register_subscription_for(Recorder::new().commands());
        bus.send_durable(AppendPayload::new("0")).await.unwrap();
    }

    let commands = Recorder::new();
    let mut bus = in_memory_bus(&storage, 5).with_version_provider(|| "A".to_string());
    bus.register_subscription_for(commands.commands());
    bus.start().await;

    assert_eq!(commands.contents(), "0");
}

#[tokio::test]
async fn file_storage_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = DurableBusConfig::new()
        .with_retry(RetrySettings::new(1, chrono::Duration::hours(1)))
        .with_folder("orders");
    {
        let mut bus = DurableMessageBus::from_config(&config, FileStorage::new(dir.path()));
        bus.register_subscription_for(Recorder::new().commands());
        bus.send_durable(AppendPayload::new("disk")).await.unwrap();
        bus.stop();
    }

    let blob = dir.path().join("orders").join("commands.json");
    assert!(blob.exists());
    assert!(!dir.path().join("orders").join("events.json").exists());

    let commands = Recorder::new();
    let mut bus = DurableMessageBus::from_config(&config, FileStorage::new(dir.path()));
    bus.register_subscription_for(commands.commands());
    bus.start().await;

    assert_eq!(commands.contents(), "disk");
    assert!(bus.pending_commands().is_empty());
    assert!(!blob.exists());
}

#[tokio::test]
async fn corrupt_queue_is_discarded_on_load() {
    let storage = InMemoryStorage::new();
    storage
        .save("message_bus", "commands", "{ definitely not a queue")
        .unwrap();

    let commands = Recorder::new();
    let mut bus = in_memory_bus(&storage, 1);
    bus.register_subscription_for(commands.commands());
    bus.start().await;

    assert!(bus.pending_commands().is_empty());
    assert_eq!(commands.contents(), "");
    assert!(!bus.persistence().check_for_commands().unwrap());

    bus.send_durable(AppendPayload::new("fresh")).await.unwrap();
    let text = storage.load("message_bus", "commands").unwrap().unwrap();
    assert!(text.contains("tests.AppendPayload"));
}

#[tokio::test]
async fn separate_folders_do_not_share_queues() {
    let storage = InMemoryStorage::new();
    let mut billing = DurableMessageBus::new(
        hour_policy(3),
        hour_policy(3),
        MessagePersistence::with_folder(storage.clone(), "billing"),
    );
    billing.register_subscription_for(Recorder::new().commands());
    billing.send_durable(AppendPayload::new("b")).await.unwrap();

    let commands = Recorder::new();
    let mut shipping = DurableMessageBus::new(
        hour_policy(3),
        hour_policy(3),
        MessagePersistence::with_folder(storage.clone(), "shipping"),
    );
    shipping.register_subscription_for(commands.commands());
    shipping.start().await;

    assert_eq!(commands.contents(), "");
    assert!(storage.exists("billing", "commands").unwrap());
}

#[cfg(feature = "bitcode")]
#[tokio::test]
async fn bitcode_queues_survive_a_restart() {
    use durable_bus::BitcodeSerializer;

    let storage = InMemoryStorage::new();
    let build = |storage: &InMemoryStorage| {
        DurableMessageBus::with_serializer(
            BitcodeSerializer::new(),
            hour_policy(2),
            hour_policy(2),
            MessagePersistence::new(storage.clone()),
        )
    };
    {
        let mut bus = build(&storage);
        bus.register_subscription_for(Recorder::new().commands());
        bus.register_subscription_for(Recorder::new().events());
        bus.send_durable(AppendPayload::new("1")).await.unwrap();
        bus.publish_durable(PayloadAppended::new("2")).await;
        bus.stop();
    }

    let text = storage.load("message_bus", "commands").unwrap().unwrap();
    assert!(!text.contains("tests.AppendPayload"));

    let commands = Recorder::new();
    let events = Recorder::new();
    let mut bus = build(&storage);
    bus.register_subscription_for(commands.commands());
    bus.register_subscription_for(events.events());
    bus.start().await;

    assert_eq!(commands.contents(), "1");
    assert_eq!(events.contents(), "2");
}
