//! Shared fixtures for the durable bus suite.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::Duration;
use durable_bus::{
    Command, DurableMessageBus, Event, InMemoryStorage, MessageHeader, MessagePersistence,
    RetryPolicy,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Command)]
#[message(durable, name = "tests.AppendPayload")]
pub struct AppendPayload {
    pub header: MessageHeader,
    pub payload: String,
}

impl AppendPayload {
    pub fn new(payload: &str) -> Self {
        Self {
            header: MessageHeader::new(),
            payload: payload.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Event)]
#[message(durable, name = "tests.PayloadAppended")]
pub struct PayloadAppended {
    pub header: MessageHeader,
    pub payload: String,
}

impl PayloadAppended {
    pub fn new(payload: &str) -> Self {
        Self {
            header: MessageHeader::new(),
            payload: payload.to_string(),
        }
    }
}

/// Accumulates every payload a handler sees, in order.
#[derive(Clone, Default)]
pub struct Recorder {
    text: Arc<Mutex<String>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, payload: &str) {
        self.text.lock().unwrap().push_str(payload);
    }

    pub fn contents(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    pub fn commands(&self) -> impl Fn(&AppendPayload) + Send + Sync + 'static {
        let recorder = self.clone();
        move |cmd: &AppendPayload| recorder.append(&cmd.payload)
    }

    pub fn events(&self) -> impl Fn(&PayloadAppended) + Send + Sync + 'static {
        let recorder = self.clone();
        move |evt: &PayloadAppended| recorder.append(&evt.payload)
    }
}

/// Keeps the messages a handler received so a test can acknowledge them.
#[derive(Clone)]
pub struct Inbox<M> {
    received: Arc<Mutex<Vec<M>>>,
}

impl<M: Clone + Send + 'static> Inbox<M> {
    pub fn new() -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn handler(&self) -> impl Fn(&M) + Send + Sync + 'static {
        let received = Arc::clone(&self.received);
        move |message: &M| received.lock().unwrap().push(message.clone())
    }

    pub fn take(&self) -> Vec<M> {
        std::mem::take(&mut *self.received.lock().unwrap())
    }
}

pub fn hour_policy(retries: u32) -> RetryPolicy {
    RetryPolicy::new(retries, Duration::hours(1))
}

/// JSON bus over shared in-memory storage with the same policy for both
/// queues.
pub fn in_memory_bus(storage: &InMemoryStorage, retries: u32) -> DurableMessageBus {
    DurableMessageBus::new(
        hour_policy(retries),
        hour_policy(retries),
        MessagePersistence::new(storage.clone()),
    )
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
