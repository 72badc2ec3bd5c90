//! Type-keyed subscriber registry.

use std::any::{Any, TypeId};
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;

use crate::message::Message;

/// Outcome of invoking an erased handler.
pub(crate) enum Dispatch {
    Complete,
    Pending(BoxFuture<'static, ()>),
}

type ErasedHandler = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Dispatch + Send + Sync>;

/// How a handler runs, fixed at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    /// Runs inline on the dispatching task.
    Sync,
    /// Spawned onto the runtime and awaited before the next dispatch.
    Async,
}

/// One named handler binding for a message type.
#[derive(Clone)]
pub struct Subscription {
    key: String,
    kind: HandlerKind,
    handler: ErasedHandler,
}

impl Subscription {
    pub(crate) fn sync<M, F>(key: String, handler: F) -> Self
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        let handler: ErasedHandler = Arc::new(move |message: &(dyn Any + Send + Sync)| {
            if let Some(message) = message.downcast_ref::<M>() {
                handler(message);
            }
            Dispatch::Complete
        });
        Self {
            key,
            kind: HandlerKind::Sync,
            handler,
        }
    }

    pub(crate) fn asynchronous<M, F, Fut>(key: String, handler: F) -> Self
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: ErasedHandler = Arc::new(move |message: &(dyn Any + Send + Sync)| {
            match message.downcast_ref::<M>() {
                Some(message) => Dispatch::Pending(handler(message.clone()).boxed()),
                None => Dispatch::Complete,
            }
        });
        Self {
            key,
            kind: HandlerKind::Async,
            handler,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    pub(crate) fn invoke(&self, message: &(dyn Any + Send + Sync)) -> Dispatch {
        (self.handler)(message)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct SubscriberList {
    message_type: &'static str,
    subscriptions: Vec<Subscription>,
}

/// Maps message types to their ordered subscriptions.
///
/// Types are scanned in the order they were first registered; within a type,
/// subscriptions keep registration order.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    lists: IndexMap<TypeId, SubscriberList>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscription, creating the type's list if absent.
    pub fn insert<M: Message>(&mut self, subscription: Subscription) {
        self.lists
            .entry(TypeId::of::<M>())
            .or_insert_with(|| SubscriberList {
                message_type: M::MESSAGE_TYPE,
                subscriptions: Vec::new(),
            })
            .subscriptions
            .push(subscription);
    }

    pub fn subscriptions_for<M: Message>(&self) -> &[Subscription] {
        self.subscriptions(TypeId::of::<M>())
    }

    pub fn subscriptions(&self, type_id: TypeId) -> &[Subscription] {
        self.lists
            .get(&type_id)
            .map(|list| list.subscriptions.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_type<M: Message>(&self) -> bool {
        !self.subscriptions_for::<M>().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lists
            .values()
            .any(|list| list.subscriptions.iter().any(|s| s.key == key))
    }

    /// `base` if free, otherwise `base1`, `base2`, ... until unused.
    pub fn unique_key(&self, base: &str) -> String {
        if !self.contains_key(base) {
            return base.to_string();
        }
        let mut suffix = 1usize;
        loop {
            let candidate = format!("{}{}", base, suffix);
            if !self.contains_key(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Drop every subscription for `M`. Returns how many were removed.
    pub fn remove_type<M: Message>(&mut self) -> usize {
        self.lists
            .shift_remove(&TypeId::of::<M>())
            .map(|list| list.subscriptions.len())
            .unwrap_or(0)
    }

    /// Remove the first subscription with `key`, scanning types in order.
    ///
    /// Returns the message type it was registered for.
    pub fn remove_key(&mut self, key: &str) -> Option<&'static str> {
        let mut emptied = None;
        let mut removed = None;

        for (type_id, list) in self.lists.iter_mut() {
            if let Some(index) = list.subscriptions.iter().position(|s| s.key == key) {
                list.subscriptions.remove(index);
                removed = Some(list.message_type);
                if list.subscriptions.is_empty() {
                    emptied = Some(*type_id);
                }
                break;
            }
        }

        if let Some(type_id) = emptied {
            self.lists.shift_remove(&type_id);
        }
        removed
    }

    /// Total number of subscriptions across all types.
    pub fn len(&self) -> usize {
        self.lists.values().map(|list| list.subscriptions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
