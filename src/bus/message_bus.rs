//! Message bus - registers handlers, sends commands, publishes events.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use super::hooks::{DefaultHooks, PublishHooks, SendHooks};
use super::registry::{Dispatch, SubscriberRegistry, Subscription};
use super::BusError;
use crate::message::{Command, Event, Message};

/// Supplies the version string stamped onto every sent or published message.
pub type VersionProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// In-memory router for commands and events.
///
/// Commands need exactly one subscription; events go to every subscription
/// for their type, one after another in registration order.
///
/// ## Example
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use durable_bus::{Command, MessageBus, MessageHeader};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, Serialize, Deserialize, Command)]
/// struct Greet {
///     header: MessageHeader,
///     name: String,
/// }
///
/// # tokio_test();
/// # fn tokio_test() {
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let greeted = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&greeted);
///
/// let mut bus = MessageBus::new();
/// bus.register_subscription_for(move |cmd: &Greet| sink.lock().unwrap().push(cmd.name.clone()));
///
/// bus.send(Greet { header: MessageHeader::new(), name: "Pat".into() }).await.unwrap();
/// assert_eq!(*greeted.lock().unwrap(), vec!["Pat".to_string()]);
/// # });
/// # }
/// ```
pub struct MessageBus {
    registry: SubscriberRegistry,
    version_provider: VersionProvider,
    version: OnceCell<String>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    /// Bus stamping an empty version string.
    pub fn new() -> Self {
        Self {
            registry: SubscriberRegistry::new(),
            version_provider: Arc::new(String::new),
            version: OnceCell::new(),
        }
    }

    pub fn with_version_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.set_message_version_provider(provider);
        self
    }

    /// Replace the version provider. The next read of
    /// [`message_version`](Self::message_version) calls it once.
    pub fn set_message_version_provider<F>(&mut self, provider: F)
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.version_provider = Arc::new(provider);
        self.version = OnceCell::new();
    }

    /// Version stamped onto outgoing messages, computed on first read and
    /// cached for the life of the bus.
    pub fn message_version(&self) -> &str {
        self.version.get_or_init(|| {
            let version = (self.version_provider)();
            debug!(version = %version, "message version resolved");
            version
        })
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register a synchronous handler under an auto-assigned key.
    ///
    /// The key is the message type name, suffixed with an increasing number
    /// when already taken. Returns the key.
    pub fn register_subscription_for<M, F>(&mut self, handler: F) -> String
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        let key = self.registry.unique_key(M::MESSAGE_TYPE);
        self.register_subscription_for_key(key.clone(), handler);
        key
    }

    /// Register a synchronous handler under a caller-chosen key.
    pub fn register_subscription_for_key<M, F>(&mut self, key: impl Into<String>, handler: F)
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        let key = key.into();
        debug!(message_type = M::MESSAGE_TYPE, key = %key, "registering subscription");
        self.registry.insert::<M>(Subscription::sync(key, handler));
    }

    /// Register an asynchronous handler under an auto-assigned key.
    ///
    /// The handler receives its own clone of the message. Its future is
    /// spawned on the tokio runtime and awaited before dispatch moves on.
    pub fn register_async_subscription_for<M, F, Fut>(&mut self, handler: F) -> String
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = self.registry.unique_key(M::MESSAGE_TYPE);
        self.register_async_subscription_for_key(key.clone(), handler);
        key
    }

    /// Register an asynchronous handler under a caller-chosen key.
    pub fn register_async_subscription_for_key<M, F, Fut>(
        &mut self,
        key: impl Into<String>,
        handler: F,
    ) where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        debug!(message_type = M::MESSAGE_TYPE, key = %key, "registering async subscription");
        self.registry
            .insert::<M>(Subscription::asynchronous(key, handler));
    }

    pub fn has_subscription_for<M: Message>(&self) -> bool {
        self.registry.contains_type::<M>()
    }

    pub fn has_subscription(&self, key: &str) -> bool {
        self.registry.contains_key(key)
    }

    pub fn unregister_all_subscriptions_for<M: Message>(&mut self) {
        let removed = self.registry.remove_type::<M>();
        debug!(message_type = M::MESSAGE_TYPE, removed, "unregistered all subscriptions");
    }

    /// Remove the first subscription registered under `key`. Returns whether
    /// one was found.
    pub fn unregister_subscription(&mut self, key: &str) -> bool {
        match self.registry.remove_key(key) {
            Some(message_type) => {
                debug!(message_type, key, "unregistered subscription");
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Send a command to its single subscriber.
    pub async fn send<C: Command>(&self, command: C) -> Result<(), BusError> {
        self.send_with(command, &mut DefaultHooks).await
    }

    /// Publish an event to every subscriber. No subscribers is not an error.
    pub async fn publish<E: Event>(&self, event: E) {
        self.publish_with(event, &mut DefaultHooks).await
    }

    /// Send a command, running `hooks` around the dispatch.
    pub async fn send_with<C, H>(&self, command: C, hooks: &mut H) -> Result<(), BusError>
    where
        C: Command,
        H: SendHooks<C>,
    {
        let subscription = match self.registry.subscriptions_for::<C>() {
            [] => {
                warn!(message_type = C::MESSAGE_TYPE, "no subscriber for command");
                return Err(BusError::NoSubscriber {
                    message_type: C::MESSAGE_TYPE,
                });
            }
            [only] => only,
            many => {
                warn!(
                    message_type = C::MESSAGE_TYPE,
                    count = many.len(),
                    "more than one subscriber for command"
                );
                return Err(BusError::DuplicateSubscriber {
                    message_type: C::MESSAGE_TYPE,
                    count: many.len(),
                });
            }
        };

        hooks.before_send(&command);
        let command = hooks.prepare_command(command, self.message_version());
        if !hooks.should_send(&command) {
            debug!(message_type = C::MESSAGE_TYPE, id = %command.id(), "send vetoed");
            return Ok(());
        }

        debug!(
            message_type = C::MESSAGE_TYPE,
            id = %command.id(),
            key = subscription.key(),
            "sending command"
        );
        self.dispatch(subscription, &command).await;
        hooks.after_send(&command);
        Ok(())
    }

    /// Publish an event, running `hooks` around each subscriber's dispatch.
    pub async fn publish_with<E, H>(&self, mut event: E, hooks: &mut H)
    where
        E: Event,
        H: PublishHooks<E>,
    {
        let subscriptions = self.registry.subscriptions_for::<E>();
        if subscriptions.is_empty() {
            debug!(message_type = E::MESSAGE_TYPE, "no subscribers for event");
            return;
        }

        let version = self.message_version();
        for subscription in subscriptions {
            let key = subscription.key();
            hooks.before_publish(&event, key);
            let prepared = hooks.prepare_event(&mut event, key, version);
            if !hooks.should_publish(&prepared, key) {
                debug!(message_type = E::MESSAGE_TYPE, key, "publish vetoed");
                continue;
            }

            debug!(
                message_type = E::MESSAGE_TYPE,
                id = %prepared.id(),
                key,
                "publishing event"
            );
            self.dispatch(subscription, &*prepared).await;
            hooks.after_publish(&prepared, key);
        }
    }

    /// Run one handler to completion.
    ///
    /// A panic inside an async handler is resumed here, so both handler kinds
    /// fail the same way.
    pub(crate) async fn dispatch(
        &self,
        subscription: &Subscription,
        message: &(dyn Any + Send + Sync),
    ) {
        match subscription.invoke(message) {
            Dispatch::Complete => {}
            Dispatch::Pending(future) => match tokio::spawn(future).await {
                Ok(()) => {}
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => {
                    warn!(key = subscription.key(), error = %err, "async handler did not complete")
                }
            },
        }
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("registry", &self.registry)
            .field("version", &self.version.get())
            .finish_non_exhaustive()
    }
}
