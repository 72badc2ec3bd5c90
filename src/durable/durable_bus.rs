use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::DurableBusConfig;
use crate::bus::{BusError, MessageBus, PublishHooks, SendHooks};
use crate::clock::{system_clock, Clock};
use crate::envelope::{Envelope, EnvelopeSnapshot, StoredMessage};
use crate::message::{Command, DurableMessage, Event, Message, MessageKind};
use crate::persistence::{InMemoryStorage, MessagePersistence, Storage};
use crate::retry::RetryPolicy;
use crate::serializer::{JsonSerializer, MessageSerializer, SerializerError};

type Decoded = Result<Box<dyn Any + Send + Sync>, SerializerError>;

/// Rehydrates a stored message into the concrete type a subscriber was
/// registered for.
struct Codec<S> {
    type_id: TypeId,
    decode: fn(&StoredMessage, &S) -> Decoded,
}

fn decode_as<M: Message, S: MessageSerializer>(stored: &StoredMessage, serializer: &S) -> Decoded {
    let message: M = stored.decode(serializer)?;
    Ok(Box::new(message))
}

/// What replay did with one envelope.
enum Redelivery {
    Delivered,
    /// Left in the queue untouched, no retry charged.
    Held,
    Dropped(&'static str),
}

/// [`MessageBus`] with at-least-once delivery across restarts.
///
/// `send_durable` and `publish_durable` wrap each delivery in an
/// [`Envelope`] that stays pending until [`acknowledge`](Self::acknowledge)
/// retires it or its [`RetryPolicy`] runs out. Pending queues are written to
/// [`MessagePersistence`] after every change; [`start`](Self::start) reloads
/// them and redelivers to whoever is subscribed now.
///
/// Plain [`send`](Self::send) and [`publish`](Self::publish) behave exactly
/// like the inner bus and never persist anything.
///
/// Registering a subscriber panics if another Rust type already claimed the
/// same [`Message::MESSAGE_TYPE`] on this bus.
pub struct DurableMessageBus<S = JsonSerializer, St = InMemoryStorage> {
    bus: MessageBus,
    serializer: S,
    persistence: MessagePersistence<St>,
    clock: Arc<dyn Clock>,
    command_policy: RetryPolicy,
    event_policy: RetryPolicy,
    pending_commands: Vec<Envelope>,
    pending_events: Vec<Envelope>,
    codecs: HashMap<&'static str, Codec<S>>,
    persist_on_change: bool,
}

impl<St: Storage> DurableMessageBus<JsonSerializer, St> {
    /// Bus persisting JSON through `persistence`.
    ///
    /// `command_policy` and `event_policy` are the defaults for
    /// `send_durable` and `publish_durable`; their expiry is already fixed.
    pub fn new(
        command_policy: RetryPolicy,
        event_policy: RetryPolicy,
        persistence: MessagePersistence<St>,
    ) -> Self {
        Self::with_serializer(JsonSerializer::new(), command_policy, event_policy, persistence)
    }

    /// Bus built from settings, with default policies computed now.
    pub fn from_config(config: &DurableBusConfig, storage: St) -> Self {
        Self::from_config_with_serializer(config, storage, JsonSerializer::new())
    }
}

impl<S: MessageSerializer, St: Storage> DurableMessageBus<S, St> {
    /// Bus using `serializer` for persisted queues and per-subscriber copies.
    ///
    /// The serializer is fixed for the life of the bus: subscribers record
    /// how to decode their message type with it at registration.
    pub fn with_serializer(
        serializer: S,
        command_policy: RetryPolicy,
        event_policy: RetryPolicy,
        persistence: MessagePersistence<St>,
    ) -> Self {
        Self {
            bus: MessageBus::new(),
            serializer,
            persistence,
            clock: system_clock(),
            command_policy,
            event_policy,
            pending_commands: Vec::new(),
            pending_events: Vec::new(),
            codecs: HashMap::new(),
            persist_on_change: true,
        }
    }

    pub fn from_config_with_serializer(
        config: &DurableBusConfig,
        storage: St,
        serializer: S,
    ) -> Self {
        let clock = system_clock();
        let command_policy = config.commands.policy(&*clock);
        let event_policy = config.events.policy(&*clock);
        let persistence = MessagePersistence::with_folder(storage, config.folder.clone());

        Self::with_serializer(serializer, command_policy, event_policy, persistence)
            .with_persist_on_change(config.persist_on_change)
    }

    /// Swap the clock envelopes use to evaluate expiry.
    ///
    /// Default policies keep the expiry they were built with; pair this with
    /// [`with_default_policies`](Self::with_default_policies) to build those
    /// from the same clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_policies(
        mut self,
        command_policy: RetryPolicy,
        event_policy: RetryPolicy,
    ) -> Self {
        self.command_policy = command_policy;
        self.event_policy = event_policy;
        self
    }

    pub fn with_version_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.bus.set_message_version_provider(provider);
        self
    }

    /// Whether send, publish, acknowledge and start write the queues out.
    /// `stop` always does.
    pub fn with_persist_on_change(mut self, enabled: bool) -> Self {
        self.persist_on_change = enabled;
        self
    }

    pub fn set_message_version_provider<F>(&mut self, provider: F)
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.bus.set_message_version_provider(provider);
    }

    pub fn message_version(&self) -> &str {
        self.bus.message_version()
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn persistence(&self) -> &MessagePersistence<St> {
        &self.persistence
    }

    pub fn pending_commands(&self) -> &[Envelope] {
        &self.pending_commands
    }

    pub fn pending_events(&self) -> &[Envelope] {
        &self.pending_events
    }

    // ========================================================================
    // Registration
    // ========================================================================

    pub fn register_subscription_for<M, F>(&mut self, handler: F) -> String
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.record_codec::<M>();
        self.bus.register_subscription_for(handler)
    }

    pub fn register_subscription_for_key<M, F>(&mut self, key: impl Into<String>, handler: F)
    where
        M: Message,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.record_codec::<M>();
        self.bus.register_subscription_for_key(key, handler);
    }

    pub fn register_async_subscription_for<M, F, Fut>(&mut self, handler: F) -> String
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.record_codec::<M>();
        self.bus.register_async_subscription_for(handler)
    }

    pub fn register_async_subscription_for_key<M, F, Fut>(
        &mut self,
        key: impl Into<String>,
        handler: F,
    ) where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.record_codec::<M>();
        self.bus.register_async_subscription_for_key(key, handler);
    }

    pub fn has_subscription_for<M: Message>(&self) -> bool {
        self.bus.has_subscription_for::<M>()
    }

    pub fn has_subscription(&self, key: &str) -> bool {
        self.bus.has_subscription(key)
    }

    pub fn unregister_all_subscriptions_for<M: Message>(&mut self) {
        self.bus.unregister_all_subscriptions_for::<M>();
    }

    pub fn unregister_subscription(&mut self, key: &str) -> bool {
        self.bus.unregister_subscription(key)
    }

    /// # Panics
    ///
    /// If a different type was already registered under `M::MESSAGE_TYPE`;
    /// replay could not tell the two apart.
    fn record_codec<M: Message>(&mut self) {
        let codec = self.codecs.entry(M::MESSAGE_TYPE).or_insert(Codec {
            type_id: TypeId::of::<M>(),
            decode: decode_as::<M, S>,
        });
        assert!(
            codec.type_id == TypeId::of::<M>(),
            "message type name `{}` is already registered for a type other than `{}`",
            M::MESSAGE_TYPE,
            std::any::type_name::<M>(),
        );
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Send without tracking.
    pub async fn send<C: Command>(&self, command: C) -> Result<(), BusError> {
        self.bus.send(command).await
    }

    /// Publish without tracking.
    pub async fn publish<E: Event>(&self, event: E) {
        self.bus.publish(event).await
    }

    /// Send with the default command policy.
    pub async fn send_durable<C>(&mut self, command: C) -> Result<(), BusError>
    where
        C: Command + DurableMessage,
    {
        let policy = self.command_policy;
        self.send_durable_with_policy(command, policy).await
    }

    /// Send and keep an envelope pending until acknowledged or out of retries.
    ///
    /// Routing errors are returned as for [`send`](Self::send) and leave
    /// nothing pending.
    pub async fn send_durable_with_policy<C>(
        &mut self,
        command: C,
        policy: RetryPolicy,
    ) -> Result<(), BusError>
    where
        C: Command + DurableMessage,
    {
        let mut hooks = TrackDelivery {
            serializer: &self.serializer,
            clock: &self.clock,
            policy,
            tracked: Vec::new(),
        };
        let result = self.bus.send_with(command, &mut hooks).await;

        let tracked = hooks.tracked;
        self.pending_commands.extend(tracked);
        if self.persist_on_change {
            self.persist();
        }
        result
    }

    /// Publish with the default event policy.
    pub async fn publish_durable<E>(&mut self, event: E)
    where
        E: Event + DurableMessage,
    {
        let policy = self.event_policy;
        self.publish_durable_with_policy(event, policy).await
    }

    /// Publish, giving each subscriber its own copy and its own envelope.
    pub async fn publish_durable_with_policy<E>(&mut self, event: E, policy: RetryPolicy)
    where
        E: Event + DurableMessage,
    {
        let mut hooks = TrackDelivery {
            serializer: &self.serializer,
            clock: &self.clock,
            policy,
            tracked: Vec::new(),
        };
        self.bus.publish_with(event, &mut hooks).await;

        let tracked = hooks.tracked;
        self.pending_events.extend(tracked);
        if self.persist_on_change {
            self.persist();
        }
    }

    /// Retire the pending envelope(s) carrying this message's
    /// acknowledgement id. Calling it again is a no-op.
    pub fn acknowledge<M: DurableMessage>(&mut self, message: &M) {
        let Some(acknowledgement_id) = message.acknowledgement_id() else {
            debug!(message_type = M::MESSAGE_TYPE, id = %message.id(), "nothing to acknowledge");
            return;
        };

        let removed = match M::KIND {
            MessageKind::Command => retire(&mut self.pending_commands, acknowledgement_id),
            MessageKind::Event => retire(&mut self.pending_events, acknowledgement_id),
        };
        debug!(
            message_type = M::MESSAGE_TYPE,
            acknowledgement_id = %acknowledgement_id,
            removed,
            "acknowledged"
        );

        if removed > 0 && self.persist_on_change {
            self.persist();
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Reload pending work and redeliver it to current subscribers.
    ///
    /// Each queue is loaded only while it is empty in memory. Envelopes that
    /// are out of retries or expired are cleared first; the rest are
    /// redelivered commands-then-events and charged one retry each. An
    /// envelope is dropped without delivery when nobody decodes its type,
    /// its subscriber is gone, or it was stamped with another version.
    pub async fn start(&mut self) {
        if self.pending_commands.is_empty() {
            self.pending_commands = self.load_queue(MessageKind::Command);
        }
        if self.pending_events.is_empty() {
            self.pending_events = self.load_queue(MessageKind::Event);
        }

        clear_expired(&mut self.pending_commands);
        clear_expired(&mut self.pending_events);

        let commands = std::mem::take(&mut self.pending_commands);
        self.pending_commands = self.replay(commands, MessageKind::Command).await;
        let events = std::mem::take(&mut self.pending_events);
        self.pending_events = self.replay(events, MessageKind::Event).await;

        info!(
            commands = self.pending_commands.len(),
            events = self.pending_events.len(),
            "durable bus started"
        );
        if self.persist_on_change {
            self.persist();
        }
    }

    /// Flush both queues.
    pub fn stop(&self) {
        self.persist();
        info!(
            commands = self.pending_commands.len(),
            events = self.pending_events.len(),
            "durable bus stopped"
        );
    }

    async fn replay(&self, queue: Vec<Envelope>, kind: MessageKind) -> Vec<Envelope> {
        let mut kept = Vec::with_capacity(queue.len());
        for mut envelope in queue {
            if !envelope.should_retry() {
                continue;
            }
            match self.redeliver(&envelope, kind).await {
                Redelivery::Delivered => {
                    envelope.has_been_retried();
                    if envelope.should_retry() {
                        kept.push(envelope);
                    } else {
                        debug!(envelope = %envelope.id(), "retry budget spent");
                    }
                }
                Redelivery::Held => kept.push(envelope),
                Redelivery::Dropped(reason) => {
                    debug!(
                        envelope = %envelope.id(),
                        message_type = %envelope.message().message_type,
                        reason,
                        "dropped pending envelope"
                    );
                }
            }
        }
        kept
    }

    async fn redeliver(&self, envelope: &Envelope, kind: MessageKind) -> Redelivery {
        let stored = envelope.message();
        let Some(codec) = self.codecs.get(stored.message_type.as_str()) else {
            return Redelivery::Dropped("no decoder registered");
        };

        let subscriptions = self.bus.registry().subscriptions(codec.type_id);
        let subscription = match kind {
            MessageKind::Command => match subscriptions {
                [] => return Redelivery::Dropped("no subscriber"),
                [only] => only,
                many => {
                    warn!(
                        envelope = %envelope.id(),
                        message_type = %stored.message_type,
                        count = many.len(),
                        "ambiguous command routing, leaving envelope pending"
                    );
                    return Redelivery::Held;
                }
            },
            MessageKind::Event => {
                match subscriptions
                    .iter()
                    .find(|s| s.key() == envelope.subscriber_key())
                {
                    Some(subscription) => subscription,
                    None => return Redelivery::Dropped("subscriber no longer registered"),
                }
            }
        };

        if !envelope.message_matches_version(self.bus.message_version()) {
            return Redelivery::Dropped("version mismatch");
        }

        let message = match (codec.decode)(stored, &self.serializer) {
            Ok(message) => message,
            Err(err) => {
                warn!(envelope = %envelope.id(), error = %err, "could not decode pending message");
                return Redelivery::Dropped("undecodable");
            }
        };

        debug!(
            envelope = %envelope.id(),
            message_type = %stored.message_type,
            key = subscription.key(),
            "redelivering"
        );
        self.bus.dispatch(subscription, &*message).await;
        Redelivery::Delivered
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    fn load_queue(&self, kind: MessageKind) -> Vec<Envelope> {
        let slot = slot_name(kind);
        let present = match kind {
            MessageKind::Command => self.persistence.check_for_commands(),
            MessageKind::Event => self.persistence.check_for_events(),
        };
        match present {
            Ok(true) => {}
            Ok(false) => return Vec::new(),
            Err(err) => {
                error!(slot, error = %err, "could not check for pending queue");
                return Vec::new();
            }
        }

        let loaded = match kind {
            MessageKind::Command => self.persistence.load_commands(),
            MessageKind::Event => self.persistence.load_events(),
        };
        let text = match loaded {
            Ok(Some(text)) => text,
            Ok(None) => return Vec::new(),
            Err(err) => {
                error!(slot, error = %err, "could not load pending queue");
                return Vec::new();
            }
        };

        match self.serializer.deserialize::<Vec<EnvelopeSnapshot>>(&text) {
            Ok(snapshots) => {
                debug!(slot, count = snapshots.len(), "loaded pending queue");
                snapshots
                    .into_iter()
                    .map(|snapshot| Envelope::from_snapshot(snapshot, Arc::clone(&self.clock)))
                    .collect()
            }
            Err(err) => {
                error!(slot, error = %err, "pending queue is unreadable, starting empty");
                Vec::new()
            }
        }
    }

    fn persist(&self) {
        self.persist_queue(&self.pending_commands, MessageKind::Command);
        self.persist_queue(&self.pending_events, MessageKind::Event);
    }

    fn persist_queue(&self, queue: &[Envelope], kind: MessageKind) {
        let slot = slot_name(kind);
        let result = if queue.is_empty() {
            match kind {
                MessageKind::Command => self.persistence.remove_all_commands_from_persistence(),
                MessageKind::Event => self.persistence.remove_all_events_from_persistence(),
            }
        } else {
            let snapshots: Vec<EnvelopeSnapshot> = queue.iter().map(Envelope::snapshot).collect();
            let text = match self.serializer.serialize(&snapshots) {
                Ok(text) => text,
                Err(err) => {
                    error!(slot, error = %err, "could not serialize pending queue, skipping save");
                    return;
                }
            };
            match kind {
                MessageKind::Command => self.persistence.save_commands(&text),
                MessageKind::Event => self.persistence.save_events(&text),
            }
        };

        if let Err(err) = result {
            error!(slot, error = %err, "could not persist pending queue");
        }
    }
}

fn slot_name(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Command => "commands",
        MessageKind::Event => "events",
    }
}

fn retire(queue: &mut Vec<Envelope>, acknowledgement_id: Uuid) -> usize {
    let before = queue.len();
    queue.retain(|envelope| envelope.acknowledgement_id() != acknowledgement_id);
    before - queue.len()
}

fn clear_expired(queue: &mut Vec<Envelope>) {
    let before = queue.len();
    queue.retain(Envelope::should_retry);
    let cleared = before - queue.len();
    if cleared > 0 {
        debug!(cleared, "cleared expired envelopes");
    }
}

impl<S, St> fmt::Debug for DurableMessageBus<S, St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut decoders: Vec<_> = self.codecs.keys().collect();
        decoders.sort();
        f.debug_struct("DurableMessageBus")
            .field("bus", &self.bus)
            .field("pending_commands", &self.pending_commands)
            .field("pending_events", &self.pending_events)
            .field("command_policy", &self.command_policy)
            .field("event_policy", &self.event_policy)
            .field("decoders", &decoders)
            .field("persist_on_change", &self.persist_on_change)
            .finish_non_exhaustive()
    }
}

/// Hooks that mint acknowledgement ids and capture envelopes for one durable
/// send or publish.
struct TrackDelivery<'a, S> {
    serializer: &'a S,
    clock: &'a Arc<dyn Clock>,
    policy: RetryPolicy,
    tracked: Vec<Envelope>,
}

impl<S: MessageSerializer> TrackDelivery<'_, S> {
    fn track<M: DurableMessage>(&mut self, message: &M, subscriber_key: &str) {
        let clock = Arc::clone(self.clock);
        let envelope = match Envelope::for_message(message, self.policy, self.serializer, clock) {
            Ok(envelope) => envelope.with_subscriber_key(subscriber_key),
            Err(err) => {
                error!(
                    message_type = M::MESSAGE_TYPE,
                    id = %message.id(),
                    error = %err,
                    "could not capture envelope"
                );
                return;
            }
        };

        if envelope.should_retry() {
            self.tracked.push(envelope);
        } else {
            debug!(
                message_type = M::MESSAGE_TYPE,
                id = %message.id(),
                "policy allows no retry, not tracked"
            );
        }
    }
}

impl<C, S> SendHooks<C> for TrackDelivery<'_, S>
where
    C: Command + DurableMessage,
    S: MessageSerializer,
{
    fn prepare_command(&mut self, mut command: C, version: &str) -> C {
        command.assign_acknowledgement_id();
        command.stamp_version(version);
        self.track(&command, "");
        command
    }
}

impl<E, S> PublishHooks<E> for TrackDelivery<'_, S>
where
    E: Event + DurableMessage,
    S: MessageSerializer,
{
    fn prepare_event<'e>(
        &mut self,
        event: &'e mut E,
        subscriber_key: &str,
        version: &str,
    ) -> Cow<'e, E> {
        event.assign_acknowledgement_id();
        event.stamp_version(version);

        match self.serializer.deep_clone(&*event) {
            Ok(copy) => {
                self.track(&copy, subscriber_key);
                Cow::Owned(copy)
            }
            Err(err) => {
                error!(
                    message_type = E::MESSAGE_TYPE,
                    key = subscriber_key,
                    error = %err,
                    "could not copy event for subscriber, delivering untracked"
                );
                Cow::Borrowed(&*event)
            }
        }
    }
}
