//! Extension points around `send` and `publish`.
//!
//! The durable bus plugs in here to assign acknowledgement ids, clone events
//! per subscriber and record envelopes; other wrappers can do the same.

use std::borrow::Cow;

use crate::message::{Command, Event};

/// Hooks invoked, in order, around dispatching one command.
pub trait SendHooks<C: Command> {
    fn before_send(&mut self, _command: &C) {}

    /// Ready the command for its handler. The default stamps the bus version.
    fn prepare_command(&mut self, mut command: C, version: &str) -> C {
        command.stamp_version(version);
        command
    }

    /// Returning `false` skips the handler and `after_send`.
    fn should_send(&mut self, _command: &C) -> bool {
        true
    }

    fn after_send(&mut self, _command: &C) {}
}

/// Hooks invoked, in order, around dispatching an event to each subscriber.
pub trait PublishHooks<E: Event> {
    fn before_publish(&mut self, _event: &E, _subscriber_key: &str) {}

    /// Ready the event for one subscriber.
    ///
    /// The default stamps the version and hands every subscriber the same
    /// instance; returning `Cow::Owned` gives this subscriber its own copy.
    fn prepare_event<'e>(
        &mut self,
        event: &'e mut E,
        _subscriber_key: &str,
        version: &str,
    ) -> Cow<'e, E> {
        event.stamp_version(version);
        Cow::Borrowed(&*event)
    }

    /// Returning `false` skips this subscriber.
    fn should_publish(&mut self, _event: &E, _subscriber_key: &str) -> bool {
        true
    }

    fn after_publish(&mut self, _event: &E, _subscriber_key: &str) {}
}

/// Version stamping only, no vetoes.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultHooks;

impl<C: Command> SendHooks<C> for DefaultHooks {}

impl<E: Event> PublishHooks<E> for DefaultHooks {}
