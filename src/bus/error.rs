use thiserror::Error;

/// Routing failure surfaced to the caller of `send`.
///
/// Both variants are configuration errors: retrying the same send will fail
/// the same way until subscriptions change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("no subscriber registered for command {message_type}")]
    NoSubscriber { message_type: &'static str },
    #[error("{count} subscribers registered for command {message_type}, expected exactly one")]
    DuplicateSubscriber {
        message_type: &'static str,
        count: usize,
    },
}
