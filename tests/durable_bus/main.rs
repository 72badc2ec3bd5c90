//! Durable bus behaviour end to end.
//!
//! - Routing: exactly-one command handler, fan-out events, async handlers
//! - Replay: retry budgets, acknowledgement, orphaned subscribers, expiry
//! - Restart: version mismatch, disk storage, corrupt queues, bitcode

mod replay;
mod restart;
mod routing;
mod support;
