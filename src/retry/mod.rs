//! Retry budgets for durable messages.

mod policy;
mod settings;

pub use policy::RetryPolicy;
pub use settings::RetrySettings;
