mod message;

use proc_macro::TokenStream;

use message::Kind;

/// Derive macro implementing `durable_bus::Message` and `durable_bus::Command`.
///
/// The struct must embed a `durable_bus::MessageHeader`, either in a field
/// named `header` or in a field tagged `#[message(header)]`.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Debug, Serialize, Deserialize, Command)]
/// #[message(durable, name = "orders.place")]
/// struct PlaceOrder {
///     header: MessageHeader,
///     order_id: String,
/// }
/// ```
///
/// Struct-level options:
/// - `durable`: also implement `durable_bus::DurableMessage`
/// - `name = "..."`: persisted type name (defaults to `module_path!()::StructName`)
#[proc_macro_derive(Command, attributes(message))]
pub fn derive_command(input: TokenStream) -> TokenStream {
    message::derive_message(input, Kind::Command)
}

/// Derive macro implementing `durable_bus::Message` and `durable_bus::Event`.
///
/// Accepts the same `#[message(...)]` options as `#[derive(Command)]`.
#[proc_macro_derive(Event, attributes(message))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    message::derive_message(input, Kind::Event)
}
