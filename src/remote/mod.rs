//! Remote Module - request/response over a shared duplex channel
//!
//! - `protocol`: wire message shapes (`request` / `response`)
//! - `channel`: `Channel` trait and the line-delimited JSON stream writer
//! - `invoker`: `RemoteInvoker`, correlation registry with timeout
//! - `transport`: reader task wiring a byte stream to an invoker
//! - `registry`: provider availability lookup
//!
//! ```text
//! Runner ──invoke──→ RemoteInvoker ──request──→ Channel ──→ provider
//!                         ↑                                    │
//!                  handle_response ←── reader task ←──response─┘
//! ```

mod channel;
mod invoker;
mod protocol;
mod registry;
mod transport;

pub use channel::{Channel, StreamChannel};
pub use invoker::RemoteInvoker;
pub use protocol::{ProviderRequest, ProviderResponse, WireMessage};
pub use registry::{AcceptAll, ProviderRegistry, StaticRegistry};
pub use transport::{connect_stream, connect_tcp, Connection};
