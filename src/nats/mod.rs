//! NATS binding.
//!
//! NATS provides multiplexing natively, so invocation channels are subjects
//! rather than frames:
//! 1. The callee subscribes `[prefix.]wrpc.0.0.1.<instance>.<function>`.
//! 2. The caller subscribes its inbox `R_c` and `R_c.results[.>]`, then
//!    publishes the parameters on the function subject with reply `R_c`.
//! 3. The callee subscribes `R_s.params[.>]` on a fresh inbox `R_s` and
//!    acknowledges with an empty payload on `R_c`, reply `R_s`.
//! 4. Pending parameters flow on `R_s.params[.<index>]`, results on
//!    `R_c.results[.<index>]`. An empty payload closes a channel; on the root
//!    subject it completes that direction.
//!
//! The pub/sub client is abstracted by [`PubSub`]; [`LocalBroker`] is an
//! in-process implementation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wrpc_wire::nats::{LocalBroker, NatsClient, NatsServer};
//! use wrpc_wire::server::Server;
//! use wrpc_wire::value::{Signature, Type, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> wrpc_wire::Result<()> {
//! let broker = Arc::new(LocalBroker::new());
//! let signature = Signature::new(vec![Type::U32], vec![Type::U32]);
//!
//! let server = Server::builder()
//!     .handle("math", "double", signature.clone(), |params: Vec<Value>, cx| async move {
//!         let Value::U32(n) = params[0] else { return Ok(()) };
//!         cx.respond(&[Value::U32(n * 2)]).await?;
//!         Ok(())
//!     })
//!     .build();
//! let nats = NatsServer::new(broker.clone(), server);
//! tokio::spawn(async move { nats.serve().await });
//! # tokio::task::yield_now().await;
//!
//! let client = NatsClient::new(broker);
//! let response = client.call("math", "double", &signature, &[Value::U32(21)]).await?;
//! assert_eq!(response.values, vec![Value::U32(42)]);
//! # Ok(())
//! # }
//! ```

mod channel;
mod client;
pub mod lifecycle;
mod pubsub;
mod server;
pub mod subject;

pub use client::NatsClient;
pub use lifecycle::{CalleeState, CallerState, Closed, Event, Lifecycle, Machine};
pub use pubsub::{subject_matches, LocalBroker, Message, PubSub, Subscription};
pub use server::NatsServer;
