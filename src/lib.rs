//! # wrpc-wire
//!
//! Wire protocol for invoking interface-described functions whose parameters
//! and results may contain `future<T>` and `stream<T>` values.
//!
//! ## Architecture
//!
//! - **Index**: every nested async position of a signature has a stable
//!   address ([`Index`]), so data delivered later can be routed to it
//! - **Values**: component-model style encoding extended with pending
//!   futures, streams and opaque resources ([`value`])
//! - **Framing**: `0x00 | header | frame*` over one byte stream per
//!   invocation for TCP, Unix sockets and QUIC ([`protocol`], [`transport`])
//! - **NATS**: channels mapped to subjects with an ack handshake ([`nats`])
//!
//! ## Example
//!
//! ```
//! use wrpc_wire::client::Client;
//! use wrpc_wire::server::Server;
//! use wrpc_wire::transport::tcp::TcpAcceptor;
//! use wrpc_wire::value::{Signature, Type, Value};
//!
//! # #[tokio::main]
//! # async fn main() -> wrpc_wire::Result<()> {
//! let signature = Signature::new(vec![Type::String], vec![Type::String]);
//! let server = Server::builder()
//!     .handle("demo", "echo", signature.clone(), |params: Vec<Value>, cx| async move {
//!         cx.respond(&params).await?;
//!         Ok(())
//!     })
//!     .build();
//!
//! let acceptor = TcpAcceptor::bind("127.0.0.1:0").await?;
//! let client = Client::new(acceptor.connector()?);
//! tokio::spawn(async move { server.serve(acceptor).await });
//!
//! let response = client
//!     .call("demo", "echo", &signature, &[Value::String("hello".into())])
//!     .await?;
//! assert_eq!(response.values, vec![Value::String("hello".into())]);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod index;
pub mod invocation;
pub mod nats;
pub mod protocol;
pub mod resource;
pub mod server;
pub mod status;
pub mod target;
pub mod transport;
pub mod value;
pub mod writer;

pub use client::Client;
pub use config::Config;
pub use error::{Result, WireError};
pub use handler::InvocationContext;
pub use index::Index;
pub use invocation::Invocation;
pub use server::{Server, ServerBuilder};
