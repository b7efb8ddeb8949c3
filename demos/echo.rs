//! Echo - simple request/response over TCP.
//!
//! This example demonstrates:
//! - Registering a handler on a [`Server`] with the builder pattern
//! - Serving the registry on a TCP listener
//! - Calling the function with a [`Client`] and reading the result
//!
//! ```text
//! cargo run --example echo -- "hello wrpc"
//! ```

use wrpc_wire::client::Client;
use wrpc_wire::server::Server;
use wrpc_wire::transport::tcp::TcpAcceptor;
use wrpc_wire::value::{Signature, Type, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let message = std::env::args().nth(1).unwrap_or_else(|| "hello".to_string());
    let signature = Signature::new(vec![Type::String], vec![Type::String]);

    let server = Server::builder()
        // Respond with the parameters unchanged
        .handle("demo", "echo", signature.clone(), |params: Vec<Value>, cx| async move {
            cx.respond(&params).await?;
            Ok(())
        })
        .build();

    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await?;
    println!("serving on {}", acceptor.local_addr()?);
    let client = Client::new(acceptor.connector()?);
    tokio::spawn(async move { server.serve(acceptor).await });

    let response = client
        .call("demo", "echo", &signature, &[Value::String(message)])
        .await?;
    println!("echo: {:?}", response.values);

    Ok(())
}
