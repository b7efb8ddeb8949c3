//! Stream - results delivered as a `stream<u32>` over NATS subjects.
//!
//! This example demonstrates:
//! - Responding with a pending stream and sending its items later
//! - Reading the stream on the caller side as items arrive
//! - Waiting for both directions of the invocation to complete
//!
//! An in-process [`LocalBroker`] stands in for a NATS server.
//!
//! ```text
//! cargo run --example stream -- 5
//! ```

use std::sync::Arc;
use std::time::Duration;

use wrpc_wire::nats::{LocalBroker, NatsClient, NatsServer};
use wrpc_wire::server::Server;
use wrpc_wire::value::{encode_values, Signature, Type, Value};
use wrpc_wire::WireError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let count: u32 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 3,
    };
    let signature = Signature::new(vec![Type::U32], vec![Type::Stream(Box::new(Type::U32))]);

    let server = Server::builder()
        .handle("demo", "count", signature.clone(), |params: Vec<Value>, cx| async move {
            let Value::U32(n) = params[0] else {
                return Err(WireError::TypeMismatch("expected u32".into()));
            };
            // The stream is pending in the result; items follow on its channel
            let pending = cx.respond(&[Value::Stream(None)]).await?;
            let mut stream = cx.stream(&pending[0])?;
            for i in 0..n {
                tokio::time::sleep(Duration::from_millis(50)).await;
                stream.send(&[Value::U32(i)]).await?;
            }
            stream.end().await
        })
        .build();

    let broker = Arc::new(LocalBroker::new());
    let nats = NatsServer::new(broker.clone(), server);
    tokio::spawn(async move { nats.serve().await });
    while broker.subscription_count() == 0 {
        tokio::task::yield_now().await;
    }

    let client = NatsClient::new(broker);
    let params = encode_values(&signature.params, &[Value::U32(count)])?.bytes;
    let (invocation, lifecycle) = client
        .invoke_with_lifecycle("demo", "count", params, signature.result_paths())
        .await?;
    invocation.outgoing.finish().await?;

    let decoded = invocation.incoming.read_values(&signature.results).await?;
    let mut stream = invocation.incoming.stream(&decoded.deferred[0])?;
    while let Some(items) = stream.next().await? {
        println!("received {items:?}");
    }

    let state = tokio::time::timeout(Duration::from_secs(5), lifecycle.done()).await?;
    println!("invocation finished: {state:?}");

    Ok(())
}
