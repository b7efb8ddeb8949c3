//! Integration tests for wrpc-wire over framed transports.
//!
//! These tests run real clients against real servers over TCP, Unix sockets
//! and in-memory pipes.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use wrpc_wire::client::Client;
use wrpc_wire::config::Config;
use wrpc_wire::invocation::write_future;
use wrpc_wire::protocol::{build_frame, encode_preamble, FrameBuffer, Header};
use wrpc_wire::server::Server;
use wrpc_wire::transport::framed;
use wrpc_wire::transport::tcp::TcpAcceptor;
use wrpc_wire::value::{encode_values, Signature, Type, Value};
use wrpc_wire::{Index, WireError};

fn echo_server() -> Server {
    Server::builder()
        .handle(
            "demo",
            "echo",
            Signature::new(vec![Type::String], vec![Type::String]),
            |params: Vec<Value>, cx| async move {
                cx.respond(&params).await?;
                Ok(())
            },
        )
        .handle(
            "demo",
            "count",
            Signature::new(vec![Type::U32], vec![Type::Stream(Box::new(Type::U32))]),
            |params: Vec<Value>, cx| async move {
                let Value::U32(n) = params[0] else {
                    return Err(WireError::TypeMismatch("expected u32".into()));
                };
                let pending = cx.respond(&[Value::Stream(None)]).await?;
                let mut stream = cx.stream(&pending[0])?;
                for chunk in (0..n).collect::<Vec<_>>().chunks(3) {
                    let items: Vec<Value> = chunk.iter().copied().map(Value::U32).collect();
                    stream.send(&items).await?;
                }
                stream.end().await
            },
        )
        .build()
}

/// A call with no parameters writes exactly the version byte and header,
/// then half-closes.
#[tokio::test]
async fn test_ping_over_tcp_is_header_only() {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    let client = Client::new(acceptor.connector().unwrap());

    let server = tokio::spawn(async move {
        use wrpc_wire::transport::Accept;
        let (mut rx, _tx) = acceptor.accept().await.unwrap();
        let mut received = Vec::new();
        rx.read_to_end(&mut received).await.unwrap();
        received
    });

    let invocation = client
        .invoke("demo", "ping", Bytes::new(), Vec::new())
        .await
        .unwrap();
    invocation.outgoing.finish().await.unwrap();
    drop(invocation.outgoing);

    let received = server.await.unwrap();
    assert_eq!(
        received,
        vec![0x00, 0x04, b'd', b'e', b'm', b'o', 0x04, b'p', b'i', b'n', b'g']
    );

    let mut buffer = FrameBuffer::with_header();
    assert!(buffer.push(&received).unwrap().is_empty());
    assert_eq!(buffer.header(), Some(&Header::new("demo", "ping")));
    buffer.finish().unwrap();
}

#[tokio::test]
async fn test_echo_over_tcp() {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    let client = Client::new(acceptor.connector().unwrap());
    let server = echo_server();
    tokio::spawn(async move { server.serve(acceptor).await });

    let signature = Signature::new(vec![Type::String], vec![Type::String]);
    let response = client
        .call("demo", "echo", &signature, &[Value::String("hello".into())])
        .await
        .unwrap();
    assert_eq!(response.values, vec![Value::String("hello".into())]);
    assert!(response.deferred.is_empty());
}

#[tokio::test]
async fn test_concurrent_calls_over_tcp() {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    let client = std::sync::Arc::new(Client::new(acceptor.connector().unwrap()));
    let server = echo_server();
    tokio::spawn(async move { server.serve(acceptor).await });

    let mut calls = Vec::new();
    for i in 0..16 {
        let client = client.clone();
        calls.push(tokio::spawn(async move {
            let signature = Signature::new(vec![Type::String], vec![Type::String]);
            let message = Value::String(format!("message_{i}"));
            let response = client
                .call("demo", "echo", &signature, std::slice::from_ref(&message))
                .await
                .unwrap();
            assert_eq!(response.values, vec![message]);
        }));
    }
    for call in calls {
        call.await.unwrap();
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_stream_results_over_unix_socket() {
    use wrpc_wire::transport::unix::{generate_socket_path, UnixAcceptor};

    let acceptor = UnixAcceptor::bind(generate_socket_path()).unwrap();
    let client = Client::new(acceptor.connector());
    let server = echo_server();
    tokio::spawn(async move { server.serve(acceptor).await });

    let signature = Signature::new(vec![Type::U32], vec![Type::Stream(Box::new(Type::U32))]);
    let response = client
        .call("demo", "count", &signature, &[Value::U32(7)])
        .await
        .unwrap();
    assert_eq!(response.values, vec![Value::Stream(None)]);
    assert_eq!(response.deferred[0].index, Index::try_from([0]).unwrap());

    let mut stream = response.stream(&response.deferred[0]).unwrap();
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await.unwrap() {
        chunks.push(chunk);
    }
    assert_eq!(chunks.len(), 3);
    assert_eq!(
        chunks.concat(),
        (0..7).map(Value::U32).collect::<Vec<_>>()
    );
}

/// A pending parameter future is delivered after the call has started.
#[tokio::test]
async fn test_pending_param_over_duplex() {
    let server = Server::builder()
        .handle(
            "demo",
            "await",
            Signature::new(vec![Type::Future(Box::new(Type::String))], vec![Type::String]),
            |_params: Vec<Value>, cx| async move {
                let position = cx.deferred_params()[0].clone();
                let delivered = cx.param_future(&position)?.read().await?;
                cx.respond(&[delivered.value]).await?;
                Ok(())
            },
        )
        .build();

    let (client_io, server_io) = tokio::io::duplex(4096);
    let (srx, stx) = tokio::io::split(server_io);
    tokio::spawn(async move { server.serve_connection(srx, stx).await });

    let params = [Type::Future(Box::new(Type::String))];
    let encoded = encode_values(&params, &[Value::Future(None)]).unwrap();
    let (crx, ctx) = tokio::io::split(client_io);
    let invocation = framed::invoke(
        crx,
        ctx,
        "demo",
        "await",
        encoded.bytes,
        Vec::new(),
        &Config::default(),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    write_future(&invocation.outgoing, &encoded.deferred[0], &Value::String("later".into()))
        .await
        .unwrap();
    drop(invocation.outgoing);

    let results = invocation.incoming.read_values(&[Type::String]).await.unwrap();
    assert_eq!(results.values, vec![Value::String("later".into())]);
}

/// Frames for undeclared indices fail only the affected invocation.
#[tokio::test]
async fn test_unknown_index_fails_only_that_invocation() {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    let connector = acceptor.connector().unwrap();
    let server = echo_server();
    tokio::spawn(async move { server.serve(acceptor).await });

    {
        use tokio::io::AsyncWriteExt;
        use wrpc_wire::transport::Connect;

        let (mut rx, mut tx) = connector.connect().await.unwrap();
        let mut bytes = encode_preamble(&Header::new("demo", "echo")).unwrap().to_vec();
        bytes.extend(build_frame(&Index::try_from([3]).unwrap(), b"junk").unwrap());
        tx.write_all(&bytes).await.unwrap();
        tx.shutdown().await.unwrap();

        let mut reply = Vec::new();
        rx.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());
    }

    let client = Client::new(connector);
    let signature = Signature::new(vec![Type::String], vec![Type::String]);
    let response = client
        .call("demo", "echo", &signature, &[Value::String("still fine".into())])
        .await
        .unwrap();
    assert_eq!(response.values, vec![Value::String("still fine".into())]);
}

#[tokio::test]
async fn test_unknown_function_is_abnormal_close() {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    let client = Client::new(acceptor.connector().unwrap());
    let server = echo_server();
    tokio::spawn(async move { server.serve(acceptor).await });

    let signature = Signature::new(vec![], vec![Type::U8]);
    assert!(matches!(
        client.call("demo", "missing", &signature, &[]).await,
        Err(WireError::AbnormalClose(index)) if index.is_root()
    ));
}

/// Test multiple frames in sequence.
#[test]
fn test_multiple_frames_sequence() {
    let mut buffer = FrameBuffer::new();
    let mut all_bytes = Vec::new();

    for i in 1u32..=5 {
        let path = Index::try_from([i, i * 100]).unwrap();
        all_bytes.extend(build_frame(&path, format!("message_{i}").as_bytes()).unwrap());
    }

    let frames = buffer.push(&all_bytes).unwrap();
    assert_eq!(frames.len(), 5);
    for (i, frame) in frames.iter().enumerate() {
        let i = i as u32 + 1;
        assert_eq!(frame.path.as_slice(), &[i, i * 100]);
        assert_eq!(frame.data, Bytes::from(format!("message_{i}")));
    }
    buffer.finish().unwrap();
}
