//! Invocation channels carried on subjects.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{select_all, StreamExt};
use tokio::task::AbortHandle;

use super::lifecycle::{Event, Observer};
use super::pubsub::{PubSub, Subscription};
use super::subject::{channel_subject, channel_wildcards, parse_channel_subject, Direction};
use crate::error::Result;
use crate::index::{Index, IndexPattern};
use crate::invocation::{BoxFuture, ChannelSink, Demux, Incoming};

/// Publishes channel data on `<reply>.<direction>[.<index>]`.
///
/// Data longer than the max payload is split across several messages; the
/// receiving side reassembles them as a byte stream per channel.
pub(crate) struct SubjectSink {
    client: Arc<dyn PubSub>,
    reply: String,
    direction: Direction,
    max_payload: usize,
    lifecycle: Arc<dyn Observer>,
}

impl SubjectSink {
    pub(crate) fn new(
        client: Arc<dyn PubSub>,
        reply: String,
        direction: Direction,
        max_payload: usize,
        lifecycle: Arc<dyn Observer>,
    ) -> Self {
        Self {
            client,
            reply,
            direction,
            max_payload: max_payload.max(1),
            lifecycle,
        }
    }

    async fn publish(&self, index: &Index, data: Bytes) -> Result<()> {
        let subject = channel_subject(&self.reply, self.direction, index);
        if data.is_empty() {
            tracing::trace!(%subject, "closing channel");
            return self.client.publish(&subject, None, data).await;
        }
        let mut offset = 0;
        while offset < data.len() {
            let end = data.len().min(offset + self.max_payload);
            self.client
                .publish(&subject, None, data.slice(offset..end))
                .await?;
            offset = end;
        }
        Ok(())
    }
}

impl ChannelSink for SubjectSink {
    fn send(&self, index: &Index, data: Bytes) -> BoxFuture<'_, Result<()>> {
        let index = index.clone();
        Box::pin(async move { self.publish(&index, data).await })
    }

    /// An empty payload on the root subject completes this direction.
    fn finish(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.publish(&Index::root(), Bytes::new()).await?;
            self.lifecycle.observe(Event::SendDone)
        })
    }
}

/// Subscribe to every channel subject of one direction.
pub(crate) async fn subscribe_channels(
    client: &dyn PubSub,
    reply: &str,
    direction: Direction,
) -> Result<Vec<Subscription>> {
    let mut subscriptions = Vec::with_capacity(2);
    for subject in channel_wildcards(reply, direction) {
        subscriptions.push(client.subscribe(&subject).await?);
    }
    Ok(subscriptions)
}

/// Channel subjects of one direction being routed into a [`Demux`].
pub(crate) struct Router {
    demux: Arc<Demux>,
    task: AbortHandle,
    timeout: Duration,
}

impl Router {
    /// Readers whose drop stops the routing task.
    pub(crate) fn attached(self) -> Incoming {
        Incoming::new(self.demux, self.timeout, Some(self.task))
    }

    /// Readers, and the routing task for the caller to stop.
    pub(crate) fn detached(self) -> (Incoming, AbortHandle) {
        (Incoming::new(self.demux, self.timeout, None), self.task)
    }
}

/// Route subscribed channel messages into a fresh [`Incoming`].
///
/// `initial` is root data that arrived outside the channel subjects (the
/// request payload). The empty root payload that completes the direction is
/// reported to `lifecycle` as `ReceiveDone`. The routing task runs until its
/// subscriptions end or `task` is aborted.
pub(crate) fn spawn_router(
    subscriptions: Vec<Subscription>,
    reply: String,
    direction: Direction,
    initial: Bytes,
    paths: Vec<IndexPattern>,
    timeout: Duration,
    lifecycle: Arc<dyn Observer>,
) -> Result<Router> {
    let demux = Arc::new(Demux::new(paths));
    if !initial.is_empty() {
        demux.deliver(Index::root(), initial)?;
    }
    let task = tokio::spawn(route(subscriptions, reply, direction, demux.clone(), lifecycle));
    Ok(Router {
        demux,
        task: task.abort_handle(),
        timeout,
    })
}

async fn route(
    subscriptions: Vec<Subscription>,
    reply: String,
    direction: Direction,
    demux: Arc<Demux>,
    lifecycle: Arc<dyn Observer>,
) {
    let mut messages = select_all(subscriptions);
    while let Some(message) = messages.next().await {
        let routed = parse_channel_subject(&reply, direction, &message.subject).and_then(|index| {
            let completes = index.is_root() && message.payload.is_empty();
            demux.deliver(index, message.payload)?;
            if completes {
                lifecycle.observe(Event::ReceiveDone)?;
            }
            Ok(())
        });
        if let Err(e) = routed {
            tracing::warn!(subject = %message.subject, error = %e, "channel routing failed");
            demux.fail(&e);
            lifecycle.fail();
            return;
        }
    }
    tracing::trace!(%reply, "subscriptions ended");
    demux.close_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::lifecycle::{CallerState, Closed, Lifecycle};
    use crate::nats::pubsub::LocalBroker;

    fn streaming() -> Arc<Lifecycle<CallerState>> {
        Arc::new(Lifecycle::new(CallerState::Streaming(Closed::default())))
    }

    #[tokio::test]
    async fn test_sink_splits_large_data() {
        let broker = LocalBroker::new();
        let mut sub = broker.subscribe("R.params").await.unwrap();
        let lifecycle = streaming();
        let sink = SubjectSink::new(
            Arc::new(broker.clone()),
            "R".into(),
            Direction::Params,
            4,
            lifecycle.clone(),
        );

        sink.send(&Index::root(), Bytes::from_static(b"0123456789")).await.unwrap();
        sink.finish().await.unwrap();
        assert_eq!(
            lifecycle.state(),
            CallerState::Streaming(Closed { sent: true, received: false })
        );

        let mut parts = Vec::new();
        for _ in 0..4 {
            parts.push(sub.next_message().await.unwrap().payload);
        }
        assert_eq!(
            parts,
            vec![
                Bytes::from_static(b"0123"),
                Bytes::from_static(b"4567"),
                Bytes::from_static(b"89"),
                Bytes::new(),
            ]
        );
    }

    #[tokio::test]
    async fn test_router_delivers_by_subject() {
        let broker = LocalBroker::new();
        let subscriptions = subscribe_channels(&broker, "R", Direction::Results).await.unwrap();
        let lifecycle = streaming();
        let incoming = spawn_router(
            subscriptions,
            "R".into(),
            Direction::Results,
            Bytes::from_static(b"a"),
            vec![vec![Some(2)]],
            Duration::from_secs(5),
            lifecycle.clone(),
        )
        .unwrap()
        .attached();

        broker.publish("R.results", None, Bytes::from_static(b"b")).await.unwrap();
        broker.publish("R.results", None, Bytes::new()).await.unwrap();
        broker.publish("R.results.2", None, Bytes::from_static(b"c")).await.unwrap();

        let mut root = incoming.take(Index::root()).unwrap();
        assert_eq!(root.recv().await.unwrap(), Some(Bytes::from_static(b"a")));
        assert_eq!(root.recv().await.unwrap(), Some(Bytes::from_static(b"b")));
        assert_eq!(root.recv().await.unwrap(), None);
        assert_eq!(
            lifecycle.state(),
            CallerState::Streaming(Closed { sent: false, received: true })
        );
        let mut nested = incoming.take(Index::try_from([2]).unwrap()).unwrap();
        assert_eq!(nested.recv().await.unwrap(), Some(Bytes::from_static(b"c")));
    }

    #[tokio::test]
    async fn test_router_fails_on_unknown_index() {
        let broker = LocalBroker::new();
        let subscriptions = subscribe_channels(&broker, "R", Direction::Results).await.unwrap();
        let lifecycle = streaming();
        let incoming = spawn_router(
            subscriptions,
            "R".into(),
            Direction::Results,
            Bytes::new(),
            Vec::new(),
            Duration::from_secs(5),
            lifecycle.clone(),
        )
        .unwrap()
        .attached();

        broker.publish("R.results.7", None, Bytes::from_static(b"x")).await.unwrap();
        let mut root = incoming.take(Index::root()).unwrap();
        assert!(matches!(root.recv().await, Err(crate::WireError::Transport(_))));
        assert_eq!(lifecycle.state(), CallerState::Done);
    }
}
