//! Publish/subscribe seam and an in-process broker.
//!
//! The binding only needs subject publish with an optional reply, wildcard
//! subscriptions and unique inbox names. [`PubSub`] captures exactly that, so
//! an application wires in its NATS client, and tests use [`LocalBroker`].

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

use crate::error::{Result, WireError};
use crate::invocation::{lock, BoxFuture};

/// A received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub reply: Option<String>,
    pub payload: Bytes,
}

/// Messages delivered to one subscription, in publish order per subject.
pub struct Subscription {
    subject: String,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Subscription {
    pub fn new(subject: impl Into<String>, rx: mpsc::UnboundedReceiver<Message>) -> Self {
        Self {
            subject: subject.into(),
            rx,
        }
    }

    /// The pattern this subscription was made with.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Next message, `None` once the connection is gone.
    pub async fn next_message(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Message>> {
        self.rx.poll_recv(cx)
    }
}

/// Pub/sub client used by the NATS binding.
pub trait PubSub: Send + Sync + 'static {
    /// Publish `payload` on `subject`.
    ///
    /// # Errors
    ///
    /// `NoResponders` when a reply is requested and nobody is subscribed.
    fn publish<'a>(
        &'a self,
        subject: &'a str,
        reply: Option<&'a str>,
        payload: Bytes,
    ) -> BoxFuture<'a, Result<()>>;

    /// Subscribe to `subject`; `*` matches one token, `>` the rest.
    fn subscribe<'a>(&'a self, subject: &'a str) -> BoxFuture<'a, Result<Subscription>>;

    /// A subject unique to this client, suitable as a reply address.
    fn new_inbox(&self) -> String;
}

/// Whether `subject` is covered by the subscription `pattern`.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern = pattern.split('.');
    let mut subject = subject.split('.');
    loop {
        match (pattern.next(), subject.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

struct Subscriber {
    pattern: String,
    tx: mpsc::UnboundedSender<Message>,
}

/// In-process broker with NATS subject semantics.
#[derive(Clone, Default)]
pub struct LocalBroker {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|s| !s.tx.is_closed());
        subscribers.len()
    }

    fn deliver(&self, subject: &str, reply: Option<&str>, payload: Bytes) -> Result<()> {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|s| !s.tx.is_closed());

        let mut delivered = 0usize;
        for sub in subscribers.iter().filter(|s| subject_matches(&s.pattern, subject)) {
            let message = Message {
                subject: subject.to_string(),
                reply: reply.map(str::to_string),
                payload: payload.clone(),
            };
            if sub.tx.send(message).is_ok() {
                delivered += 1;
            }
        }

        if delivered == 0 && reply.is_some() {
            return Err(WireError::NoResponders(subject.to_string()));
        }
        tracing::trace!(subject, delivered, len = payload.len(), "published");
        Ok(())
    }
}

impl PubSub for LocalBroker {
    fn publish<'a>(
        &'a self,
        subject: &'a str,
        reply: Option<&'a str>,
        payload: Bytes,
    ) -> BoxFuture<'a, Result<()>> {
        let result = self.deliver(subject, reply, payload);
        Box::pin(async move { result })
    }

    fn subscribe<'a>(&'a self, subject: &'a str) -> BoxFuture<'a, Result<Subscription>> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(Subscriber {
            pattern: subject.to_string(),
            tx,
        });
        Box::pin(async move { Ok(Subscription::new(subject, rx)) })
    }

    fn new_inbox(&self) -> String {
        format!("_INBOX.{}", uuid::Uuid::new_v4().simple())
    }
}
