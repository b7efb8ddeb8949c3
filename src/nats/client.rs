//! Caller side of the NATS binding.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::channel::{spawn_router, subscribe_channels, SubjectSink};
use super::lifecycle::{CallerState, Event, Lifecycle, Observer};
use super::pubsub::PubSub;
use super::subject::{invocation_subject, Direction};
use crate::client::{complete, encode_params, Response};
use crate::config::Config;
use crate::error::{Result, WireError};
use crate::handler::rpc_func_name;
use crate::index::{Index, IndexPattern};
use crate::invocation::{Invocation, Outgoing};
use crate::value::{Signature, Value};

/// Invokes functions over NATS subjects.
#[derive(Clone)]
pub struct NatsClient {
    client: Arc<dyn PubSub>,
    config: Config,
}

impl NatsClient {
    pub fn new(client: Arc<dyn PubSub>) -> Self {
        Self {
            client,
            config: Config::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the subject prefix placed before `wrpc.0.0.1`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.nats.prefix = Some(prefix.into());
        self
    }

    /// Set how long to wait for the callee's acknowledgment.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout = timeout;
        self
    }

    /// Set the largest payload published in one message.
    pub fn max_payload(mut self, max: usize) -> Self {
        self.config.nats.max_payload = max;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start an invocation.
    ///
    /// Parameters that do not fit in one message are sent inline up to the
    /// max payload and the remainder on the root parameter subject once the
    /// callee has acknowledged.
    ///
    /// # Errors
    ///
    /// `NoResponders` when nobody serves the function, `AckTimeout` when the
    /// callee does not acknowledge in time, `MissingReplySubject` when the
    /// acknowledgment carries no reply subject.
    pub async fn invoke(
        &self,
        instance: &str,
        name: &str,
        params: Bytes,
        paths: Vec<IndexPattern>,
    ) -> Result<Invocation> {
        let (invocation, _) = self.invoke_with_lifecycle(instance, name, params, paths).await?;
        Ok(invocation)
    }

    /// Like [`invoke`](Self::invoke), also returning the invocation's
    /// lifecycle.
    ///
    /// The lifecycle reaches [`CallerState::Done`] once the parameters have
    /// been finished and the callee's empty root result payload has arrived,
    /// or as soon as the invocation fails.
    pub async fn invoke_with_lifecycle(
        &self,
        instance: &str,
        name: &str,
        params: Bytes,
        paths: Vec<IndexPattern>,
    ) -> Result<(Invocation, Arc<Lifecycle<CallerState>>)> {
        let subject = invocation_subject(self.config.nats.prefix.as_deref(), instance, rpc_func_name(name));
        let reply = self.client.new_inbox();
        let max_payload = self.config.nats.max_payload.max(1);

        let mut acks = self.client.subscribe(&reply).await?;
        let results = subscribe_channels(self.client.as_ref(), &reply, Direction::Results).await?;

        let split = params.len().min(max_payload);
        let (inline, rest) = (params.slice(..split), params.slice(split..));

        let lifecycle = Arc::new(Lifecycle::new(CallerState::Idle));
        self.client.publish(&subject, Some(&reply), inline).await?;
        lifecycle.apply(Event::Publish)?;
        tracing::debug!(%subject, %reply, "invocation published");

        let ack = match tokio::time::timeout(self.config.ack_timeout, acks.next_message()).await {
            Ok(Some(ack)) => ack,
            Ok(None) => {
                lifecycle.fail();
                return Err(WireError::ConnectionClosed);
            }
            Err(_) => {
                lifecycle.fail();
                return Err(WireError::AckTimeout(subject));
            }
        };
        let Some(server_reply) = ack.reply else {
            lifecycle.fail();
            return Err(WireError::MissingReplySubject);
        };
        lifecycle.apply(Event::Ack)?;
        tracing::trace!(%subject, %server_reply, "acknowledged");

        let outgoing = Outgoing::new(Arc::new(SubjectSink::new(
            self.client.clone(),
            server_reply,
            Direction::Params,
            max_payload,
            lifecycle.clone(),
        )));
        if !rest.is_empty() {
            tracing::trace!(len = rest.len(), "sending parameter remainder");
            if let Err(e) = outgoing.index(Index::root())?.write(rest).await {
                lifecycle.fail();
                return Err(e);
            }
        }

        let incoming = spawn_router(
            results,
            reply,
            Direction::Results,
            Bytes::new(),
            paths,
            self.config.channel_timeout,
            lifecycle.clone(),
        )?
        .attached();
        Ok((Invocation { outgoing, incoming }, lifecycle))
    }

    /// Invoke with fully-ready parameters and decode the results.
    pub async fn call(
        &self,
        instance: &str,
        name: &str,
        signature: &Signature,
        params: &[Value],
    ) -> Result<Response> {
        let params = encode_params(signature, params)?;
        let invocation = self
            .invoke(instance, name, params, signature.result_paths())
            .await?;
        complete(invocation, signature).await
    }
}
