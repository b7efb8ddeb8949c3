//! Callee side of the NATS binding.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;

use super::channel::{spawn_router, subscribe_channels, SubjectSink};
use super::lifecycle::{CalleeState, Event, Lifecycle, Observer};
use super::pubsub::{Message, PubSub, Subscription};
use super::subject::{invocation_subject, Direction};
use crate::error::{Result, WireError};
use crate::handler::Registered;
use crate::index::Index;
use crate::invocation::{Invocation, Outgoing};
use crate::server::{dispatch, Server};

/// Serves a [`Server`]'s registered functions over NATS subjects.
#[derive(Clone)]
pub struct NatsServer {
    client: Arc<dyn PubSub>,
    server: Server,
}

impl NatsServer {
    pub fn new(client: Arc<dyn PubSub>, server: Server) -> Self {
        Self { client, server }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Subscribe every registered function and serve requests until the
    /// subscriptions end.
    pub async fn serve(&self) -> Result<()> {
        let prefix = self.server.config().nats.prefix.clone();
        let mut loops = Vec::with_capacity(self.server.registry().len());
        for entry in self.server.registry().functions() {
            let subject = invocation_subject(prefix.as_deref(), &entry.instance, &entry.name);
            let subscription = self.client.subscribe(&subject).await?;
            tracing::debug!(%subject, "serving function");
            loops.push(self.serve_function(entry.clone(), subscription));
        }
        join_all(loops).await;
        Ok(())
    }

    async fn serve_function(&self, entry: Arc<Registered>, mut requests: Subscription) {
        while let Some(request) = requests.next_message().await {
            let permit = match self.server.semaphore().clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let this = self.clone();
            let entry = entry.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = this.handle_request(&entry, request).await {
                    tracing::warn!(instance = %entry.instance, name = %entry.name, error = %e, "invocation failed");
                }
            });
        }
        tracing::debug!(subject = %requests.subject(), "request subscription ended");
    }

    /// Acknowledge one request and run its handler.
    ///
    /// Returns once the handler has finished the results and the caller's
    /// empty root parameter payload has arrived, or with `Timeout` if that
    /// payload does not arrive within the channel timeout.
    pub(crate) async fn handle_request(&self, entry: &Registered, request: Message) -> Result<()> {
        let config = self.server.config();
        let lifecycle = Arc::new(Lifecycle::new(CalleeState::Subscribed));
        lifecycle.apply(Event::Request)?;
        let Some(reply) = request.reply else {
            lifecycle.fail();
            return Err(WireError::MissingReplySubject);
        };

        let server_reply = self.client.new_inbox();
        let params = subscribe_channels(self.client.as_ref(), &server_reply, Direction::Params).await?;
        let (incoming, router) = spawn_router(
            params,
            server_reply.clone(),
            Direction::Params,
            request.payload,
            entry.signature.param_paths(),
            config.channel_timeout,
            lifecycle.clone(),
        )?
        .detached();

        // the caller may close its parameters as soon as it sees the ack
        lifecycle.apply(Event::Ack)?;
        if let Err(e) = self.client.publish(&reply, Some(&server_reply), Bytes::new()).await {
            lifecycle.fail();
            router.abort();
            return Err(e);
        }
        tracing::trace!(%reply, %server_reply, "acknowledged");

        let outgoing = Outgoing::new(Arc::new(SubjectSink::new(
            self.client.clone(),
            reply,
            Direction::Results,
            config.nats.max_payload,
            lifecycle.clone(),
        )));
        let result = match dispatch(entry, Invocation { outgoing, incoming }).await {
            Ok(()) => match tokio::time::timeout(config.channel_timeout, lifecycle.done()).await {
                Ok(_) => Ok(()),
                Err(_) => {
                    tracing::warn!(%server_reply, "parameters were never completed");
                    lifecycle.fail();
                    Err(WireError::Timeout(Index::root()))
                }
            },
            Err(e) => {
                lifecycle.fail();
                Err(e)
            }
        };
        router.abort();
        tracing::debug!(instance = %entry.instance, name = %entry.name, ok = result.is_ok(), "invocation done");
        result
    }
}
