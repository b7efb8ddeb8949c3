//! Invocation lifecycle for each role.
//!
//! ```text
//! caller: Idle ──Publish──► AwaitingAck ──Ack──► Streaming ──both closed──► Done
//! callee: Subscribed ──Request──► Dispatched ──Ack──► Streaming ──both closed──► Done
//! ```
//!
//! While streaming, each direction closes once: `SendDone` when this side
//! publishes the empty payload on its root subject, `ReceiveDone` when the
//! peer's one is observed. The invocation is `Done` when both have happened.
//! `Fail` moves any active state straight to `Done`. Every other pair is
//! rejected with `IllegalTransition`.
//!
//! A [`Lifecycle`] shares one state between the task running the invocation
//! and the channel plumbing that observes the root closes.

use tokio::sync::watch;

use crate::error::{Result, WireError};

/// Events driving both state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Caller published the invocation request.
    Publish,
    /// Callee received an invocation request.
    Request,
    /// Acknowledgment sent (callee) or received (caller).
    Ack,
    /// This side published the empty payload on its root subject.
    SendDone,
    /// The peer's empty root payload arrived.
    ReceiveDone,
    /// Timeout, trap or transport failure.
    Fail,
}

impl Event {
    fn name(self) -> &'static str {
        match self {
            Event::Publish => "Publish",
            Event::Request => "Request",
            Event::Ack => "Ack",
            Event::SendDone => "SendDone",
            Event::ReceiveDone => "ReceiveDone",
            Event::Fail => "Fail",
        }
    }
}

/// Directions that have carried their terminating root payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Closed {
    pub sent: bool,
    pub received: bool,
}

impl Closed {
    /// Record a close; `None` if that direction was already closed.
    fn record(self, event: Event) -> Option<Self> {
        match event {
            Event::SendDone if !self.sent => Some(Self { sent: true, ..self }),
            Event::ReceiveDone if !self.received => Some(Self { received: true, ..self }),
            _ => None,
        }
    }

    fn both(self) -> bool {
        self.sent && self.received
    }
}

/// A per-role state machine.
pub trait Machine: Copy + PartialEq + Send + Sync + 'static {
    fn transition(self, event: Event) -> Result<Self>;
    fn name(self) -> &'static str;
    fn is_done(self) -> bool;
}

fn illegal(state: &'static str, event: Event) -> WireError {
    WireError::IllegalTransition {
        state,
        event: event.name(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerState {
    Idle,
    AwaitingAck,
    Streaming(Closed),
    Done,
}

impl CallerState {
    fn streaming(closed: Closed) -> Self {
        if closed.both() {
            CallerState::Done
        } else {
            CallerState::Streaming(closed)
        }
    }
}

impl Machine for CallerState {
    fn transition(self, event: Event) -> Result<Self> {
        let next = match (self, event) {
            (CallerState::Idle, Event::Publish) => Some(CallerState::AwaitingAck),
            (CallerState::AwaitingAck, Event::Ack) => Some(CallerState::Streaming(Closed::default())),
            (CallerState::Streaming(closed), Event::SendDone | Event::ReceiveDone) => {
                closed.record(event).map(CallerState::streaming)
            }
            (CallerState::AwaitingAck | CallerState::Streaming(_), Event::Fail) => Some(CallerState::Done),
            _ => None,
        };
        let next = next.ok_or_else(|| illegal(self.name(), event))?;
        tracing::trace!(from = self.name(), to = next.name(), event = event.name(), "caller transition");
        Ok(next)
    }

    fn name(self) -> &'static str {
        match self {
            CallerState::Idle => "Idle",
            CallerState::AwaitingAck => "AwaitingAck",
            CallerState::Streaming(_) => "Streaming",
            CallerState::Done => "Done",
        }
    }

    fn is_done(self) -> bool {
        self == CallerState::Done
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalleeState {
    Subscribed,
    Dispatched,
    Streaming(Closed),
    Done,
}

impl CalleeState {
    fn streaming(closed: Closed) -> Self {
        if closed.both() {
            CalleeState::Done
        } else {
            CalleeState::Streaming(closed)
        }
    }
}

impl Machine for CalleeState {
    fn transition(self, event: Event) -> Result<Self> {
        let next = match (self, event) {
            (CalleeState::Subscribed, Event::Request) => Some(CalleeState::Dispatched),
            (CalleeState::Dispatched, Event::Ack) => Some(CalleeState::Streaming(Closed::default())),
            (CalleeState::Streaming(closed), Event::SendDone | Event::ReceiveDone) => {
                closed.record(event).map(CalleeState::streaming)
            }
            (CalleeState::Dispatched | CalleeState::Streaming(_), Event::Fail) => Some(CalleeState::Done),
            _ => None,
        };
        let next = next.ok_or_else(|| illegal(self.name(), event))?;
        tracing::trace!(from = self.name(), to = next.name(), event = event.name(), "callee transition");
        Ok(next)
    }

    fn name(self) -> &'static str {
        match self {
            CalleeState::Subscribed => "Subscribed",
            CalleeState::Dispatched => "Dispatched",
            CalleeState::Streaming(_) => "Streaming",
            CalleeState::Done => "Done",
        }
    }

    fn is_done(self) -> bool {
        self == CalleeState::Done
    }
}

/// Receives the lifecycle events seen by subject sinks and routers.
pub(crate) trait Observer: Send + Sync {
    fn observe(&self, event: Event) -> Result<()>;

    /// Fail the invocation unless it is already done.
    fn fail(&self);
}

/// The state of one invocation, shared by everything that drives it.
#[derive(Debug)]
pub struct Lifecycle<S> {
    state: watch::Sender<S>,
}

impl<S: Machine> Lifecycle<S> {
    pub fn new(initial: S) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    pub fn state(&self) -> S {
        *self.state.borrow()
    }

    /// Apply `event`, returning the new state.
    pub fn apply(&self, event: Event) -> Result<S> {
        let mut outcome = Err(WireError::ConnectionClosed);
        self.state.send_if_modified(|state| match state.transition(event) {
            Ok(next) => {
                let changed = next != *state;
                *state = next;
                outcome = Ok(next);
                changed
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    /// Wait until the state is `Done`.
    pub async fn done(&self) -> S {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|state| state.is_done()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }
}

impl<S: Machine> Observer for Lifecycle<S> {
    fn observe(&self, event: Event) -> Result<()> {
        self.apply(event).map(|_| ())
    }

    fn fail(&self) {
        self.state.send_if_modified(|state| {
            if state.is_done() {
                return false;
            }
            match state.transition(Event::Fail) {
                Ok(next) => {
                    *state = next;
                    true
                }
                Err(_) => false,
            }
        });
    }
}
