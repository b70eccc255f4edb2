//! Bounded-mailbox actors.
//!
//! An actor owns its state and handles one message at a time on its own task.
//! Callers hold an [`Addr`]; when every `Addr` is dropped the mailbox closes
//! and the actor finishes after draining what was already queued.

use std::marker::PhantomData;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[async_trait::async_trait]
pub trait Actor: Send + Sized + 'static {
    type Msg: Send + 'static;

    /// Used in log events.
    const NAME: &'static str = "actor";

    /// Handle a single message. Return `Err` to stop the actor.
    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()>;
}

/// Per-run state handed to [`Actor::handle`].
pub struct Context<A: Actor> {
    stop: bool,
    handled: u64,
    _actor: PhantomData<fn() -> A>,
}

impl<A: Actor> Context<A> {
    /// Finish after the current message; anything still queued is dropped.
    pub fn stop(&mut self) {
        self.stop = true;
    }

    /// Messages handled before the current one.
    pub fn handled(&self) -> u64 {
        self.handled
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MailboxError {
    #[error("mailbox closed")]
    Closed,
    #[error("mailbox full")]
    Full,
    #[error("actor dropped the reply")]
    NoReply,
}

pub struct Addr<A: Actor>(mpsc::Sender<A::Msg>);

impl<A: Actor> Clone for Addr<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A: Actor> Addr<A> {
    /// Queue `msg`, waiting for room in the mailbox.
    pub async fn send(&self, msg: A::Msg) -> Result<(), MailboxError> {
        self.0.send(msg).await.map_err(|_| MailboxError::Closed)
    }

    pub fn try_send(&self, msg: A::Msg) -> Result<(), MailboxError> {
        self.0.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => MailboxError::Full,
            mpsc::error::TrySendError::Closed(_) => MailboxError::Closed,
        })
    }

    /// Send a message carrying a reply slot and wait for the answer.
    pub async fn call<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> A::Msg,
    ) -> Result<R, MailboxError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| MailboxError::NoReply)
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

pub struct ActorHandle<A: Actor> {
    pub addr: Addr<A>,
    pub task: JoinHandle<Result<()>>,
}

/// Run `actor` on its own task behind a mailbox of `capacity` messages.
///
/// The task ends when `handle` fails, when `ctx.stop()` is called, or when
/// the last `Addr` is dropped.
pub fn spawn_actor<A: Actor>(mut actor: A, capacity: usize) -> ActorHandle<A> {
    let (tx, mut rx) = mpsc::channel::<A::Msg>(capacity);

    let task = tokio::spawn(async move {
        let mut ctx = Context {
            stop: false,
            handled: 0,
            _actor: PhantomData,
        };
        tracing::debug!(actor = A::NAME, capacity, "actor.started");
        while let Some(msg) = rx.recv().await {
            if let Err(err) = actor.handle(msg, &mut ctx).await {
                tracing::error!(actor = A::NAME, error = ?err, "actor.failed");
                return Err(err);
            }
            ctx.handled += 1;
            if ctx.stop {
                break;
            }
        }
        tracing::debug!(actor = A::NAME, handled = ctx.handled, "actor.stopped");
        Ok(())
    });

    ActorHandle {
        addr: Addr(tx),
        task,
    }
}
