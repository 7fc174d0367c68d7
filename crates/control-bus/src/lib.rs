//! Asynchronous publish/subscribe transport for control and status messages.
//!
//! Every controller instance subscribes to the shared broadcast channel and
//! filters on its own run id; only one controller owns a given run id, so
//! per-run ordering falls out of single ownership.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::mpsc;
use tracing::warn;

use webrunner_core_types::{ControlMessage, RunId, StatusMessage};

/// Trait implemented by payload types that can be carried on the bus.
pub trait BusMessage: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> BusMessage for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

/// Messages addressed to a single run. Subscriptions use this to discard
/// traffic for other run ids.
pub trait Addressed {
    fn run_id(&self) -> &RunId;
}

impl Addressed for ControlMessage {
    fn run_id(&self) -> &RunId {
        &self.run_id
    }
}

impl Addressed for StatusMessage {
    fn run_id(&self) -> &RunId {
        &self.run_id
    }
}

#[derive(Clone, Debug, Error)]
pub enum BusError {
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("bus channel closed")]
    Closed,
}

#[async_trait]
pub trait ControlBus<M>: Send + Sync
where
    M: BusMessage,
{
    async fn publish(&self, message: M) -> Result<(), BusError>;
    fn subscribe(&self) -> broadcast::Receiver<M>;
}

/// In-memory bus over a tokio broadcast channel. Suitable for single-process
/// deployments and tests; distributed deployments plug in their own
/// [`ControlBus`] implementation.
pub struct InMemoryBus<M>
where
    M: BusMessage,
{
    sender: broadcast::Sender<M>,
}

impl<M> InMemoryBus<M>
where
    M: BusMessage,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }
}

#[async_trait]
impl<M> ControlBus<M> for InMemoryBus<M>
where
    M: BusMessage,
{
    async fn publish(&self, message: M) -> Result<(), BusError> {
        self.sender
            .send(message)
            .map(|_| ())
            .map_err(|err| BusError::Publish(err.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<M> {
        self.sender.subscribe()
    }
}

/// Per-run filtered view over a broadcast subscription.
///
/// Dropping the subscription tears it down; controllers drop theirs on every
/// terminal transition.
pub struct RunSubscription<M>
where
    M: BusMessage + Addressed,
{
    run_id: RunId,
    receiver: broadcast::Receiver<M>,
}

impl<M> RunSubscription<M>
where
    M: BusMessage + Addressed,
{
    pub fn new(run_id: RunId, receiver: broadcast::Receiver<M>) -> Self {
        Self { run_id, receiver }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Await the next message addressed to this run. Returns `None` once the
    /// bus is closed. Lagged windows are logged and skipped; control
    /// delivery is at-least-once, not gap-free.
    pub async fn recv(&mut self) -> Option<M> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if message.run_id() == &self.run_id => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(run_id = %self.run_id, skipped, "run subscription lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drain the next pending message for this run without waiting.
    pub fn try_recv(&mut self) -> Option<M> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) if message.run_id() == &self.run_id => return Some(message),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(run_id = %self.run_id, skipped, "run subscription lagged");
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

/// Subscribe to the bus filtered on one run id.
pub fn subscribe_run<M>(bus: &dyn ControlBus<M>, run_id: RunId) -> RunSubscription<M>
where
    M: BusMessage + Addressed,
{
    RunSubscription::new(run_id, bus.subscribe())
}

/// Materialise an mpsc receiver from a bus subscription so callers can await
/// messages without handling broadcast semantics directly.
pub fn to_mpsc<M>(bus: Arc<InMemoryBus<M>>, capacity: usize) -> mpsc::Receiver<M>
where
    M: BusMessage,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    if tx.send(message).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    out_rx
}
