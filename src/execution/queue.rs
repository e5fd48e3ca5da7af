//! Bounded inter-operator queues (spec.md §4.5 "Queues", §9 "Queues with
//! EOF sentinel").
//!
//! The original engine pushes a literal `"EOF"` string value down a
//! process-level queue. Here each queue is a bounded `tokio::mpsc` channel
//! whose element type is a plain [`Binding`] — closing the sender (dropping
//! every clone) is itself the end-of-stream signal, surfaced to the reader
//! as `recv() -> None`. This is the channel-closure design spec.md §9
//! recommends over `Option<Binding>`: a closed channel already carries
//! "no more values, ever" without an extra wrapper layer — see
//! DESIGN.md "EOF as channel closure".

use crate::term::BoundValue;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// One result row: variable name (without the leading `?`) to bound value.
pub type Binding = HashMap<String, BoundValue>;

/// The producing half of an operator's output queue. Cloneable so a
/// `Union` or fan-out stage can hand multiple producers the same sender
/// without an extra broadcast layer.
#[derive(Clone)]
pub struct BindingSender(mpsc::Sender<Binding>);

pub struct BindingReceiver(mpsc::Receiver<Binding>);

/// Bounded channel sized by `ExecutionConfig::max_queue_depth`
/// (spec.md §5 "A bounded queue exerts backpressure").
pub fn bounded(capacity: usize) -> (BindingSender, BindingReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BindingSender(tx), BindingReceiver(rx))
}

impl BindingSender {
    /// Suspends the caller when the queue is full; returns `Err` once every
    /// receiver has been dropped (the consumer side already stopped, e.g.
    /// after `Limit` was satisfied — spec.md §4.5 "Cancellation").
    pub async fn send(&self, binding: Binding) -> Result<(), SendError> {
        self.0.send(binding).await.map_err(|_| SendError)
    }
}

impl BindingReceiver {
    /// `None` is end-of-stream: every sender clone has been dropped.
    pub async fn recv(&mut self) -> Option<Binding> {
        self.0.recv().await
    }
}

/// The send side observed the consumer disappear; the producing task should
/// stop without treating this as a query error (spec.md "CancellationError
/// — cooperative abort; no downstream error, just early termination").
#[derive(Debug, Clone, Copy)]
pub struct SendError;
