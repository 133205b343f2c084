// src/messaging/queue.rs
// =============================================================================
// This module implements the bounded job queue that the whole crawler runs on.
//
// How it works:
// 1. A producer calls dispatch(), which sends the job into an "intake" channel
// 2. A receive loop moves jobs from intake into a bounded "buffer" channel
// 3. A deliver loop moves jobs from the buffer into a "delivery" channel
// 4. Consumers pull jobs off the delivery channel through a Backlog
//
// Closing:
// - close() drops the intake sender. The receive loop forwards whatever is
//   left and then drops the buffer sender, and the deliver loop does the same
//   for delivery. Nothing buffered is lost on close.
//
// Backpressure:
// - When the buffer is full, dispatch() waits until a consumer makes room
//
// Rust concepts:
// - tokio::sync::mpsc: multi-producer, single-consumer async channels
// - Arc<AtomicUsize>: a counter shared between tasks without a lock
// - Option::take(): moves a value out and leaves None behind
// =============================================================================

use super::Dispatcher;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, trace};

// Slots on the two hand-off channels around the buffer. tokio channels need
// at least one slot, so this is as close to a rendezvous as we can get.
const INTAKE_SLOTS: usize = 1;
const DELIVERY_SLOTS: usize = 1;

// Creates a queue with a buffer of `capacity` jobs and returns its two halves
//
// Must be called from inside a tokio runtime: the forwarding loops are
// spawned as tasks.
//
// Parameters:
//   capacity: how many jobs the buffer holds before dispatch() waits
//             (values below 1 are treated as 1)
//
// Returns: (producer half, consumer half)
pub fn new<T: Send + 'static>(capacity: usize) -> (QueueDispatcher<T>, Backlog<T>) {
    let capacity = capacity.max(1);

    let (intake_tx, intake_rx) = mpsc::channel(INTAKE_SLOTS);
    let (buffer_tx, buffer_rx) = mpsc::channel(capacity);
    let (delivery_tx, delivery_rx) = mpsc::channel(DELIVERY_SLOTS);
    let depth = Arc::new(AtomicUsize::new(0));

    tokio::spawn(receive(intake_rx, buffer_tx));
    tokio::spawn(deliver(buffer_rx, delivery_tx));

    let dispatcher = QueueDispatcher {
        intake: Mutex::new(Some(intake_tx)),
        depth: Arc::clone(&depth),
    };
    (dispatcher, Backlog::new(delivery_rx, depth))
}

// Moves jobs from intake into the buffer. Returning drops `buffer`, which is
// what closes it once intake has been closed and fully forwarded.
async fn receive<T>(mut intake: mpsc::Receiver<T>, buffer: mpsc::Sender<T>) {
    while let Some(job) = intake.recv().await {
        if buffer.send(job).await.is_err() {
            debug!("queue buffer dropped, receive loop stopping");
            return;
        }
    }
    trace!("queue intake closed");
}

// Moves jobs from the buffer to the consumer. mpsc keeps handing out buffered
// jobs after every sender is gone, so the buffer is drained before delivery
// is closed.
async fn deliver<T>(mut buffer: mpsc::Receiver<T>, delivery: mpsc::Sender<T>) {
    while let Some(job) = buffer.recv().await {
        if delivery.send(job).await.is_err() {
            debug!("queue consumer dropped, deliver loop stopping");
            return;
        }
    }
    trace!("queue buffer drained and closed");
}

// The producer half of a queue
//
// A plain queue never refuses work while it is open; refusing work is what
// the decorators in dispatcher.rs are for.
pub struct QueueDispatcher<T> {
    // None once close() has run
    intake: Mutex<Option<mpsc::Sender<T>>>,
    depth: Arc<AtomicUsize>,
}

#[async_trait]
impl<T: Send + Debug + 'static> Dispatcher<T> for QueueDispatcher<T> {
    // Sends the job into the queue, waiting while the buffer is full
    //
    // Returns: true once the queue owns the job, false if the queue has
    // already been closed (the job is dropped)
    async fn dispatch(&self, job: T) -> bool {
        // Clone the sender so the lock is released before we await
        let intake = self.intake.lock().clone();
        let Some(intake) = intake else {
            debug!(?job, "dispatch after close, dropping job");
            return false;
        };

        trace!(?job, "dispatching");
        self.depth.fetch_add(1, Ordering::AcqRel);
        if let Err(mpsc::error::SendError(job)) = intake.send(job).await {
            release(&self.depth);
            debug!(?job, "queue stopped consuming, dropping job");
            return false;
        }
        true
    }

    // Closes intake, which cascades through the buffer to the Backlog.
    // The sender can only be taken once, so calling this again is a no-op.
    fn close(&self) {
        if self.intake.lock().take().is_some() {
            debug!("queue closed");
        }
    }
}

// The consumer half of a queue
//
// Cloning a Backlog gives another handle on the same stream: each job is
// received by exactly one of the clones.
pub struct Backlog<T> {
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>,
    depth: Arc<AtomicUsize>,
    // Exactly one reader of a job stream counts jobs down: the queue's own
    // handle, or once it has been forked, the first branch. Every other
    // handle just reports the shared number.
    drains_depth: bool,
}

// Written by hand because #[derive(Clone)] would demand T: Clone
impl<T> Clone for Backlog<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
            depth: Arc::clone(&self.depth),
            drains_depth: self.drains_depth,
        }
    }
}

impl<T> Backlog<T> {
    fn new(rx: mpsc::Receiver<T>, depth: Arc<AtomicUsize>) -> Self {
        Self::branch(rx, depth, true)
    }

    // A Backlog over its own channel that shares someone else's depth.
    // Only a branch created with `drains_depth` counts jobs down.
    pub(crate) fn branch(
        rx: mpsc::Receiver<T>,
        depth: Arc<AtomicUsize>,
        drains_depth: bool,
    ) -> Self {
        Self {
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            depth,
            drains_depth,
        }
    }

    // Stops this handle from counting jobs down, so a job it hands on stays
    // counted until a branch downstream takes it
    pub(crate) fn detached(mut self) -> Self {
        self.drains_depth = false;
        self
    }

    pub(crate) fn depth(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.depth)
    }

    // Takes the next job if one is ready right now
    //
    // Returns:
    //   Ok(job)                   a job was waiting
    //   Err(Empty)                nothing ready, or another clone is mid-receive
    //   Err(Disconnected)         the queue is closed and fully drained
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let Ok(mut rx) = self.rx.try_lock() else {
            return Err(TryRecvError::Empty);
        };
        let job = rx.try_recv()?;
        self.taken();
        Ok(job)
    }

    // Waits for the next job. Returns None once the queue is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        let job = rx.recv().await?;
        self.taken();
        Some(job)
    }

    // Jobs accepted by the queue that no consumer has taken yet.
    // Advisory only: it can be stale by the time the caller looks at it.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn taken(&self) {
        if self.drains_depth {
            release(&self.depth);
        }
    }
}

fn release(depth: &AtomicUsize) {
    // Never wraps below zero
    let _ = depth.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why three channels instead of one?
//    - The buffer is what actually bounds memory use
//    - The loops on either side let close() cascade in order: intake closes,
//      then the buffer, then delivery, and each one drains before it closes
//
// 2. Why is close() safe to call twice?
//    - The intake sender lives in a Mutex<Option<...>>
//    - take() moves it out exactly once; the second call finds None
//    - A channel closes when its last sender is dropped, so there is no way
//      to "close it twice"
//
// 3. What is tokio::sync::Mutex vs parking_lot::Mutex?
//    - parking_lot::Mutex is a normal blocking lock; never hold it across .await
//    - tokio::sync::Mutex can be held across .await (recv() needs that)
//
// 4. Why is len() "advisory"?
//    - Other tasks change the counter all the time
//    - It's useful for heuristics ("does it look like there's work?"), not for
//      making promises
// -----------------------------------------------------------------------------
