// src/messaging/dispatcher.rs
// =============================================================================
// This module defines the Dispatcher trait and the decorators that wrap it.
//
// A Dispatcher is the "send" side of the job queue. The decorators each add
// one rule in front of another Dispatcher:
// - DeDuplicator: forwards each job once, and stops accepting after max_jobs
// - Validator: drops jobs that fail any of its rules
// - PreProcessor: rewrites jobs before forwarding them
//
// They nest, innermost first:
//   PreProcessor(Validator(DeDuplicator(queue)))
//
// What dispatch() returns:
// - true: carry on (the job was queued, or quietly dropped as invalid/seen)
// - false: stop sending jobs from here, no more will be accepted
//   (only the DeDuplicator's job cap, or a closed queue, says this)
// =============================================================================

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, info};

// The producer side of a job queue
#[async_trait]
pub trait Dispatcher<T: Send + 'static>: Send + Sync {
    // Offers a job to the queue. A false return is permanent: the caller
    // should stop offering jobs from the current batch.
    async fn dispatch(&self, job: T) -> bool;

    // Signals that no more jobs are coming. Decorators pass this inward.
    fn close(&self);
}

// Lets a chain be shared (Arc<DeDuplicator<..>>) and still be wrapped
#[async_trait]
impl<T, D> Dispatcher<T> for Arc<D>
where
    T: Send + 'static,
    D: Dispatcher<T> + ?Sized,
{
    async fn dispatch(&self, job: T) -> bool {
        (**self).dispatch(job).await
    }

    fn close(&self) {
        (**self).close()
    }
}

// -----------------------------------------------------------------------------
// DeDuplicator
// -----------------------------------------------------------------------------

// Every job this dispatcher has forwarded, in the order it forwarded them
struct History<T> {
    seen: HashSet<T>,
    order: Vec<T>,
    capped: bool,
}

// Forwards each distinct job once and stops accepting new ones after
// `max_jobs` (0 means no limit). The cap never resets.
pub struct DeDuplicator<T, D> {
    inner: D,
    history: Mutex<History<T>>,
    max_jobs: usize,
}

impl<T, D> DeDuplicator<T, D>
where
    T: Eq + Hash + Clone,
{
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            history: Mutex::new(History {
                seen: HashSet::new(),
                order: Vec::new(),
                capped: false,
            }),
            max_jobs: 0,
        }
    }

    // Sets the maximum number of distinct jobs to forward (0 = unlimited)
    pub fn with_max_jobs(mut self, max_jobs: usize) -> Self {
        self.max_jobs = max_jobs;
        self
    }

    // Every job forwarded so far, oldest first
    pub fn report_dispatched(&self) -> Vec<T> {
        self.history.lock().order.clone()
    }

    // Records the job if it's new and the cap allows it.
    // The check and the insert happen under one lock so two workers can't
    // both forward the same job.
    fn admit(&self, job: &T) -> Admission {
        let mut history = self.history.lock();
        if history.seen.contains(job) {
            return Admission::Seen;
        }
        if self.max_jobs > 0 && history.order.len() >= self.max_jobs {
            if !history.capped {
                history.capped = true;
                info!(max_jobs = self.max_jobs, "job limit reached, refusing new jobs");
            }
            return Admission::Refused;
        }
        history.seen.insert(job.clone());
        history.order.push(job.clone());
        Admission::New
    }
}

enum Admission {
    New,
    Seen,
    Refused,
}

#[async_trait]
impl<T, D> Dispatcher<T> for DeDuplicator<T, D>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
    D: Dispatcher<T>,
{
    async fn dispatch(&self, job: T) -> bool {
        match self.admit(&job) {
            Admission::New => self.inner.dispatch(job).await,
            Admission::Seen => true,
            Admission::Refused => false,
        }
    }

    fn close(&self) {
        self.inner.close()
    }
}

// -----------------------------------------------------------------------------
// Validator
// -----------------------------------------------------------------------------

// A rule a job has to pass to be forwarded
pub type Rule<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

// Drops jobs that fail any rule. Dropping is silent: dispatch() still
// returns true, so callers can't tell a dropped job from a queued one.
pub struct Validator<T, D> {
    inner: D,
    rules: Vec<Rule<T>>,
}

impl<T, D> Validator<T, D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            rules: Vec::new(),
        }
    }

    // Adds a rule. Rules run in the order they were added.
    pub fn rule(mut self, rule: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }
}

#[async_trait]
impl<T, D> Dispatcher<T> for Validator<T, D>
where
    T: Send + Sync + std::fmt::Debug + 'static,
    D: Dispatcher<T>,
{
    async fn dispatch(&self, job: T) -> bool {
        if let Some(index) = self.rules.iter().position(|rule| !rule(&job)) {
            debug!(?job, rule = index, "job failed validation");
            return true;
        }
        self.inner.dispatch(job).await
    }

    fn close(&self) {
        self.inner.close()
    }
}

// -----------------------------------------------------------------------------
// PreProcessor
// -----------------------------------------------------------------------------

// A rewrite applied to a job before it is forwarded
pub type Step<T> = Box<dyn Fn(T) -> T + Send + Sync>;

// Applies its steps in order, then forwards the result
// (e.g. turning a relative path into a full address)
pub struct PreProcessor<T, D> {
    inner: D,
    steps: Vec<Step<T>>,
}

impl<T, D> PreProcessor<T, D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }
}

#[async_trait]
impl<T, D> Dispatcher<T> for PreProcessor<T, D>
where
    T: Send + 'static,
    D: Dispatcher<T>,
{
    async fn dispatch(&self, job: T) -> bool {
        let job = self.steps.iter().fold(job, |job, step| step(job));
        self.inner.dispatch(job).await
    }

    fn close(&self) {
        self.inner.close()
    }
}
