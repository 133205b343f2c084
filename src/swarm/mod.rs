// src/swarm/mod.rs
// =============================================================================
// This module runs a fixed-size pool of workers over one shared queue.
//
// How it works:
// 1. seed_jobs() puts the starting address(es) through the dispatcher chain
// 2. spawn() starts one Worker per slot, each with a fresh Crawler
// 3. Workers crawl jobs, and their scrapers dispatch the links they find back
//    into the same queue
// 4. Each worker stops on its own once the queue has looked empty for a while
// 5. When every worker has stopped, the dispatcher is closed (once), which
//    closes the queue and anything reading from it, like the domains report
//
// The swarm holds no jobs itself. All of that lives in the queue.
// =============================================================================

mod worker;

pub use worker::{IdlePolicy, Worker, WorkerHandle};

use crate::crawl::Crawler;
use crate::messaging::{Backlog, Dispatcher};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

pub const DEFAULT_SWARM_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwarmConfig {
    // Number of workers (at least one is always started)
    pub size: usize,
    pub idle: IdlePolicy,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SWARM_SIZE,
            idle: IdlePolicy::default(),
        }
    }
}

// What a finished swarm did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwarmReport {
    pub duration: Duration,
    // Jobs crawled by each worker, indexed by worker id
    pub processed: Vec<usize>,
}

impl SwarmReport {
    pub fn total(&self) -> usize {
        self.processed.iter().sum()
    }
}

// Makes a fresh Crawler for each worker
pub type Spawner = Box<dyn Fn() -> Crawler + Send + Sync>;

pub struct Swarm {
    config: SwarmConfig,
    spawner: Spawner,
    incoming: Backlog<String>,
    dispatcher: Arc<dyn Dispatcher<String>>,
}

impl Swarm {
    // Parameters:
    //   config: pool size and idle policy
    //   incoming: where workers take jobs from
    //   dispatcher: the chain that feeds `incoming`; closed when the swarm ends
    //   spawner: called once per worker to build its crawler
    pub fn new(
        config: SwarmConfig,
        incoming: Backlog<String>,
        dispatcher: Arc<dyn Dispatcher<String>>,
        spawner: impl Fn() -> Crawler + Send + Sync + 'static,
    ) -> Self {
        info!(size = config.size, "initialising swarm");
        Self {
            config,
            spawner: Box::new(spawner),
            incoming,
            dispatcher,
        }
    }

    // Feeds the swarm its first jobs. Make sure there's at least one, or the
    // workers will go idle straight away.
    //
    // Returns: how many the dispatcher chain didn't refuse
    pub async fn seed_jobs<I, S>(&self, jobs: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut accepted = 0;
        for job in jobs {
            if self.dispatcher.dispatch(job.into()).await {
                accepted += 1;
            }
        }
        accepted
    }

    // Runs every worker to completion, then closes the dispatcher
    pub async fn spawn(self) -> SwarmReport {
        let started = Instant::now();
        let size = self.config.size.max(1);
        info!(size, "spawning and consuming");

        let workers: Vec<WorkerHandle> = (0..size)
            .map(|id| {
                let crawler = (self.spawner)();
                Worker::new(id, crawler, self.incoming.clone(), self.config.idle).start()
            })
            .collect();

        for worker in &workers {
            worker.await_completion().await;
        }
        let processed = join_all(workers.into_iter().map(WorkerHandle::join)).await;

        self.dispatcher.close();

        let report = SwarmReport {
            duration: started.elapsed(),
            processed,
        };
        info!(
            jobs = report.total(),
            elapsed_ms = report.duration.as_millis() as u64,
            "swarm finished"
        );
        report
    }
}
