// src/swarm/worker.rs
// =============================================================================
// A Worker keeps one Crawler busy for as long as there is work.
//
// The loop is a small state machine:
//
//   Running       try to take a job without waiting
//                 - got one     -> crawl it, stay Running
//                 - queue closed -> Done
//                 - nothing yet  -> IdleChecking
//   IdleChecking  look at the queue depth a few times, sleeping between looks
//                 - every look says 0 -> Done
//                 - any look says >0  -> Running
//   Done          signal completion and stop
//
// Caveat:
// - Each worker decides it's finished on its own, from a few empty looks at a
//   shared counter. A sibling that's halfway through a page may be about to
//   queue more work when this worker gives up. In practice the sleeps make
//   that unlikely, but it is a heuristic, not a guarantee.
//
// Rust concepts:
// - enum as a state machine: the compiler makes sure every state is handled
// - CancellationToken: a signal that fires once and can be awaited
// - drop guards: code that runs when a value goes out of scope, even on panic
// =============================================================================

use crate::crawl::Crawler;
use crate::messaging::Backlog;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

// How long a worker waits on an empty queue before deciding it's done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    // How many times to look at the queue depth
    pub rounds: usize,
    // How long to sleep after a look that found nothing
    pub grace: Duration,
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            rounds: 4,
            grace: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    IdleChecking,
    Done,
}

pub struct Worker {
    id: usize,
    crawler: Crawler,
    incoming: Backlog<String>,
    idle: IdlePolicy,
    done: CancellationToken,
}

impl Worker {
    pub fn new(id: usize, crawler: Crawler, incoming: Backlog<String>, idle: IdlePolicy) -> Self {
        Self {
            id,
            crawler,
            incoming,
            idle,
            done: CancellationToken::new(),
        }
    }

    // Spawns run() as a task and hands back a handle to wait on it
    pub fn start(self) -> WorkerHandle {
        let id = self.id;
        let done = self.done.clone();
        let join = tokio::spawn(self.run());
        info!(worker = id, "worker started");
        WorkerHandle { id, done, join }
    }

    // Works until the queue looks finished. Returns how many jobs it crawled.
    pub async fn run(self) -> usize {
        // Cancelled when this function returns or unwinds, exactly once
        let _done = self.done.clone().drop_guard();

        let mut processed = 0;
        let mut state = State::Running;
        loop {
            state = match state {
                State::Running => match self.incoming.try_recv() {
                    Ok(job) => {
                        debug!(worker = self.id, %job, "picked up job");
                        self.crawler.crawl(&job).await;
                        processed += 1;
                        State::Running
                    }
                    Err(TryRecvError::Disconnected) => {
                        debug!(worker = self.id, "backlog closed");
                        State::Done
                    }
                    Err(TryRecvError::Empty) => State::IdleChecking,
                },
                State::IdleChecking => {
                    if self.has_no_work().await {
                        State::Done
                    } else {
                        // Give the forwarding tasks a chance to hand us the job
                        tokio::task::yield_now().await;
                        State::Running
                    }
                }
                State::Done => break,
            };
        }

        info!(worker = self.id, processed, "worker done");
        processed
    }

    // True if the queue depth read zero on every look
    async fn has_no_work(&self) -> bool {
        for round in 0..self.idle.rounds {
            if !self.incoming.is_empty() {
                return false;
            }
            debug!(worker = self.id, round, "no jobs, waiting");
            tokio::time::sleep(self.idle.grace).await;
        }
        let finished = self.incoming.is_empty();
        if finished {
            debug!(worker = self.id, "still no jobs");
        }
        finished
    }
}

// The swarm's view of a running worker
pub struct WorkerHandle {
    id: usize,
    done: CancellationToken,
    join: JoinHandle<usize>,
}

impl WorkerHandle {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    // Waits until the worker has signalled completion
    pub async fn await_completion(&self) {
        self.done.cancelled().await
    }

    // Waits for the task and returns its job count. A panicked worker is
    // logged and counts as zero.
    pub async fn join(self) -> usize {
        match self.join.await {
            Ok(processed) => processed,
            Err(e) => {
                error!(worker = self.id, "worker task failed: {e}");
                0
            }
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why try_recv() instead of recv().await?
//    - recv().await would wait forever on a queue that never closes
//    - The queue only closes after every worker has finished, so a worker
//      that waited for it would never finish. try_recv() lets the worker
//      notice that things have gone quiet.
//
// 2. Why yield_now()?
//    - When the depth says "there's work" but try_recv() found nothing, the
//      job is still moving between channels. yield_now() lets those tasks run
//      instead of spinning.
//
// 3. What does drop_guard() do?
//    - It returns a value that cancels the token when dropped
//    - Dropping happens on normal return AND on panic, so the swarm is never
//      left waiting for a worker that died
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::fetch::StaticFetcher;
    use crate::crawl::filters::has_attrs;
    use crate::crawl::{Fetch, FetchError, Node, RecoverUrls, URL_ATTRS};
    use crate::messaging::{queue, Dispatcher};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::time::{timeout, Instant};

    fn quick() -> IdlePolicy {
        IdlePolicy {
            rounds: 4,
            grace: Duration::from_millis(20),
        }
    }

    fn crawler() -> Crawler {
        Crawler::new(Arc::new(
            StaticFetcher::default().page("http://a.test/", Node::document()),
        ))
    }

    #[tokio::test]
    async fn test_processes_jobs_then_stops_on_close() {
        let (dispatcher, backlog) = queue::new::<String>(8);
        for job in ["http://a.test/", "http://b.test/"] {
            dispatcher.dispatch(job.to_string()).await;
        }
        dispatcher.close();

        let worker = Worker::new(0, crawler(), backlog, quick());
        let processed = timeout(Duration::from_secs(5), worker.run()).await.unwrap();
        assert_eq!(processed, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_idle_window() {
        let (_dispatcher, backlog) = queue::new::<String>(8);
        let worker = Worker::new(0, crawler(), backlog, quick());

        let started = Instant::now();
        let processed = timeout(Duration::from_secs(5), worker.run()).await.unwrap();

        assert_eq!(processed, 0);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_completion_signal_fires_once_done() {
        let (dispatcher, backlog) = queue::new::<String>(8);
        dispatcher.close();

        let handle = Worker::new(3, crawler(), backlog, quick()).start();
        assert_eq!(handle.id(), 3);
        timeout(Duration::from_secs(5), handle.await_completion()).await.unwrap();
        assert!(handle.is_done());
        assert_eq!(handle.join().await, 0);
    }

    #[tokio::test]
    async fn test_job_arriving_during_idle_check_is_picked_up() {
        let (dispatcher, backlog) = queue::new::<String>(8);
        let handle = Worker::new(0, crawler(), backlog, quick()).start();

        tokio::time::sleep(Duration::from_millis(30)).await;
        dispatcher.dispatch("http://a.test/".to_string()).await;

        let processed = timeout(Duration::from_secs(5), handle.join()).await.unwrap();
        assert_eq!(processed, 1);
    }

    // The seed page takes longer to fetch than a whole idle window and links
    // to two pages that load instantly
    struct SlowSeed;

    const SLOW_SEED: &str = "http://slow.test/";

    #[async_trait]
    impl Fetch for SlowSeed {
        async fn fetch(&self, address: &str) -> Result<Node, FetchError> {
            if address != SLOW_SEED {
                return Ok(Node::document());
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(Node::document()
                .with_child(Node::element("a").with_attr("href", "http://slow.test/a"))
                .with_child(Node::element("a").with_attr("href", "http://slow.test/b")))
        }
    }

    // Idle detection is local to each worker: the one that didn't get the
    // seed gives up while its sibling is still fetching, and the sibling is
    // left to crawl everything the seed turns up on its own
    #[tokio::test]
    async fn test_idle_sibling_gives_up_while_another_is_mid_crawl() {
        let (queue, backlog) = queue::new::<String>(8);
        let dispatcher: Arc<dyn Dispatcher<String>> = Arc::new(queue);
        dispatcher.dispatch(SLOW_SEED.to_string()).await;

        let handles: Vec<WorkerHandle> = (0..2)
            .map(|id| {
                let recover = RecoverUrls::new(Arc::clone(&dispatcher));
                let crawler =
                    Crawler::new(Arc::new(SlowSeed)).add_scraper(recover, has_attrs(&URL_ATTRS));
                Worker::new(id, crawler, backlog.clone(), quick()).start()
            })
            .collect();

        // The idle window (4 x 20ms) is over long before the seed arrives
        tokio::time::sleep(Duration::from_millis(200)).await;
        let finished: Vec<bool> = handles.iter().map(WorkerHandle::is_done).collect();
        assert_eq!(finished.iter().filter(|done| **done).count(), 1);

        let mut processed = Vec::new();
        for handle in handles {
            processed.push(timeout(Duration::from_secs(5), handle.join()).await.unwrap());
        }
        processed.sort_unstable();
        assert_eq!(processed, vec![0, 3]);
    }
}
