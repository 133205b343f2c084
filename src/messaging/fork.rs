// src/messaging/fork.rs
// =============================================================================
// This module splits one Backlog into two that both see every job.
//
// A normal channel hands each message to exactly one receiver. The crawler
// wants the worker swarm to consume jobs AND a reporter to watch the same
// jobs go by, so a relay task copies every message to two new channels.
//
// Lock-step:
// - The relay finishes both sends before it reads the next message
// - The branch channels have a single slot, so if one branch stops reading
//   the other one stalls too. That's what keeps a slow observer from missing
//   jobs.
// - A branch whose receiver has been dropped is skipped from then on
//
// Depth:
// - Both branches report the upstream len(). The relay doesn't count a job
//   down when it reads it; the first (left) branch does when it receives it.
//   A job the relay is holding, or one waiting in a branch slot, still counts
//   as queued work for whoever consumes the left branch.
// =============================================================================

use super::queue::Backlog;
use tokio::sync::mpsc;
use tracing::debug;

const BRANCH_SLOTS: usize = 1;

// Forks a Backlog into two Backlogs that yield the same jobs in the same order
//
// Both returned Backlogs report the source's len(), i.e. the depth of the
// queue upstream, not how far behind each branch is. Give the first one to
// the consumer that decides when the work is finished.
pub fn fork<T>(source: Backlog<T>) -> (Backlog<T>, Backlog<T>)
where
    T: Clone + Send + 'static,
{
    let (left_tx, left_rx) = mpsc::channel(BRANCH_SLOTS);
    let (right_tx, right_rx) = mpsc::channel(BRANCH_SLOTS);
    let depth = source.depth();

    tokio::spawn(relay(source.detached(), left_tx, right_tx));

    (
        Backlog::branch(left_rx, depth.clone(), true),
        Backlog::branch(right_rx, depth, false),
    )
}

// Copies every job from the source to both branches.
// When the source closes, returning drops both senders and closes the branches.
async fn relay<T: Clone>(source: Backlog<T>, left: mpsc::Sender<T>, right: mpsc::Sender<T>) {
    let mut left = Some(left);
    let mut right = Some(right);

    while let Some(job) = source.recv().await {
        let (left_ok, right_ok) = tokio::join!(send(&left, job.clone()), send(&right, job));
        if !left_ok && left.take().is_some() {
            debug!("fork: left branch dropped");
        }
        if !right_ok && right.take().is_some() {
            debug!("fork: right branch dropped");
        }
        if left.is_none() && right.is_none() {
            debug!("fork: both branches dropped, relay stopping");
            return;
        }
    }
}

async fn send<T>(branch: &Option<mpsc::Sender<T>>, job: T) -> bool {
    match branch {
        Some(tx) => tx.send(job).await.is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::queue;
    use crate::messaging::Dispatcher;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn drain<T>(backlog: Backlog<T>) -> Vec<T> {
        let mut jobs = Vec::new();
        while let Some(job) = backlog.recv().await {
            jobs.push(job);
        }
        jobs
    }

    #[tokio::test]
    async fn test_both_branches_see_everything_in_order() {
        let (dispatcher, backlog) = queue::new::<String>(8);
        let (left, right) = fork(backlog);

        for job in ["a", "b", "c"] {
            dispatcher.dispatch(job.to_string()).await;
        }
        dispatcher.close();

        let (left, right) = timeout(Duration::from_secs(5), async {
            tokio::join!(drain(left), drain(right))
        })
        .await
        .unwrap();
        assert_eq!(left, vec!["a", "b", "c"]);
        assert_eq!(right, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_undrained_branch_stalls_the_other() {
        let (dispatcher, backlog) = queue::new::<u32>(16);
        let (left, right) = fork(backlog);
        for job in 0..6 {
            dispatcher.dispatch(job).await;
        }
        dispatcher.close();

        // Only the right branch is read, so it can't get far ahead of the left
        let mut seen = Vec::new();
        let _ = timeout(Duration::from_millis(200), async {
            while let Some(job) = right.recv().await {
                seen.push(job);
            }
        })
        .await;
        assert!(seen.len() < 6, "right branch ran ahead: {seen:?}");

        // Once the left branch is drained, everything flows
        let (left_jobs, right_jobs) = timeout(Duration::from_secs(5), async {
            tokio::join!(drain(left), drain(right))
        })
        .await
        .unwrap();
        assert_eq!(left_jobs, (0..6).collect::<Vec<_>>());
        seen.extend(right_jobs);
        assert_eq!(seen, (0..6).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_dropped_branch_does_not_block_the_other() {
        let (dispatcher, backlog) = queue::new::<u32>(4);
        let (left, right) = fork(backlog);
        drop(left);

        let producer = tokio::spawn(async move {
            for job in 0..10 {
                dispatcher.dispatch(job).await;
            }
            dispatcher.close();
        });

        let jobs = timeout(Duration::from_secs(5), drain(right)).await.unwrap();
        producer.await.unwrap();
        assert_eq!(jobs, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_branches_report_upstream_depth() {
        let (_dispatcher, backlog) = queue::new::<u32>(16);
        let source_depth = backlog.depth();
        let (left, right) = fork(backlog);

        assert!(std::sync::Arc::ptr_eq(&left.depth(), &source_depth));
        assert!(std::sync::Arc::ptr_eq(&right.depth(), &source_depth));
    }

    #[tokio::test]
    async fn test_job_in_flight_through_fork_stays_counted() {
        let (dispatcher, backlog) = queue::new::<u32>(16);
        let (left, right) = fork(backlog);
        dispatcher.dispatch(7).await;

        // Let the relay pull the job off the queue and park it in both slots
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(left.len(), 1);

        // The observing branch doesn't count it down
        assert_eq!(right.recv().await, Some(7));
        assert_eq!(left.len(), 1);

        // The first branch does
        assert_eq!(left.try_recv(), Ok(7));
        assert_eq!(left.len(), 0);
        assert!(right.is_empty());
    }
}
