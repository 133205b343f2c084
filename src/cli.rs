// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Usage:
//   spider <TARGET> [--workers N] [--capacity N] [--max-jobs N] [--dump]
//                   [--report] [--json] [-v]
//
// The parsed arguments are turned into plain config structs (SwarmConfig,
// IdlePolicy) so nothing outside this file and main.rs depends on clap.
// =============================================================================

use clap::Parser;
use spider::swarm::{IdlePolicy, SwarmConfig, DEFAULT_SWARM_SIZE};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "spider",
    version,
    about = "Crawl a site with a swarm of workers that feed each other new links",
    long_about = "spider starts at TARGET, follows every src/href it finds, and prints every \
                  address it queued. Workers stop once the queue has been empty for a while."
)]
pub struct Cli {
    /// Address to start crawling from (e.g. http://127.0.0.1:8000/)
    ///
    /// Relative links found while crawling are resolved against this address.
    pub target: String,

    /// Number of workers in the swarm
    #[arg(long, default_value_t = DEFAULT_SWARM_SIZE)]
    pub workers: usize,

    /// How many jobs the queue buffers before dispatching waits
    #[arg(long, default_value_t = 1024)]
    pub capacity: usize,

    /// Stop queueing new addresses after this many (0 = no limit)
    #[arg(long, default_value_t = 50)]
    pub max_jobs: usize,

    /// How many times an idle worker checks the queue before giving up
    #[arg(long, default_value_t = 4)]
    pub idle_rounds: usize,

    /// Milliseconds an idle worker waits between checks
    #[arg(long, default_value_t = 1000)]
    pub idle_grace_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Print every link-bearing leaf node as HTML while crawling
    #[arg(long)]
    pub dump: bool,

    /// Print a per-host JSON report of the queued addresses at the end
    #[arg(long)]
    pub report: bool,

    /// Print the queued addresses as a JSON array instead of one per line
    #[arg(long)]
    pub json: bool,

    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn swarm_config(&self) -> SwarmConfig {
        SwarmConfig {
            size: self.workers,
            idle: IdlePolicy {
                rounds: self.idle_rounds,
                grace: Duration::from_millis(self.idle_grace_ms),
            },
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
