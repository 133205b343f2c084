// src/main.rs
// =============================================================================
// This is the entry point of the crawler.
//
// What happens here:
// 1. Parse command-line arguments using clap and set up logging
// 2. Build the pipeline:
//      dispatch -> preprocess -> validate -> dedup -> queue -> fork
//                                                            |-> swarm
//                                                            |-> domains report
// 3. Seed the target, let the swarm run until it goes quiet
// 4. Print every address that was queued (and the report, if asked)
// 5. Exit with 0 on success, 2 if setup failed
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use spider::crawl::filters::{has_attrs, is_leaf};
use spider::crawl::{
    rules, CollectUrls, Crawler, DumpHtml, Fetch, HttpFetcher, RecoverUrls, Scraper, URL_ATTRS,
};
use spider::messaging::{fork, queue, DeDuplicator, Dispatcher, PreProcessor, Validator};
use spider::report::domains_report;
use spider::swarm::Swarm;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            2
        }
    };

    std::process::exit(exit_code);
}

// Logs go to stderr so stdout only carries results.
// RUST_LOG wins over --verbose when it is set.
fn init_tracing(verbose: bool) {
    let default = if verbose { "spider=debug" } else { "spider=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let target = cli.target.clone();
    Url::parse(&target).with_context(|| format!("invalid target address '{target}'"))?;
    if !rules::crawlable(&target) {
        warn!(%target, "target doesn't look crawlable and will be dropped by validation");
    }

    // The dedup layer is kept by name so we can read its history at the end
    let (queue, backlog) = queue::new::<String>(cli.capacity);
    let dedup = Arc::new(DeDuplicator::<String, _>::new(queue).with_max_jobs(cli.max_jobs));
    let validated = Validator::new(Arc::clone(&dedup))
        .rule(|job: &String| rules::no_fragment(job))
        .rule(|job: &String| rules::crawlable(job));
    let dispatcher: Arc<dyn Dispatcher<String>> = Arc::new(
        PreProcessor::new(validated)
            .step(rules::trim_relative_prefix)
            .step(rules::relativize(&target)),
    );

    let (incoming, observed) = fork(backlog);
    let report = domains_report(observed);

    let fetcher: Arc<dyn Fetch> =
        Arc::new(HttpFetcher::new(cli.request_timeout()).context("failed to build HTTP client")?);
    let discovered = CollectUrls::new();
    let spawner = {
        let dispatcher = Arc::clone(&dispatcher);
        let discovered = discovered.clone();
        let dump = cli.dump;
        move || {
            build_crawler(
                Arc::clone(&fetcher),
                Arc::clone(&dispatcher),
                discovered.clone(),
                dump,
            )
        }
    };

    let swarm = Swarm::new(cli.swarm_config(), incoming, dispatcher, spawner);
    swarm.seed_jobs([target]).await;
    let summary = swarm.spawn().await;

    let report = report.await.context("domains report task failed")?;
    let dispatched = dedup.report_dispatched();
    info!(
        queued = dispatched.len(),
        crawled = summary.total(),
        discovered = discovered.len(),
        hosts = report.hosts().count(),
        "crawl complete"
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&dispatched)?);
    } else {
        for job in &dispatched {
            println!("{job}");
        }
    }
    if cli.report {
        println!("{}", report.to_json()?);
    }

    Ok(())
}

// Every crawler queues the links it finds and records them in the shared
// `discovered` list; with --dump it also prints link-bearing leaf nodes
fn build_crawler(
    fetcher: Arc<dyn Fetch>,
    dispatcher: Arc<dyn Dispatcher<String>>,
    discovered: CollectUrls,
    dump: bool,
) -> Crawler {
    let has_links = has_attrs(&URL_ATTRS);
    let crawler = Crawler::new(fetcher)
        .add_scraper(RecoverUrls::new(dispatcher).then(discovered), has_links.clone());

    if dump {
        crawler.add_scraper(DumpHtml::stdout(), has_links.and(is_leaf()))
    } else {
        crawler
    }
}

