// src/crawl/mod.rs
// =============================================================================
// This module is everything a worker does with a single job.
//
// Submodules:
// - node: the owned page tree (built from HTML with the `scraper` crate)
// - fetch: turns an address into a page tree (reqwest over HTTP)
// - filters: predicates that pick which nodes a scraper sees
// - scrapers: what to do with a node (queue its links, collect, dump)
// - crawler: fetch + walk + scrape for one job
// - rules: address rewrites and checks used by the dispatcher chain
// =============================================================================

pub mod crawler;
pub mod fetch;
pub mod filters;
pub mod node;
pub mod rules;
pub mod scrapers;

pub use crawler::{CrawlOutcome, Crawler};
pub use fetch::{Fetch, FetchError, HttpFetcher};
pub use filters::NodeFilter;
pub use node::Node;
pub use scrapers::{CollectUrls, DumpHtml, RecoverUrls, Scraper, URL_ATTRS};
