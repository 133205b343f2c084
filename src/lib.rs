// src/lib.rs
// =============================================================================
// spider: a crawler whose workers feed their own job queue.
//
// Modules:
// - messaging: bounded queue, dispatcher decorators, fork
// - crawl: page tree, fetching, filters, scrapers, the per-job Crawler
// - swarm: the worker pool and its idle-detection loop
// - report: the per-host summary built from a fork of the job stream
//
// The binary in main.rs wires these together; everything here can also be
// driven directly (the tests do exactly that, without touching the network).
// =============================================================================

pub mod crawl;
pub mod messaging;
pub mod report;
pub mod swarm;
