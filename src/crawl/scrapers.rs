// src/crawl/scrapers.rs
// =============================================================================
// Scrapers are the side effects a crawler applies to the nodes it walks.
//
// Available scrapers:
// - RecoverUrls: sends every src/href value back into the job queue. This is
//   what makes the crawl feed itself.
// - CollectUrls: keeps every src/href value it sees in a shared list
// - DumpHtml: prints the node as HTML (for debugging, it's slow)
//
// Scrapers can be chained with then(): a.then(b) runs a, then b, on each node.
// =============================================================================

use super::node::Node;
use crate::messaging::Dispatcher;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, warn};

// The attributes that hold addresses
pub const URL_ATTRS: [&str; 2] = ["src", "href"];

#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, node: &Node);

    fn then<S: Scraper>(self, next: S) -> Then<Self, S>
    where
        Self: Sized,
    {
        Then(self, next)
    }
}

// Two scrapers run back to back
pub struct Then<A, B>(A, B);

#[async_trait]
impl<A: Scraper, B: Scraper> Scraper for Then<A, B> {
    async fn scrape(&self, node: &Node) {
        self.0.scrape(node).await;
        self.1.scrape(node).await;
    }
}

fn url_values(node: &Node) -> impl Iterator<Item = &str> {
    node.attrs()
        .filter(|(key, _)| URL_ATTRS.contains(key))
        .map(|(_, value)| value)
}

// Feeds every address on the node back into the queue
pub struct RecoverUrls {
    dispatcher: Arc<dyn Dispatcher<String>>,
}

impl RecoverUrls {
    pub fn new(dispatcher: Arc<dyn Dispatcher<String>>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Scraper for RecoverUrls {
    async fn scrape(&self, node: &Node) {
        for address in url_values(node) {
            // false means the queue won't take any more work: stop here
            if !self.dispatcher.dispatch(address.to_string()).await {
                debug!(address, "dispatch refused, skipping rest of node");
                return;
            }
        }
    }
}

// Keeps every address seen, across every crawler that shares it
#[derive(Clone, Default)]
pub struct CollectUrls {
    urls: Arc<Mutex<Vec<String>>>,
}

impl CollectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.urls.lock().len()
    }
}

#[async_trait]
impl Scraper for CollectUrls {
    async fn scrape(&self, node: &Node) {
        let found: Vec<String> = url_values(node).map(str::to_string).collect();
        self.urls.lock().extend(found);
    }
}

// Renders each node it sees to a writer (stdout by default)
pub struct DumpHtml<W = std::io::Stdout> {
    out: Mutex<W>,
}

impl DumpHtml {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W> DumpHtml<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

#[async_trait]
impl<W: Write + Send> Scraper for DumpHtml<W> {
    async fn scrape(&self, node: &Node) {
        let rendered = node.render();
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{rendered}") {
            warn!("failed to dump node: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::testing::Recorder;

    fn link_node() -> Node {
        Node::element("a")
            .with_attr("href", "/one")
            .with_attr("class", "nav")
            .with_attr("src", "/two")
    }

    #[tokio::test]
    async fn test_recover_urls_dispatches_src_and_href() {
        let recorder = Arc::new(Recorder::<String>::new());
        let scraper = RecoverUrls::new(recorder.clone());
        scraper.scrape(&link_node()).await;
        assert_eq!(recorder.jobs(), vec!["/one", "/two"]);
    }

    #[tokio::test]
    async fn test_recover_urls_stops_on_refusal() {
        let recorder = Arc::new(Recorder::<String>::accepting(0));
        let scraper = RecoverUrls::new(recorder.clone());
        scraper.scrape(&link_node()).await;
        assert!(recorder.jobs().is_empty());

        // With room for one, the second address on the node is never offered
        let recorder = Arc::new(Recorder::<String>::accepting(1));
        let scraper = RecoverUrls::new(recorder.clone());
        scraper.scrape(&link_node()).await;
        assert_eq!(recorder.jobs(), vec!["/one"]);
    }

    #[tokio::test]
    async fn test_collect_urls_is_shared_between_clones() {
        let collected = CollectUrls::new();
        let other = collected.clone();
        collected.scrape(&link_node()).await;
        other.scrape(&Node::element("img").with_attr("src", "/i.png")).await;
        assert_eq!(collected.urls(), vec!["/one", "/two", "/i.png"]);
        assert_eq!(other.len(), 3);
    }

    #[tokio::test]
    async fn test_dump_html_writes_rendered_node() {
        let dump = DumpHtml::new(Vec::new());
        dump.scrape(&Node::element("img").with_attr("src", "/i.png")).await;
        let written = String::from_utf8(dump.out.lock().clone()).unwrap();
        assert_eq!(written, "<img src=\"/i.png\">\n");
    }

    #[tokio::test]
    async fn test_then_runs_both_in_order() {
        let recorder = Arc::new(Recorder::<String>::new());
        let collected = CollectUrls::new();
        let chained = RecoverUrls::new(recorder.clone()).then(collected.clone());
        chained.scrape(&link_node()).await;
        assert_eq!(recorder.jobs(), vec!["/one", "/two"]);
        assert_eq!(collected.len(), 2);
    }
}
