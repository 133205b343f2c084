// src/crawl/crawler.rs
// =============================================================================
// A Crawler handles one job at a time:
// 1. Fetch the page tree for the job's address
// 2. Walk the tree depth-first
// 3. Offer every node to each (filter, scraper) pair, in the order they were
//    added
//
// A failed fetch is logged and the job is skipped. Nothing that goes wrong
// with a single page is allowed to escape crawl().
// =============================================================================

use super::fetch::Fetch;
use super::filters::NodeFilter;
use super::node::Node;
use super::scrapers::Scraper;
use std::sync::Arc;
use tracing::{debug, warn};

// A scraper plus the filter that decides which nodes it sees
#[derive(Clone)]
pub struct FilteredScraper {
    filter: NodeFilter,
    scraper: Arc<dyn Scraper>,
}

// What happened to a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    // The tree was fetched and every node was visited
    Walked { nodes: usize },
    // The fetch failed; nothing was scraped
    Skipped,
}

pub struct Crawler {
    fetcher: Arc<dyn Fetch>,
    scrapers: Vec<FilteredScraper>,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            scrapers: Vec::new(),
        }
    }

    // Adds a scraper that runs on every node the filter matches
    pub fn add_scraper(mut self, scraper: impl Scraper + 'static, filter: NodeFilter) -> Self {
        self.scrapers.push(FilteredScraper {
            filter,
            scraper: Arc::new(scraper),
        });
        self
    }

    // Applies every matching scraper to one node
    pub async fn scrape(&self, node: &Node) {
        for FilteredScraper { filter, scraper } in &self.scrapers {
            if filter.matches(node) {
                scraper.scrape(node).await;
            }
        }
    }

    // Fetches the address and walks its tree. Never fails: a fetch error is
    // logged and reported as Skipped.
    pub async fn crawl(&self, address: &str) -> CrawlOutcome {
        let tree = match self.fetcher.fetch(address).await {
            Ok(tree) => tree,
            Err(e) => {
                warn!(address, "skipping job: {e}");
                return CrawlOutcome::Skipped;
            }
        };

        let mut nodes = 0;
        for node in tree.walk() {
            self.scrape(node).await;
            nodes += 1;
        }
        debug!(address, nodes, "crawled");
        CrawlOutcome::Walked { nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::fetch::StaticFetcher;
    use crate::crawl::filters::{has_attrs, is_leaf};
    use crate::crawl::scrapers::{CollectUrls, RecoverUrls, URL_ATTRS};
    use crate::messaging::testing::Recorder;

    fn page() -> Node {
        Node::document().with_child(
            Node::element("body")
                .with_child(
                    Node::element("a")
                        .with_attr("href", "/first")
                        .with_child(Node::text("first")),
                )
                .with_child(Node::element("img").with_attr("src", "/second.png")),
        )
    }

    fn fetcher() -> Arc<dyn Fetch> {
        Arc::new(StaticFetcher::default().page("http://site.test/", page()))
    }

    #[tokio::test]
    async fn test_crawl_applies_scrapers_in_traversal_order() {
        let recorder = Arc::new(Recorder::<String>::new());
        let crawler = Crawler::new(fetcher())
            .add_scraper(RecoverUrls::new(recorder.clone()), has_attrs(&URL_ATTRS));

        let outcome = crawler.crawl("http://site.test/").await;

        assert_eq!(outcome, CrawlOutcome::Walked { nodes: 5 });
        assert_eq!(recorder.jobs(), vec!["/first", "/second.png"]);
    }

    #[tokio::test]
    async fn test_filters_limit_what_a_scraper_sees() {
        let collected = CollectUrls::new();
        let crawler = Crawler::new(fetcher())
            .add_scraper(collected.clone(), has_attrs(&URL_ATTRS).and(is_leaf()));

        crawler.crawl("http://site.test/").await;

        // The <a> has a text child, so only the <img> is a leaf
        assert_eq!(collected.urls(), vec!["/second.png"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_absorbed() {
        let collected = CollectUrls::new();
        let crawler = Crawler::new(fetcher()).add_scraper(collected.clone(), NodeFilter::all());

        let outcome = crawler.crawl("http://missing.test/").await;

        assert_eq!(outcome, CrawlOutcome::Skipped);
        assert_eq!(collected.len(), 0);
    }
}
