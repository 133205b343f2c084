// src/crawl/rules.rs
// =============================================================================
// The address rules the crawler plugs into its dispatcher chain.
//
// Preprocessing (rewrites, run first):
// - trim_relative_prefix: "./docs" and "/docs" both become "docs"
// - relativize: "docs" becomes "<target>/docs"
//
// Validation (filters, run on the rewritten address):
// - no_fragment: drop anything with a '#'
// - crawlable: only addresses that look like pages (no file extension other
//   than .html)
//
// Examples (target = "http://example.test"):
//   "./about"                      -> "http://example.test/about"   crawled
//   "http://example.test/a.html"   -> unchanged                     crawled
//   "http://example.test/#top"     -> unchanged                     dropped
//   "/style.css"                   -> "http://example.test/style.css" dropped
// =============================================================================

use regex::Regex;
use std::sync::LazyLock;

static CRAWLABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)https?://[a-zA-Z\d./:]+/[a-zA-Z\d]*(\.html)?$")
        .expect("crawlable pattern is a valid regex")
});

// Strips any leading '.' and '/' characters
pub fn trim_relative_prefix(address: String) -> String {
    address.trim_start_matches(['.', '/']).to_string()
}

// Builds a step that joins relative addresses onto the target
//
// Addresses that already start with "http", or that already start with the
// target (with or without "www."), are left alone.
pub fn relativize(target: &str) -> impl Fn(String) -> String + Send + Sync + 'static {
    let target = target.trim_end_matches('/').to_string();
    let bare_target = target.replace("www.", "");

    move |address: String| {
        if address.starts_with("http")
            || address.starts_with(&target)
            || address.starts_with(&bare_target)
        {
            return address;
        }
        format!("{target}/{address}")
    }
}

pub fn no_fragment(address: &str) -> bool {
    !address.contains('#')
}

pub fn crawlable(address: &str) -> bool {
    CRAWLABLE.is_match(address)
}
