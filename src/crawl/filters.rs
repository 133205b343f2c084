// src/crawl/filters.rs
// =============================================================================
// Node filters decide which nodes a scraper gets to see.
//
// A filter is just a predicate over a Node, wrapped so it can be cloned,
// shared between crawlers, and combined:
//
//   has_attrs(&["src", "href"]).and(is_leaf())
// =============================================================================

use super::node::Node;
use std::sync::Arc;

#[derive(Clone)]
pub struct NodeFilter(Arc<dyn Fn(&Node) -> bool + Send + Sync>);

impl NodeFilter {
    pub fn new(predicate: impl Fn(&Node) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    // Matches nothing. Handy as the starting point for a chain of or()s.
    pub fn none() -> Self {
        Self::new(|_| false)
    }

    pub fn all() -> Self {
        Self::new(|_| true)
    }

    pub fn matches(&self, node: &Node) -> bool {
        (self.0)(node)
    }

    pub fn and(self, other: NodeFilter) -> Self {
        Self::new(move |node| self.matches(node) && other.matches(node))
    }

    pub fn or(self, other: NodeFilter) -> Self {
        Self::new(move |node| self.matches(node) || other.matches(node))
    }
}

pub fn has_attr(key: &str) -> NodeFilter {
    let key = key.to_string();
    NodeFilter::new(move |node| node.attr(&key).is_some())
}

// Matches nodes that carry at least one of the attributes
pub fn has_attrs(keys: &[&str]) -> NodeFilter {
    keys.iter()
        .fold(NodeFilter::none(), |filter, key| filter.or(has_attr(key)))
}

pub fn is_leaf() -> NodeFilter {
    NodeFilter::new(Node::is_leaf)
}
