// src/crawl/node.rs
// =============================================================================
// This module defines the page tree that scrapers walk over.
//
// The `scraper` crate parses HTML into an ego_tree of nodes. That tree can't
// be sent between threads, and our scrapers await on the job queue while
// they walk, so we copy the parts we need into a plain owned tree:
// - element name (or "#document" / "#text")
// - attributes, in document order
// - text content for text and comment nodes
// - children (whitespace-only text and comments included, so a node is only
//   a leaf when the HTML really has nothing inside it)
//
// Rust concepts:
// - Recursion: converting the tree one node at a time
// - Iterators: walk() yields nodes depth-first without recursion
// =============================================================================

use ego_tree::NodeRef;
use scraper::Html;

pub const DOCUMENT: &str = "#document";
pub const TEXT: &str = "#text";
pub const COMMENT: &str = "#comment";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Node>,
}

impl Node {
    pub fn element(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            name: TEXT.to_string(),
            text: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn comment(content: impl Into<String>) -> Self {
        Self {
            name: COMMENT.to_string(),
            text: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn document() -> Self {
        Self::element(DOCUMENT)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // First value of the attribute, if the node has it
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.children.first()
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    // True when the node has no children at all. Whitespace and comments
    // count as children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    // Depth-first, pre-order: a node comes before its children, and children
    // come in document order
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    // Parses an HTML document into a tree rooted at a "#document" node
    pub fn from_html(html: &str) -> Node {
        let document = Html::parse_document(html);
        convert(document.tree.root()).unwrap_or_else(Node::document)
    }

    // Renders the node and everything under it back to (roughly) HTML
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        if let Some(text) = &self.text {
            if self.name == COMMENT {
                out.push_str(&format!("<!--{text}-->"));
            } else {
                out.push_str(text);
            }
            return;
        }
        let is_document = self.name == DOCUMENT;
        if !is_document {
            out.push('<');
            out.push_str(&self.name);
            for (key, value) in self.attrs() {
                out.push_str(&format!(" {key}=\"{value}\""));
            }
            out.push('>');
        }
        for child in &self.children {
            child.render_into(out);
        }
        if !is_document && !self.children.is_empty() {
            out.push_str(&format!("</{}>", self.name));
        }
    }
}

// Copies one scraper node (and its subtree) into our own Node type.
// Doctypes and processing instructions are dropped.
fn convert(node: NodeRef<'_, scraper::Node>) -> Option<Node> {
    let mut converted = match node.value() {
        scraper::Node::Document | scraper::Node::Fragment => Node::document(),
        scraper::Node::Element(element) => {
            let mut converted = Node::element(element.name());
            converted.attrs = element
                .attrs()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect();
            converted
        }
        scraper::Node::Text(text) => {
            let text: &str = text;
            Node::text(text)
        }
        scraper::Node::Comment(comment) => {
            let comment: &str = comment;
            Node::comment(comment)
        }
        _ => return None,
    };

    // Follow the first-child / next-sibling links
    let mut child = node.first_child();
    while let Some(current) = child {
        if let Some(next) = convert(current) {
            converted.children.push(next);
        }
        child = current.next_sibling();
    }
    Some(converted)
}

pub struct Walk<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reversed so the first child is popped next
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
