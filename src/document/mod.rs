//! The page the engine reads from
//!
//! The engine only needs three capabilities from a rendered page: evaluate a
//! locator into an ordered snapshot of nodes, read a node's text content, and
//! read one of its attributes. Any host (a parsed HTML string, a headless
//! browser bridge, a test fixture) plugs in by implementing [`Document`].

mod html;
mod xpath;

#[cfg(test)]
pub(crate) mod fake;

pub use html::{HtmlDocument, HtmlNode};

use crate::error::QueryError;
use crate::locator::Locator;

/// A node in an evaluation snapshot.
pub trait DocumentNode {
    /// Concatenated text of the node and its descendants. For an attribute
    /// node this is the attribute value.
    fn text_content(&self) -> String;

    /// Attribute value, `None` when absent or when the node has no attributes.
    fn attribute(&self, name: &str) -> Option<String>;
}

/// A read-only rendered page.
pub trait Document {
    type Node<'a>: DocumentNode
    where
        Self: 'a;

    /// Evaluate `locator` against the whole page.
    ///
    /// Returns matches in document order. The snapshot borrows the document,
    /// so the page cannot change while it is held.
    fn evaluate(&self, locator: &Locator) -> Result<Vec<Self::Node<'_>>, QueryError>;
}
