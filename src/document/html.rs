//! `Document` over an HTML string parsed with scraper

use std::collections::HashMap;

use ego_tree::{NodeId, NodeRef};
use scraper::{Html, Node};

use super::xpath::Evaluator;
use super::{Document, DocumentNode};
use crate::error::QueryError;
use crate::locator::Locator;

/// A parsed page plus the document order of its nodes.
pub struct HtmlDocument {
    html: Html,
    order: HashMap<NodeId, usize>,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Self {
        Self::from_html(Html::parse_document(html))
    }

    pub fn from_html(html: Html) -> Self {
        let order = html
            .tree
            .root()
            .descendants()
            .enumerate()
            .map(|(index, node)| (node.id(), index))
            .collect();
        Self { html, order }
    }

    pub(crate) fn root(&self) -> NodeRef<'_, Node> {
        self.html.tree.root()
    }

    /// Position of a node in a depth-first walk from the root.
    pub(crate) fn order_of(&self, id: NodeId) -> usize {
        self.order.get(&id).copied().unwrap_or(usize::MAX)
    }
}

impl Document for HtmlDocument {
    type Node<'a> = HtmlNode<'a>;

    fn evaluate(&self, locator: &Locator) -> Result<Vec<HtmlNode<'_>>, QueryError> {
        let expr = locator.compile()?;
        Evaluator::new(self).select(&expr, locator)
    }
}

/// A node selected from an [`HtmlDocument`].
#[derive(Clone, Copy)]
pub enum HtmlNode<'a> {
    Node(NodeRef<'a, Node>),
    Attribute {
        owner: NodeRef<'a, Node>,
        index: usize,
        name: &'a str,
        value: &'a str,
    },
}

impl<'a> HtmlNode<'a> {
    /// XPath string-value.
    pub fn string_value(&self) -> String {
        match self {
            HtmlNode::Attribute { value, .. } => (*value).to_string(),
            HtmlNode::Node(node) => match node.value() {
                Node::Text(text) => String::from(&**text),
                Node::Comment(comment) => String::from(&**comment),
                Node::Document | Node::Fragment | Node::Element(_) => node
                    .descendants()
                    .filter_map(|n| n.value().as_text())
                    .map(|text| &**text)
                    .collect(),
                _ => String::new(),
            },
        }
    }

    pub(crate) fn node(&self) -> Option<NodeRef<'a, Node>> {
        match self {
            HtmlNode::Node(node) => Some(*node),
            HtmlNode::Attribute { .. } => None,
        }
    }
}

impl DocumentNode for HtmlNode<'_> {
    fn text_content(&self) -> String {
        self.string_value()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        match self {
            HtmlNode::Node(node) => node
                .value()
                .as_element()
                .and_then(|element| element.attr(name))
                .map(String::from),
            HtmlNode::Attribute { .. } => None,
        }
    }
}

impl std::fmt::Debug for HtmlNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HtmlNode::Node(node) => write!(f, "{:?}", node.value()),
            HtmlNode::Attribute { name, value, .. } => write!(f, "@{name}={value:?}"),
        }
    }
}
