//! In-memory `Document` for engine tests
//!
//! Answers are registered per locator source. Every locator is still
//! compiled first, so malformed ones fail exactly as they would on a page.

use std::collections::HashMap;

use super::{Document, DocumentNode};
use crate::error::QueryError;
use crate::locator::Locator;

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeNode {
    text: String,
    attributes: Vec<(String, String)>,
}

impl FakeNode {
    pub(crate) fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            attributes: Vec::new(),
        }
    }

    pub(crate) fn anchor(href: Option<&str>) -> Self {
        Self {
            text: String::new(),
            attributes: href
                .map(|href| vec![("href".to_string(), href.to_string())])
                .unwrap_or_default(),
        }
    }
}

impl DocumentNode for FakeNode {
    fn text_content(&self) -> String {
        self.text.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeDocument {
    answers: HashMap<String, Vec<FakeNode>>,
}

impl FakeDocument {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, locator: &str, nodes: Vec<FakeNode>) -> Self {
        self.answers.insert(locator.to_string(), nodes);
        self
    }

    pub(crate) fn with_texts(self, locator: &str, texts: &[&str]) -> Self {
        self.with(locator, texts.iter().map(|t| FakeNode::text(t)).collect())
    }

    pub(crate) fn with_hrefs(self, locator: &str, hrefs: &[&str]) -> Self {
        self.with(locator, hrefs.iter().map(|h| FakeNode::anchor(Some(h))).collect())
    }
}

impl Document for FakeDocument {
    type Node<'a> = FakeNode;

    fn evaluate(&self, locator: &Locator) -> Result<Vec<FakeNode>, QueryError> {
        locator.compile()?;
        Ok(self.answers.get(locator.as_str()).cloned().unwrap_or_default())
    }
}
