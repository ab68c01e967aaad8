//! Structured queries over a rendered page
//!
//! A [`Locator`] is an XPath 1.0 subset expression kept in source form and
//! compiled when it is evaluated, so a stale or malformed locator fails at
//! evaluation time and only for the rule that owns it.
//!
//! A [`LocatorTemplate`] builds a second locator from a matched node's text.
//! The text is always quoted as an XPath string literal, never spliced in raw.

mod ast;
mod parser;

pub use ast::*;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, TemplateError};

/// Placeholder a [`LocatorTemplate`] substitutes.
pub const TEXT_SLOT: &str = "{{text}}";

/// An XPath-equivalent query, e.g. `//div[@id='search']//a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the locator. The result must select nodes.
    pub fn compile(&self) -> Result<Expr, QueryError> {
        let expr = parser::parse(&self.0)?;
        if !expr.yields_nodes() {
            return Err(QueryError::NotANodeSet(self.0.clone()));
        }
        Ok(expr)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

/// A locator with exactly one `{{text}}` slot standing for a string literal.
///
/// `//div[text()={{text}}]` and `//div[text()='{{text}}']` are equivalent:
/// quotes written around the slot are dropped and the substituted text is
/// re-quoted by [`quote_literal`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LocatorTemplate {
    prefix: String,
    suffix: String,
}

impl LocatorTemplate {
    pub fn new(source: &str) -> Result<Self, TemplateError> {
        let (prefix, suffix) = source
            .split_once(TEXT_SLOT)
            .ok_or_else(|| TemplateError::MissingSlot(source.to_string()))?;
        if suffix.contains(TEXT_SLOT) {
            return Err(TemplateError::MultipleSlots(source.to_string()));
        }

        let (mut prefix, mut suffix) = (prefix, suffix);
        for quote in ['\'', '"'] {
            if let (Some(p), Some(s)) = (prefix.strip_suffix(quote), suffix.strip_prefix(quote)) {
                prefix = p;
                suffix = s;
                break;
            }
        }

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// A template whose slot sits between `prefix` and `suffix`.
    pub(crate) fn from_parts(prefix: &str, suffix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    /// Build the concrete locator for one matched topic.
    pub fn substitute(&self, text: &str) -> Locator {
        Locator(format!("{}{}{}", self.prefix, quote_literal(text), self.suffix))
    }

    /// Template source with a bare slot.
    pub fn source(&self) -> String {
        format!("{}{}{}", self.prefix, TEXT_SLOT, self.suffix)
    }
}

impl TryFrom<String> for LocatorTemplate {
    type Error = TemplateError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Self::new(&source)
    }
}

impl From<LocatorTemplate> for String {
    fn from(template: LocatorTemplate) -> Self {
        template.source()
    }
}

/// Quote `text` as an XPath 1.0 string literal.
///
/// XPath literals have no escape syntax, so text holding both quote kinds is
/// split into pieces and joined with `concat()`.
pub fn quote_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }

    let mut parts = Vec::new();
    let mut piece = String::new();
    for c in text.chars() {
        if c == '\'' {
            if !piece.is_empty() {
                parts.push(format!("'{piece}'"));
                piece.clear();
            }
            parts.push("\"'\"".to_string());
        } else {
            piece.push(c);
        }
    }
    if !piece.is_empty() {
        parts.push(format!("'{piece}'"));
    }
    format!("concat({})", parts.join(", "))
}
