//! Search results page extractor
//!
//! Pulls result listings out of a rendered search engine results page:
//! - a declarative rule catalog per page type (`rules`)
//! - XPath-subset locators evaluated over the parsed page (`locator`, `document`)
//! - link sanitizing and text phrase reconstruction (`extractors`)
//! - HTML and XLSX output of the extracted result sets (`render`, `export`)
//!
//! A C ABI with JSON payloads is exposed in `ffi`.

pub mod document;
pub mod engine;
pub mod error;
pub mod export;
pub mod extractors;
pub mod ffi;
pub mod locator;
pub mod model;
pub mod render;
pub mod rules;

pub use document::{Document, DocumentNode, HtmlDocument};
pub use engine::{extract, run, ExtractionOutcome, RuleFailure};
pub use error::{ConfigError, ExportError, QueryError, TemplateError};
pub use locator::{Locator, LocatorTemplate};
pub use model::{ContainerKind, ExportDocument, ResultSet, ResultValue};
pub use rules::{ExtractionRule, RuleSet};
