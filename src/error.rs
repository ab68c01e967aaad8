//! Error types
//!
//! A `QueryError` is scoped to the rule whose locator raised it; the engine
//! reports it and carries on.

use thiserror::Error;

/// A locator could not be compiled or did not select nodes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("syntax error in `{locator}` at offset {position}: {message}")]
    Syntax {
        locator: String,
        position: usize,
        message: String,
    },
    #[error("unknown function `{0}()`")]
    UnknownFunction(String),
    #[error("`{function}()` takes {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },
    #[error("unknown axis `{0}`")]
    UnknownAxis(String),
    #[error("`{0}` does not select nodes")]
    NotANodeSet(String),
}

/// A derived-query template is not usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template `{0}` has no {{{{text}}}} slot")]
    MissingSlot(String),
    #[error("template `{0}` has more than one {{{{text}}}} slot")]
    MultipleSlots(String),
}

/// A rule catalog could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse rule set: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no rule set for page `{0}`")]
    UnknownPage(String),
}

/// Writing the spreadsheet failed.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: the workbook would have no sheets")]
    EmptyWorkbook,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
}
