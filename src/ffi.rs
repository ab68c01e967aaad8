//! FFI interface for hosts that are not Rust
//!
//! JSON in, JSON out. Every call returns a [`SerpResultFFI`] owned by Rust
//! that must be released with [`serp_free_result`].

use std::ffi::{c_char, CStr, CString};
use std::path::Path;
use std::ptr;

use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::document::HtmlDocument;
use crate::error::ConfigError;
use crate::model::ExportDocument;
use crate::rules::RuleSet;
use crate::{engine, export, render};

/// Result struct returned to the host.
/// Both pointers are owned by Rust and must be freed via `serp_free_result`.
#[repr(C)]
pub struct SerpResultFFI {
    /// JSON-serialized result (null-terminated), or null on failure
    pub json_ptr: *mut c_char,
    /// Error message (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Extract result sets from a rendered results page.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `page_url` - URL of the page (null-terminated); picks the built-in rule set
/// * `rules_json` - JSON-serialized RuleSet (null-terminated), or null to use
///   the built-in rule set for `page_url`
///
/// # Returns
/// The ExportDocument as a JSON array of result sets.
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `page_url` and `rules_json` must each be null or a valid null-terminated C string
/// - Caller must free the result via `serp_free_result`
#[no_mangle]
pub unsafe extern "C" fn serp_extract(
    html_ptr: *const c_char,
    html_len: usize,
    page_url: *const c_char,
    rules_json: *const c_char,
) -> SerpResultFFI {
    let html = match read_html(html_ptr, html_len) {
        Ok(html) => html,
        Err(msg) => return make_error_result(msg),
    };

    let rules = if rules_json.is_null() {
        let url = match read_c_str(page_url, "page URL") {
            Ok(url) => url,
            Err(msg) => return make_error_result(&msg),
        };
        match RuleSet::for_page_url(url) {
            Some(rules) => rules,
            None => return make_error_result(&ConfigError::UnknownPage(url.to_string()).to_string()),
        }
    } else {
        let json = match read_c_str(rules_json, "rules JSON") {
            Ok(json) => json,
            Err(msg) => return make_error_result(&msg),
        };
        match RuleSet::from_json(json) {
            Ok(rules) => rules,
            Err(e) => return make_error_result(&e.to_string()),
        }
    };

    let document = HtmlDocument::parse(html);
    make_json_result(&engine::extract(&document, &rules))
}

/// Render an ExportDocument (JSON) as an HTML fragment.
///
/// # Returns
/// The fragment as a JSON string.
///
/// # Safety
/// - `export_json` must be a valid null-terminated C string
/// - Caller must free the result via `serp_free_result`
#[no_mangle]
pub unsafe extern "C" fn serp_render(export_json: *const c_char) -> SerpResultFFI {
    let doc = match read_export(export_json) {
        Ok(doc) => doc,
        Err(msg) => return make_error_result(&msg),
    };
    make_json_result(&render::render_html(&doc))
}

/// Save an ExportDocument (JSON) as `<search-term>-<engine>.xlsx` in `out_dir`.
///
/// The search term is the `q` parameter of `page_url` and the engine comes
/// from the page's built-in rule set (`google` when there is none).
///
/// # Returns
/// `{"path": "<written file>"}`
///
/// # Safety
/// - `export_json`, `page_url` and `out_dir` must be valid null-terminated C strings
/// - Caller must free the result via `serp_free_result`
#[no_mangle]
pub unsafe extern "C" fn serp_save_workbook(
    export_json: *const c_char,
    page_url: *const c_char,
    out_dir: *const c_char,
) -> SerpResultFFI {
    let doc = match read_export(export_json) {
        Ok(doc) => doc,
        Err(msg) => return make_error_result(&msg),
    };
    let url = match read_c_str(page_url, "page URL") {
        Ok(url) => url,
        Err(msg) => return make_error_result(&msg),
    };
    let dir = match read_c_str(out_dir, "output directory") {
        Ok(dir) => dir,
        Err(msg) => return make_error_result(&msg),
    };

    let term = export::search_term_from_url(url).unwrap_or_default();
    let engine = RuleSet::for_page_url(url)
        .map(|rules| rules.engine)
        .unwrap_or_else(|| "google".to_string());

    match export::save_workbook(&doc, Path::new(dir), &term, &engine) {
        Ok(path) => make_json_result(&json!({ "path": path })),
        Err(e) => make_error_result(&format!("Failed to save workbook: {}", e)),
    }
}

/// Install a stderr log subscriber filtered by `filter` (e.g. `serp_extractor=debug`).
///
/// # Returns
/// `{"installed": false}` when a subscriber was already installed.
///
/// # Safety
/// - `filter` must be a valid null-terminated C string
/// - Caller must free the result via `serp_free_result`
#[no_mangle]
pub unsafe extern "C" fn serp_init_logging(filter: *const c_char) -> SerpResultFFI {
    let directives = match read_c_str(filter, "log filter") {
        Ok(directives) => directives,
        Err(msg) => return make_error_result(&msg),
    };
    let filter = match EnvFilter::try_new(directives) {
        Ok(filter) => filter,
        Err(e) => return make_error_result(&format!("Invalid log filter: {}", e)),
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();
    make_json_result(&json!({ "installed": installed }))
}

/// Free a SerpResultFFI returned by any `serp_*` function
///
/// # Safety
/// - `result` must have been returned by a `serp_*` function
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn serp_free_result(result: SerpResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

unsafe fn read_html<'a>(html_ptr: *const c_char, html_len: usize) -> Result<&'a str, &'static str> {
    if html_ptr.is_null() || html_len == 0 {
        return Ok("");
    }
    let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
    std::str::from_utf8(slice).map_err(|_| "Invalid UTF-8 in HTML content")
}

unsafe fn read_c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{} is null", what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| format!("Invalid UTF-8 in {}", what))
}

unsafe fn read_export(export_json: *const c_char) -> Result<ExportDocument, String> {
    let json = read_c_str(export_json, "export JSON")?;
    serde_json::from_str(json).map_err(|e| format!("Failed to parse export JSON: {}", e))
}

fn make_json_result<T: Serialize>(value: &T) -> SerpResultFFI {
    match serde_json::to_string(value) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => SerpResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

// Helper to create error result
fn make_error_result(msg: &str) -> SerpResultFFI {
    let error_cstr = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    SerpResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}
