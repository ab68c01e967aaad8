//! Spreadsheet export
//!
//! Writes an [`ExportDocument`] as an XLSX (Office Open XML) workbook: one
//! worksheet per result set, its values down column A, no header row.

use std::collections::HashSet;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tempfile::NamedTempFile;
use tracing::debug;
use url::Url;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ExportError;
use crate::model::{ExportDocument, ResultSet};

const SHEET_NAME_MAX: usize = 31;
const SHEET_NAME_FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const CT_WORKBOOK: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";

/// Write `doc` as an XLSX package into `writer` and hand the writer back.
pub fn write_workbook<W: Write + Seek>(doc: &ExportDocument, writer: W) -> Result<W, ExportError> {
    if doc.is_empty() {
        return Err(ExportError::EmptyWorkbook);
    }

    let names = sheet_names(doc);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(&content_types_xml(names.len())?)?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(&root_rels_xml()?)?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(&workbook_xml(&names)?)?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(&workbook_rels_xml(names.len())?)?;

    for (index, set) in doc.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", index + 1), options)?;
        zip.write_all(&worksheet_xml(set)?)?;
    }

    debug!(sheets = names.len(), "workbook written");
    Ok(zip.finish()?)
}

/// Write the workbook for `doc` into `dir` under [`export_file_name`].
pub fn save_workbook(
    doc: &ExportDocument,
    dir: &Path,
    search_term: &str,
    engine: &str,
) -> Result<PathBuf, ExportError> {
    if doc.is_empty() {
        return Err(ExportError::EmptyWorkbook);
    }
    let path = dir.join(export_file_name(search_term, engine));

    // Staged beside the target; only a complete workbook is renamed into place.
    let mut staged = NamedTempFile::new_in(dir)?;
    let mut file = write_workbook(doc, BufWriter::new(staged.as_file_mut()))?;
    file.flush()?;
    drop(file);
    staged.persist(&path).map_err(|err| err.error)?;

    debug!(path = %path.display(), "workbook saved");
    Ok(path)
}

/// `"<term>-<engine>.xlsx"`, with characters that are unsafe in file names
/// replaced by `_`.
pub fn export_file_name(search_term: &str, engine: &str) -> String {
    let term = if search_term.trim().is_empty() {
        "results"
    } else {
        search_term
    };
    format!("{}-{}.xlsx", file_safe(term), file_safe(engine))
}

/// The `q` parameter of a search page URL, form-decoded (`+` reads as a
/// space).
pub fn search_term_from_url(page_url: &str) -> Option<String> {
    let url = Url::parse(page_url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())
}

/// Worksheet names for `doc`, in order: legal, at most 31 characters, and
/// unique ignoring case.
pub fn sheet_names(doc: &ExportDocument) -> Vec<String> {
    let mut taken = HashSet::new();
    let mut names = Vec::with_capacity(doc.len());

    for set in doc {
        let base = sanitize_sheet_name(&set.name);
        let mut name = base.clone();
        let mut n = 2;
        while !taken.insert(name.to_lowercase()) {
            let suffix = format!(" ({n})");
            let keep = SHEET_NAME_MAX - suffix.chars().count();
            let stem: String = base.chars().take(keep).collect();
            name = format!("{}{suffix}", stem.trim_end());
            n += 1;
        }
        names.push(name);
    }

    names
}

fn sanitize_sheet_name(name: &str) -> String {
    let name: String = strip_control(name)
        .chars()
        .map(|c| if SHEET_NAME_FORBIDDEN.contains(&c) { '_' } else { c })
        .take(SHEET_NAME_MAX)
        .collect();
    if name.trim().is_empty() {
        "Sheet".to_string()
    } else {
        name
    }
}

fn file_safe(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Drop characters XML 1.0 cannot carry.
fn strip_control(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{fffe}' && c != '\u{ffff}')
        })
        .collect()
}

fn xml_writer() -> Result<Writer<Vec<u8>>, ExportError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    Ok(writer)
}

fn content_types_xml(sheets: usize) -> Result<Vec<u8>, ExportError> {
    let mut w = xml_writer()?;
    w.write_event(Event::Start(
        BytesStart::new("Types").with_attributes([("xmlns", NS_CONTENT_TYPES)]),
    ))?;
    w.write_event(Event::Empty(BytesStart::new("Default").with_attributes([
        ("Extension", "rels"),
        ("ContentType", CT_RELATIONSHIPS),
    ])))?;
    w.write_event(Event::Empty(BytesStart::new("Default").with_attributes([
        ("Extension", "xml"),
        ("ContentType", "application/xml"),
    ])))?;
    w.write_event(Event::Empty(BytesStart::new("Override").with_attributes([
        ("PartName", "/xl/workbook.xml"),
        ("ContentType", CT_WORKBOOK),
    ])))?;
    for sheet in 1..=sheets {
        let part = format!("/xl/worksheets/sheet{sheet}.xml");
        w.write_event(Event::Empty(BytesStart::new("Override").with_attributes([
            ("PartName", part.as_str()),
            ("ContentType", CT_WORKSHEET),
        ])))?;
    }
    w.write_event(Event::End(BytesEnd::new("Types")))?;
    Ok(w.into_inner())
}

fn root_rels_xml() -> Result<Vec<u8>, ExportError> {
    let mut w = xml_writer()?;
    w.write_event(Event::Start(
        BytesStart::new("Relationships").with_attributes([("xmlns", NS_PKG_REL)]),
    ))?;
    w.write_event(Event::Empty(BytesStart::new("Relationship").with_attributes([
        ("Id", "rId1"),
        ("Type", REL_OFFICE_DOCUMENT),
        ("Target", "xl/workbook.xml"),
    ])))?;
    w.write_event(Event::End(BytesEnd::new("Relationships")))?;
    Ok(w.into_inner())
}

fn workbook_xml(names: &[String]) -> Result<Vec<u8>, ExportError> {
    let mut w = xml_writer()?;
    w.write_event(Event::Start(
        BytesStart::new("workbook").with_attributes([("xmlns", NS_MAIN), ("xmlns:r", NS_REL)]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("sheets")))?;
    for (index, name) in names.iter().enumerate() {
        let id = (index + 1).to_string();
        let rel = format!("rId{id}");
        w.write_event(Event::Empty(BytesStart::new("sheet").with_attributes([
            ("name", name.as_str()),
            ("sheetId", id.as_str()),
            ("r:id", rel.as_str()),
        ])))?;
    }
    w.write_event(Event::End(BytesEnd::new("sheets")))?;
    w.write_event(Event::End(BytesEnd::new("workbook")))?;
    Ok(w.into_inner())
}

fn workbook_rels_xml(sheets: usize) -> Result<Vec<u8>, ExportError> {
    let mut w = xml_writer()?;
    w.write_event(Event::Start(
        BytesStart::new("Relationships").with_attributes([("xmlns", NS_PKG_REL)]),
    ))?;
    for sheet in 1..=sheets {
        let id = format!("rId{sheet}");
        let target = format!("worksheets/sheet{sheet}.xml");
        w.write_event(Event::Empty(BytesStart::new("Relationship").with_attributes([
            ("Id", id.as_str()),
            ("Type", REL_WORKSHEET),
            ("Target", target.as_str()),
        ])))?;
    }
    w.write_event(Event::End(BytesEnd::new("Relationships")))?;
    Ok(w.into_inner())
}

fn worksheet_xml(set: &ResultSet) -> Result<Vec<u8>, ExportError> {
    let mut w = xml_writer()?;
    w.write_event(Event::Start(
        BytesStart::new("worksheet").with_attributes([("xmlns", NS_MAIN)]),
    ))?;

    if set.values.is_empty() {
        w.write_event(Event::Empty(BytesStart::new("sheetData")))?;
    } else {
        w.write_event(Event::Start(BytesStart::new("sheetData")))?;
        for (index, value) in set.values().enumerate() {
            let row = (index + 1).to_string();
            let cell = format!("A{row}");
            w.write_event(Event::Start(BytesStart::new("row").with_attributes([("r", row.as_str())])))?;
            w.write_event(Event::Start(BytesStart::new("c").with_attributes([
                ("r", cell.as_str()),
                ("t", "inlineStr"),
            ])))?;
            w.write_event(Event::Start(BytesStart::new("is")))?;
            w.write_event(Event::Start(
                BytesStart::new("t").with_attributes([("xml:space", "preserve")]),
            ))?;
            w.write_event(Event::Text(BytesText::new(&strip_control(value))))?;
            w.write_event(Event::End(BytesEnd::new("t")))?;
            w.write_event(Event::End(BytesEnd::new("is")))?;
            w.write_event(Event::End(BytesEnd::new("c")))?;
            w.write_event(Event::End(BytesEnd::new("row")))?;
        }
        w.write_event(Event::End(BytesEnd::new("sheetData")))?;
    }

    w.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(w.into_inner())
}
