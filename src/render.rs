//! HTML fragment listing the extracted results
//!
//! The fragment is meant to be appended to the results page by the host, with
//! the download button wired to the export.

use std::fmt::Write;

use crate::model::{ContainerKind, ExportDocument};

/// Id of the button the host wires to the workbook download.
pub const DOWNLOAD_BUTTON_ID: &str = "downloadUrlExcelFile";

/// Render every result set as a titled list, followed by the download button.
pub fn render_html(doc: &ExportDocument) -> String {
    let mut html = String::from(r#"<div width="100%">"#);

    for set in doc {
        let tag = set.container_kind.tag();
        let item_open = match set.container_kind {
            ContainerKind::Ordered => r#"<li style="list-style:decimal">"#,
            ContainerKind::Unordered => "<li>",
        };

        let _ = write!(html, "<h2>{}</h2><{tag}>", escape_html(&set.name));
        for value in &set.values {
            html.push_str(item_open);
            let text = escape_html(&value.value);
            if value.is_link() {
                let _ = write!(html, r#"<a href="{text}">{text}</a>"#);
            } else {
                html.push_str(&text);
            }
            html.push_str("</li>");
        }
        let _ = write!(html, "</{tag}>");
    }

    html.push_str("<hr/><br /><br /></div>");
    let _ = write!(
        html,
        r#"<button id="{DOWNLOAD_BUTTON_ID}">Download Excel</button><br />"#
    );
    html
}

/// Escape text for use in element content and quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResultSet;
    use pretty_assertions::assert_eq;
    use scraper::{Html, Selector};

    fn sample() -> ExportDocument {
        ExportDocument::from(vec![
            ResultSet::new(
                "Organic Results",
                ContainerKind::Ordered,
                ["https://a.example/?x=1&y=2", "https://b.example/"],
            ),
            ResultSet::new("People <Also> Ask", ContainerKind::Unordered, ["is it \"good\"?"]),
        ])
    }

    #[test]
    fn test_render_structure() {
        let html = render_html(&sample());
        let fragment = Html::parse_fragment(&html);
        let select = |css: &str| Selector::parse(css).unwrap();

        let titles: Vec<String> = fragment
            .select(&select("h2"))
            .map(|h| h.text().collect())
            .collect();
        assert_eq!(titles, ["Organic Results", "People <Also> Ask"]);

        let links: Vec<&str> = fragment
            .select(&select("ol > li > a"))
            .filter_map(|a| a.value().attr("href"))
            .collect();
        assert_eq!(links, ["https://a.example/?x=1&y=2", "https://b.example/"]);

        let items: Vec<String> = fragment
            .select(&select("ul > li"))
            .map(|li| li.text().collect())
            .collect();
        assert_eq!(items, ["is it \"good\"?"]);

        assert_eq!(fragment.select(&select("ol > li[style]")).count(), 2);
        assert_eq!(fragment.select(&select("ul > li[style]")).count(), 0);
        assert_eq!(fragment.select(&select("button#downloadUrlExcelFile")).count(), 1);
    }

    #[test]
    fn test_markup_in_values_is_escaped() {
        let doc = ExportDocument::from(vec![ResultSet::new(
            "T",
            ContainerKind::Unordered,
            ["<script>alert(1)</script>", "http://x.example/\"><b>"],
        )]);
        let html = render_html(&doc);

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains(r#"<a href="http://x.example/&quot;&gt;&lt;b&gt;">"#));
    }

    #[test]
    fn test_empty_document_still_has_button() {
        let html = render_html(&ExportDocument::new());
        assert!(!html.contains("<h2>"));
        assert!(html.ends_with(r#"<button id="downloadUrlExcelFile">Download Excel</button><br />"#));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"a & b < c > "d" 'e'"#), "a &amp; b &lt; c &gt; &quot;d&quot; &#39;e&#39;");
    }
}
