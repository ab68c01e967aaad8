//! Extraction engine
//!
//! Evaluates a [`RuleSet`] against one document. Extraction is best effort:
//! a rule whose locator fails is skipped and reported, and the remaining
//! rules run as usual.

use tracing::{debug, instrument, warn};

use crate::document::{Document, DocumentNode};
use crate::error::QueryError;
use crate::extractors::{reconstruct_phrases, sanitize_links, SanitizerConfig};
use crate::model::{ExportDocument, ResultSet};
use crate::rules::{ExtractionRule, RuleSet};

/// A rule skipped because one of its locators failed.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFailure {
    pub label: String,
    pub error: QueryError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionOutcome {
    pub export: ExportDocument,
    pub failures: Vec<RuleFailure>,
}

/// Run every rule in catalog order.
///
/// Rules matching nothing contribute nothing. A derived rule contributes one
/// set per matched topic, named `"<label> - <topic>"`, even when the topic's
/// own query matches nothing.
#[instrument(skip_all, fields(rule_set = %rules.name))]
pub fn run<D: Document>(document: &D, rules: &RuleSet) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::default();

    for rule in &rules.rules {
        match apply_rule(document, rule, &rules.sanitizer) {
            Ok(sets) => {
                debug!(rule = rule.label(), sets = sets.len(), "rule applied");
                for set in sets {
                    outcome.export.push(set);
                }
            }
            Err(error) => {
                warn!(rule = rule.label(), %error, "skipping rule");
                outcome.failures.push(RuleFailure {
                    label: rule.label().to_string(),
                    error,
                });
            }
        }
    }

    outcome
}

/// [`run`], keeping only the extracted results.
pub fn extract<D: Document>(document: &D, rules: &RuleSet) -> ExportDocument {
    run(document, rules).export
}

fn apply_rule<D: Document>(
    document: &D,
    rule: &ExtractionRule,
    sanitizer: &SanitizerConfig,
) -> Result<Vec<ResultSet>, QueryError> {
    let nodes = document.evaluate(rule.query())?;
    if nodes.is_empty() {
        return Ok(Vec::new());
    }

    Ok(match rule {
        ExtractionRule::Links {
            label, container, ..
        } => {
            let hrefs = nodes.iter().map(|node| node.attribute("href"));
            vec![ResultSet::new(
                label.as_str(),
                *container,
                sanitize_links(hrefs, sanitizer),
            )]
        }
        ExtractionRule::Text {
            label, container, ..
        } => {
            vec![ResultSet::new(label.as_str(), *container, phrases(&nodes))]
        }
        ExtractionRule::DerivedText {
            label,
            container,
            derived,
            ..
        } => {
            let mut sets = Vec::with_capacity(nodes.len());
            for topic in nodes.iter().map(DocumentNode::text_content) {
                let sub_nodes = document.evaluate(&derived.substitute(&topic))?;
                debug!(rule = label.as_str(), %topic, matches = sub_nodes.len(), "derived query");
                sets.push(ResultSet::new(
                    format!("{label} - {topic}"),
                    *container,
                    phrases(&sub_nodes),
                ));
            }
            sets
        }
    })
}

fn phrases<N: DocumentNode>(nodes: &[N]) -> Vec<String> {
    let fragments: Vec<String> = nodes.iter().map(DocumentNode::text_content).collect();
    reconstruct_phrases(&fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fake::{FakeDocument, FakeNode};
    use crate::document::HtmlDocument;
    use crate::locator::LocatorTemplate;
    use crate::model::ContainerKind::{Ordered, Unordered};
    use pretty_assertions::assert_eq;

    fn rule_set(rules: Vec<ExtractionRule>) -> RuleSet {
        RuleSet {
            name: "test".to_string(),
            engine: "google".to_string(),
            sanitizer: SanitizerConfig::google(),
            rules,
        }
    }

    fn values(doc: &ExportDocument, name: &str) -> Vec<String> {
        doc.get(name)
            .unwrap_or_else(|| panic!("no result set `{name}` in {:?}", doc.names()))
            .values()
            .map(str::to_string)
            .collect()
    }

    fn topics_rule() -> ExtractionRule {
        ExtractionRule::derived_text(
            "Other Topics",
            Unordered,
            "//topic/text()",
            LocatorTemplate::new("//t[.='{{text}}']/@title").unwrap(),
        )
    }

    #[test]
    fn test_malformed_rule_does_not_affect_others() {
        let document = FakeDocument::new()
            .with_hrefs("//ads//a", &["https://ad.example/"])
            .with_hrefs("//organic//a", &["https://one.example/", "https://two.example/"]);
        let valid = rule_set(vec![
            ExtractionRule::links("Ads", Unordered, "//ads//a"),
            ExtractionRule::links("Organic", Ordered, "//organic//a"),
        ]);
        let mut with_broken = valid.clone();
        with_broken
            .rules
            .insert(1, ExtractionRule::links("Broken", Unordered, "//div[@id='x'"));

        let baseline = run(&document, &valid);
        let outcome = run(&document, &with_broken);

        assert_eq!(outcome.export, baseline.export);
        assert_eq!(outcome.export.names(), ["Ads", "Organic"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].label, "Broken");
        assert!(matches!(outcome.failures[0].error, QueryError::Syntax { .. }));
    }

    #[test]
    fn test_deeply_nested_locator_fails_without_aborting() {
        let document = HtmlDocument::parse(r#"<a href="https://one.example/">one</a>"#);
        let deep = format!("{}//a{}", "(".repeat(200), ")".repeat(200));
        let rules = rule_set(vec![
            ExtractionRule::links("Deep", Unordered, &deep),
            ExtractionRule::links("Organic", Ordered, "//a"),
        ]);

        let outcome = run(&document, &rules);

        assert_eq!(outcome.export.names(), ["Organic"]);
        assert_eq!(values(&outcome.export, "Organic"), ["https://one.example/"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].label, "Deep");
        assert!(matches!(outcome.failures[0].error, QueryError::Syntax { .. }));
    }

    #[test]
    fn test_derived_rule_emits_one_set_per_topic() {
        let document = FakeDocument::new()
            .with_texts("//topic/text()", &["Topic A", "Topic Z"])
            .with_texts("//t[.='Topic A']/@title", &["Alpha", "Beta"]);

        let doc = extract(&document, &rule_set(vec![topics_rule()]));

        assert_eq!(doc.names(), ["Other Topics - Topic A", "Other Topics - Topic Z"]);
        assert_eq!(values(&doc, "Other Topics - Topic A"), ["Alpha", "Beta"]);
        assert!(values(&doc, "Other Topics - Topic Z").is_empty());
    }

    #[test]
    fn test_derived_rule_fails_as_a_whole() {
        let document = FakeDocument::new()
            .with_texts("//topic/text()", &["Topic A"])
            .with_texts("//p/text()", &["kept"]);
        let rules = rule_set(vec![
            ExtractionRule::derived_text(
                "Other Topics",
                Unordered,
                "//topic/text()",
                LocatorTemplate::new("//t[.={{text}}/@title").unwrap(),
            ),
            ExtractionRule::text("Related", Unordered, "//p/text()"),
        ]);

        let outcome = run(&document, &rules);

        assert_eq!(outcome.export.names(), ["Related"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].label, "Other Topics");
    }

    #[test]
    fn test_set_count_matches_rules_and_topics() {
        let document = FakeDocument::new()
            .with_hrefs("//a", &["https://a.example/"])
            .with_texts("//p/text()", &["x"])
            .with_texts("//topic/text()", &["Topic A", "Topic B", "Topic C"]);
        let rules = rule_set(vec![
            ExtractionRule::links("Links", Unordered, "//a"),
            ExtractionRule::links("Absent", Unordered, "//nav//a"),
            ExtractionRule::text("Text", Unordered, "//p/text()"),
            ExtractionRule::text("Also absent", Unordered, "//q/text()"),
            topics_rule(),
        ]);

        let doc = extract(&document, &rules);

        // two non-derived rules matched, plus three topics
        assert_eq!(doc.len(), 2 + 3);
        assert!(doc.get("Absent").is_none());
        assert!(doc.get("Also absent").is_none());
    }

    #[test]
    fn test_links_rule_keeping_nothing_still_emits_a_set() {
        let document = FakeDocument::new().with(
            "//a",
            vec![FakeNode::anchor(None), FakeNode::anchor(Some("/relative"))],
        );
        let doc = extract(&document, &rule_set(vec![ExtractionRule::links("Links", Unordered, "//a")]));

        assert_eq!(doc.names(), ["Links"]);
        assert!(values(&doc, "Links").is_empty());
    }

    #[test]
    fn test_text_rule_reconstructs_phrases() {
        let document =
            FakeDocument::new().with_texts("//p/text()", &["hello ", "world", " today", "next"]);
        let doc = extract(&document, &rule_set(vec![ExtractionRule::text("T", Ordered, "//p/text()")]));

        assert_eq!(values(&doc, "T"), ["hello world today", "next"]);
        assert_eq!(doc.get("T").map(|set| set.container_kind), Some(Ordered));
    }

    const SERP: &str = r##"<html><body>
        <div id="center_col">
          <div id="tads"><ul><li class="ads-ad"><div class="ad_cclk"><a href="https://www.googleadservices.com/pagead/aclk?sa=L&amp;adurl=https://shop.example/">Shop</a><a style="display:none" href="https://hidden.example/">Hidden</a></div></li></ul></div>
          <div id="search">
            <div class="g"><div class="rc"><div class="r"><a href="https://first.example/">First</a><a href="https://webcache.googleusercontent.com/search?q=cache:1">Cached</a></div></div></div>
            <div class="g"><div class="rc"><a href="/url?q=internal">Internal</a><a href="//second.example/page">Second</a><a href="https://maps.google.com/x">Maps</a></div></div>
          </div>
          <div id="bres">
            <div class="topic"><div><div><div class="VLkRKc">Topic A</div></div></div><a title="Alpha" href="#a">a</a><a title="Beta" href="#b">b</a></div>
            <div class="topic"><div><div><div class="VLkRKc">Topic B</div></div></div><a href="#c">untitled</a></div>
          </div>
          <div class="brs_col"><p><a href="/s1">pizza <b>near</b> me</a></p><p><a href="/s2">best pizza</a></p></div>
        </div>
    </body></html>"##;

    #[test]
    fn test_google_catalog_on_html_page() {
        let document = HtmlDocument::parse(SERP);
        let outcome = run(&document, &RuleSet::google_web());

        assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
        assert_eq!(
            outcome.export.names(),
            [
                "Top Ads",
                "Organic Results",
                "Other Topics - Topic A",
                "Other Topics - Topic B",
                "Searches Related To",
            ]
        );
        assert_eq!(
            values(&outcome.export, "Top Ads"),
            ["https://www.googleadservices.com/pagead/aclk?sa=L&adurl=https://shop.example/"]
        );
        assert_eq!(
            values(&outcome.export, "Organic Results"),
            ["https://first.example/", "https://second.example/page"]
        );
        assert_eq!(values(&outcome.export, "Other Topics - Topic A"), ["Alpha", "Beta"]);
        assert!(values(&outcome.export, "Other Topics - Topic B").is_empty());
        assert_eq!(
            values(&outcome.export, "Searches Related To"),
            ["pizza near me", "best pizza"]
        );
    }

    #[test]
    fn test_yahoo_catalog_unwraps_redirects() {
        let html = r#"<div id="web"><ol>
            <li><a class="ac-algo fz-l" href="https://r.search.yahoo.com/_ylt=A/RU=https%3a%2f%2fpizza.example%2fmenu/RK=2/RS=a-">Pizza</a></li>
            <li><a class="ac-algo" href="https://r.search.yahoo.com/_ylt=B/RU=https%3a%2f%2fr.search.yahoo.com%2f_ylt%3dC%2fRU%3dhttps%253a%252f%252fsub.example%252f%2fRK%3d2/RK=2/RS=b-">Sub</a></li>
            <li><a class="ac-algo-like" href="https://r.search.yahoo.com/_ylt=D/RU=https%3a%2f%2fother.example%2f/RK=2/RS=c-">Other</a></li>
            <li><a class="ac-algo" href="https://second.example/">Plain</a></li>
        </ol></div>"#;
        let outcome = run(&HtmlDocument::parse(html), &RuleSet::yahoo_web());

        assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
        assert_eq!(values(&outcome.export, "Organic Results"), ["https://pizza.example/menu"]);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let document = HtmlDocument::parse(SERP);
        let rules = RuleSet::google_web();

        let first = extract(&document, &rules);
        let second = extract(&document, &rules);

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_duplicate_topics_collide() {
        // Sub-queries match on topic text alone, so two containers with the
        // same label both answer each topic's query.
        let html = r#"<div id="bres">
            <div><div><div><div class="VLkRKc">Pizza</div></div></div><a title="Alpha">a</a></div>
            <div><div><div><div class="VLkRKc">Pizza</div></div></div><a title="Gamma">g</a></div>
        </div>"#;
        let document = HtmlDocument::parse(html);
        let rules = RuleSet {
            rules: vec![RuleSet::google_web().rules.remove(9)],
            ..RuleSet::google_web()
        };

        let doc = extract(&document, &rules);

        assert_eq!(doc.names(), ["Other Topics - Pizza", "Other Topics - Pizza"]);
        for set in &doc {
            assert_eq!(set.values().collect::<Vec<_>>(), ["Alpha", "Gamma"]);
        }
    }
}
