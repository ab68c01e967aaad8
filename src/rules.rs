//! Rule catalogs
//!
//! A [`RuleSet`] is plain configuration: an ordered list of
//! [`ExtractionRule`]s for one page type plus the link markers of its search
//! engine. Supporting a new result category means appending one rule.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::extractors::SanitizerConfig;
use crate::locator::{Locator, LocatorTemplate};
use crate::model::ContainerKind;

/// One result category on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExtractionRule {
    /// Matched anchors' `href`s, sanitized.
    Links {
        label: String,
        container: ContainerKind,
        query: Locator,
    },
    /// Matched text nodes, reconstructed into phrases.
    Text {
        label: String,
        container: ContainerKind,
        query: Locator,
    },
    /// One result set per matched topic node, holding the text matched by
    /// `derived` with the topic substituted in.
    DerivedText {
        label: String,
        container: ContainerKind,
        query: Locator,
        derived: LocatorTemplate,
    },
}

impl ExtractionRule {
    pub fn links(label: &str, container: ContainerKind, query: &str) -> Self {
        Self::Links {
            label: label.to_string(),
            container,
            query: Locator::new(query),
        }
    }

    pub fn text(label: &str, container: ContainerKind, query: &str) -> Self {
        Self::Text {
            label: label.to_string(),
            container,
            query: Locator::new(query),
        }
    }

    pub fn derived_text(
        label: &str,
        container: ContainerKind,
        query: &str,
        derived: LocatorTemplate,
    ) -> Self {
        Self::DerivedText {
            label: label.to_string(),
            container,
            query: Locator::new(query),
            derived,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Links { label, .. } | Self::Text { label, .. } | Self::DerivedText { label, .. } => {
                label
            }
        }
    }

    pub fn container(&self) -> ContainerKind {
        match self {
            Self::Links { container, .. }
            | Self::Text { container, .. }
            | Self::DerivedText { container, .. } => *container,
        }
    }

    pub fn query(&self) -> &Locator {
        match self {
            Self::Links { query, .. } | Self::Text { query, .. } | Self::DerivedText { query, .. } => {
                query
            }
        }
    }
}

/// The rules for one page type of one search engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    /// Engine name used in export file names, e.g. `google`.
    pub engine: String,
    pub sanitizer: SanitizerConfig,
    pub rules: Vec<ExtractionRule>,
}

impl RuleSet {
    /// Google web search results.
    pub fn google_web() -> Self {
        use ContainerKind::{Ordered, Unordered};

        Self {
            name: "Google Web".to_string(),
            engine: "google".to_string(),
            sanitizer: SanitizerConfig::google(),
            rules: vec![
                ExtractionRule::links(
                    "Top Ads",
                    Unordered,
                    "//div[@id='tads']//li[@class='ads-ad']//div[@class='ad_cclk']/a[not(@style)]",
                ),
                ExtractionRule::links("Videos", Unordered, "//h3[text()='Videos']/../..//a"),
                ExtractionRule::text(
                    "People Also Ask",
                    Unordered,
                    "//h2[text()='People also ask']/../..//div[contains(@class, 'match-mod-horizontal-padding hide-focus-ring')]/text()",
                ),
                ExtractionRule::links(
                    "Snippet",
                    Unordered,
                    "//div[@class='g mnr-c g-blk' and .//a[normalize-space(text())='About Featured Snippets']]//div[@class='r']/a",
                ),
                ExtractionRule::links(
                    "Right Side Box",
                    Unordered,
                    "//div/h1[text()='Complementary Results']/..//a",
                ),
                ExtractionRule::links(
                    "Map",
                    Unordered,
                    "//h2[text()='Local Results']/..//div[text()='Website']/../..",
                ),
                ExtractionRule::links(
                    "Organic Results",
                    Ordered,
                    "//div[@id='search']//div[@class='rc']//a",
                ),
                ExtractionRule::links(
                    "Bottom Ads",
                    Unordered,
                    "//div[@id='bottomads']//li[@class='ads-ad']//div[@class='ad_cclk']/a[not(contains(@style,'display:none'))]",
                ),
                ExtractionRule::text(
                    "Related Search",
                    Unordered,
                    "//div[text()='Related search']/../div//a//div[contains(@class, 'ellip')]//text()",
                ),
                ExtractionRule::derived_text(
                    "Other Topics",
                    Unordered,
                    "//div[@id='bres']//div[@class='VLkRKc']//text()",
                    LocatorTemplate::from_parts(
                        "//div[@class='VLkRKc' and text()=",
                        "]/../../..//a[@title]/@title",
                    ),
                ),
                ExtractionRule::text(
                    "Searches Related To",
                    Unordered,
                    "//div[@class='brs_col']//a//text()",
                ),
            ],
        }
    }

    /// Bing web results: the first link of each result heading.
    pub fn bing_web() -> Self {
        Self {
            name: "Bing Web".to_string(),
            engine: "bing".to_string(),
            sanitizer: SanitizerConfig::bing(),
            rules: vec![ExtractionRule::links(
                "Organic Results",
                ContainerKind::Ordered,
                "//*[@id='results']//li/descendant::h3[1]/descendant::a[1]",
            )],
        }
    }

    /// Ask web results.
    pub fn ask_web() -> Self {
        Self {
            name: "Ask Web".to_string(),
            engine: "ask".to_string(),
            sanitizer: SanitizerConfig::ask(),
            rules: vec![ExtractionRule::links(
                "Organic Results",
                ContainerKind::Ordered,
                "//a[contains(concat(' ', normalize-space(@class), ' '), ' result-link ')]",
            )],
        }
    }

    /// Yahoo web results. Result anchors are click-tracking redirects, so the
    /// sanitizer unwraps them.
    pub fn yahoo_web() -> Self {
        Self {
            name: "Yahoo Web".to_string(),
            engine: "yahoo".to_string(),
            sanitizer: SanitizerConfig::yahoo(),
            rules: vec![ExtractionRule::links(
                "Organic Results",
                ContainerKind::Ordered,
                "//a[contains(concat(' ', normalize-space(@class), ' '), ' ac-algo ')]",
            )],
        }
    }

    /// The built-in catalog for the page at `page_url`, if there is one.
    ///
    /// Google search verticals (`tbm=isch`, `tbm=nws`, ...) have no catalog.
    pub fn for_page_url(page_url: &str) -> Option<Self> {
        let url = Url::parse(page_url).ok()?;
        let host = url.host_str()?;
        let path = url.path();

        if host_is(host, "google.com") && path.starts_with("/search") {
            if url.query_pairs().any(|(key, _)| key == "tbm") {
                return None;
            }
            return Some(Self::google_web());
        }
        if host_is(host, "bing.com") {
            return Some(Self::bing_web());
        }
        if host_is(host, "ask.com") && path.starts_with("/web") {
            return Some(Self::ask_web());
        }
        if host_is(host, "yahoo.com") && path.starts_with("/search") {
            return Some(Self::yahoo_web());
        }
        None
    }

    /// Load a custom catalog.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn host_is(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|sub| sub.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_google_catalog_order() {
        let rules = RuleSet::google_web();
        let labels: Vec<&str> = rules.rules.iter().map(ExtractionRule::label).collect();
        assert_eq!(
            labels,
            [
                "Top Ads",
                "Videos",
                "People Also Ask",
                "Snippet",
                "Right Side Box",
                "Map",
                "Organic Results",
                "Bottom Ads",
                "Related Search",
                "Other Topics",
                "Searches Related To",
            ]
        );
        assert_eq!(rules.rules[6].container(), ContainerKind::Ordered);
        assert_eq!(rules.engine, "google");
    }

    #[test]
    fn test_builtin_locators_compile() {
        for rules in [
            RuleSet::google_web(),
            RuleSet::bing_web(),
            RuleSet::ask_web(),
            RuleSet::yahoo_web(),
        ] {
            for rule in &rules.rules {
                rule.query()
                    .compile()
                    .unwrap_or_else(|e| panic!("{}: {e}", rule.label()));
                if let ExtractionRule::DerivedText { derived, .. } = rule {
                    derived.substitute("it's \"quoted\"").compile().unwrap();
                }
            }
        }
    }

    #[test]
    fn test_other_topics_template() {
        let rules = RuleSet::google_web();
        let Some(ExtractionRule::DerivedText { derived, .. }) = rules.rules.get(9) else {
            panic!("Other Topics should be derived");
        };
        assert_eq!(
            derived.source(),
            "//div[@class='VLkRKc' and text()={{text}}]/../../..//a[@title]/@title"
        );
        assert_eq!(
            derived.substitute("Topic A").as_str(),
            "//div[@class='VLkRKc' and text()='Topic A']/../../..//a[@title]/@title"
        );
    }

    #[test]
    fn test_page_detection() {
        let pick = |url: &str| RuleSet::for_page_url(url).map(|rules| rules.engine);

        assert_eq!(pick("https://www.google.com/search?q=pizza").as_deref(), Some("google"));
        assert_eq!(pick("https://www.google.com/search?q=pizza&tbm=isch"), None);
        assert_eq!(pick("https://www.google.com/maps?q=pizza"), None);
        assert_eq!(pick("http://www.bing.com/search?q=pizza").as_deref(), Some("bing"));
        assert_eq!(pick("https://www.ask.com/web?q=pizza").as_deref(), Some("ask"));
        assert_eq!(pick("https://www.ask.com/news?q=pizza"), None);
        assert_eq!(pick("https://search.yahoo.com/search?p=pizza").as_deref(), Some("yahoo"));
        assert_eq!(pick("https://uk.search.yahoo.com/search;_ylt=x?p=pizza").as_deref(), Some("yahoo"));
        assert_eq!(pick("https://news.yahoo.com/weather"), None);
        assert_eq!(pick("https://notgoogle.com/search?q=x"), None);
        assert_eq!(pick("not a url"), None);
    }

    #[test]
    fn test_rule_set_from_json() {
        let json = r#"{
            "name": "Custom",
            "engine": "google",
            "sanitizer": {
                "own_domain_marker": ".google.com",
                "ad_service_marker": ".googleadservices.com",
                "asset_host_marker": ".googleusercontent.com"
            },
            "rules": [
                {"mode": "links", "label": "Organic", "container": "ol", "query": "//div[@id='search']//a"},
                {"mode": "text", "label": "Related", "container": "unordered", "query": "//p/text()"},
                {
                    "mode": "derived_text",
                    "label": "Topics",
                    "container": "ul",
                    "query": "//h3/text()",
                    "derived": "//h3[text()='{{text}}']/..//a/@title"
                }
            ]
        }"#;

        let rules = RuleSet::from_json(json).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules.sanitizer, SanitizerConfig::google());
        assert_eq!(
            rules.rules[0],
            ExtractionRule::links("Organic", ContainerKind::Ordered, "//div[@id='search']//a")
        );
        assert_eq!(
            rules.rules[2],
            ExtractionRule::derived_text(
                "Topics",
                ContainerKind::Unordered,
                "//h3/text()",
                LocatorTemplate::new("//h3[text()={{text}}]/..//a/@title").unwrap(),
            )
        );
    }

    #[test]
    fn test_rule_set_from_json_rejects_bad_templates() {
        let json = r#"{
            "name": "Broken",
            "engine": "google",
            "sanitizer": {"own_domain_marker": "a", "ad_service_marker": "b", "asset_host_marker": "c"},
            "rules": [{"mode": "derived_text", "label": "T", "container": "ul", "query": "//a", "derived": "//a"}]
        }"#;

        let err = RuleSet::from_json(json).unwrap_err();
        assert!(err.to_string().contains("{{text}}"), "{err}");
    }

    #[test]
    fn test_rule_set_round_trips_through_json() {
        let rules = RuleSet::google_web();
        let json = serde_json::to_string(&rules).unwrap();
        assert_eq!(RuleSet::from_json(&json).unwrap(), rules);
    }
}
