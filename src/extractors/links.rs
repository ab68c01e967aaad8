//! Result link sanitization
//!
//! Turns the `href`s of matched anchors into absolute external result URLs,
//! dropping the search engine's own chrome and asset links.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A click-tracking redirect carrying the destination in its `RU=` segment.
static REDIRECT_TARGET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)RU=(http.*?)/RK").ok());

/// Substrings that classify an `href` for one search engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizerConfig {
    /// The engine's own domain; links containing it are navigation chrome.
    pub own_domain_marker: String,
    /// The paid-ad redirect domain; such links are kept even on the own domain.
    pub ad_service_marker: String,
    /// User-content / CDN host serving page assets.
    pub asset_host_marker: String,
    /// Result anchors point at a click-tracking redirect; keep its target.
    #[serde(default)]
    pub unwrap_redirects: bool,
}

impl SanitizerConfig {
    pub fn google() -> Self {
        Self {
            own_domain_marker: ".google.com".to_string(),
            ad_service_marker: ".googleadservices.com".to_string(),
            asset_host_marker: ".googleusercontent.com".to_string(),
            unwrap_redirects: false,
        }
    }

    pub fn bing() -> Self {
        Self {
            own_domain_marker: ".bing.com".to_string(),
            ad_service_marker: "bing.com/aclk".to_string(),
            asset_host_marker: ".bing.net".to_string(),
            unwrap_redirects: false,
        }
    }

    pub fn ask() -> Self {
        Self {
            own_domain_marker: ".ask.com".to_string(),
            ad_service_marker: ".ask.com/aclk".to_string(),
            asset_host_marker: ".askcdn.com".to_string(),
            unwrap_redirects: false,
        }
    }

    pub fn yahoo() -> Self {
        Self {
            own_domain_marker: "search.yahoo.com".to_string(),
            ad_service_marker: "search.yahoo.com/cbclk".to_string(),
            asset_host_marker: ".yimg.com".to_string(),
            unwrap_redirects: true,
        }
    }

    /// Decide whether one `href` is a result link.
    ///
    /// The checks run in a fixed order: redirects are unwrapped first, then
    /// protocol-relative links are made absolute before any domain check, so
    /// a `//` ad-service link is judged on its full URL.
    pub fn classify(&self, href: Option<&str>) -> Result<String, DropReason> {
        let href = href.ok_or(DropReason::MissingHref)?;

        let href = if self.unwrap_redirects {
            let target = redirect_target(href).ok_or(DropReason::NoRedirectTarget)?;
            // Sub-results beneath a site redirect twice.
            if redirect_target(&target).is_some() {
                return Err(DropReason::NestedRedirect);
            }
            Cow::Owned(target)
        } else {
            Cow::Borrowed(href)
        };

        let href = match href.strip_prefix("//") {
            Some(rest) => format!("https://{rest}"),
            None => href.to_string(),
        };

        if href.contains(&self.asset_host_marker) {
            return Err(DropReason::AssetHost);
        }
        // Substring match: engine-hosted cache or AMP results go too.
        if href.contains(&self.own_domain_marker) && !href.contains(&self.ad_service_marker) {
            return Err(DropReason::OwnDomain);
        }
        if !href.starts_with("http") {
            return Err(DropReason::NotHttp);
        }

        Ok(href)
    }
}

/// Why an `href` was not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingHref,
    AssetHost,
    OwnDomain,
    NotHttp,
    NoRedirectTarget,
    NestedRedirect,
}

/// The percent-decoded destination of a click-tracking redirect.
fn redirect_target(href: &str) -> Option<String> {
    let pattern = REDIRECT_TARGET.as_ref()?;
    let encoded = pattern.captures(href)?.get(1)?.as_str();
    urlencoding::decode(encoded).ok().map(Cow::into_owned)
}

/// Keep the result links among `hrefs`, in order, duplicates included.
pub fn sanitize_links<I, S>(hrefs: I, config: &SanitizerConfig) -> Vec<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    hrefs
        .into_iter()
        .filter_map(|href| {
            let href = href.as_ref().map(AsRef::as_ref);
            match config.classify(href) {
                Ok(url) => Some(url),
                Err(reason) => {
                    trace!(?href, ?reason, "dropping link");
                    None
                }
            }
        })
        .collect()
}
