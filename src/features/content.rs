use scraper::{Html, Selector};

use crate::domain_utils::DomainUtils;
use crate::features::FeatureMap;
use crate::fetcher::ContentFetcher;

const LOGIN_KEYWORDS: &[&str] = &[
    "login", "signin", "sign in", "sign-in", "log in", "log-in", "authenticate",
];

const SUSPICIOUS_TITLE_KEYWORDS: &[&str] = &[
    "login", "sign in", "verify", "secure", "account", "update", "confirm",
];

/// Brand names probed by the misspelling heuristic. Containment without
/// equality is treated as a typosquat signal; this is a coarse placeholder,
/// not an edit-distance comparison, and trained artifacts depend on it
/// staying that way.
pub const POPULAR_BRANDS: &[&str] = &[
    "google", "facebook", "apple", "amazon", "microsoft", "paypal", "netflix",
];

/// Content-feature extraction outcome. Fetch or parse trouble produces
/// `Degraded` with the documented defaults instead of an error, so a page
/// that refuses to load can still be scored from its URL alone.
#[derive(Debug, Clone)]
pub enum ContentFeatures {
    Extracted(FeatureMap),
    Degraded { features: FeatureMap, reason: String },
}

impl ContentFeatures {
    pub fn features(&self) -> &FeatureMap {
        match self {
            ContentFeatures::Extracted(features) => features,
            ContentFeatures::Degraded { features, .. } => features,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ContentFeatures::Degraded { .. })
    }
}

/// Defaults substituted when the page cannot be fetched or content analysis
/// is disabled. Favicon defaults to present: most legitimate sites have one,
/// so absence stays an affirmative signal.
pub fn default_content_features() -> FeatureMap {
    let mut features = FeatureMap::new();
    features.insert("has_login_form".to_string(), 0.0);
    features.insert("num_external_links".to_string(), 0.0);
    features.insert("num_iframes".to_string(), 0.0);
    features.insert("has_password_field".to_string(), 0.0);
    features.insert("form_to_link_ratio".to_string(), 0.0);
    features.insert("has_favicon".to_string(), 1.0);
    features.insert("has_suspicious_title".to_string(), 0.0);
    features.insert("has_misspelled_domains".to_string(), 0.0);
    features.insert("has_hidden_elements".to_string(), 0.0);
    features
}

/// Fetch the page and compute DOM-derived features. Any fetch failure is
/// absorbed into a `Degraded` result.
pub fn extract(url: &str, fetcher: &dyn ContentFetcher) -> ContentFeatures {
    match fetcher.fetch(url) {
        Ok(html) => ContentFeatures::Extracted(extract_from_html(url, &html)),
        Err(e) => {
            log::debug!("content features degraded for {}: {}", url, e);
            ContentFeatures::Degraded {
                features: default_content_features(),
                reason: e.to_string(),
            }
        }
    }
}

/// Compute content features from already-fetched HTML.
pub fn extract_from_html(url: &str, html: &str) -> FeatureMap {
    let document = Html::parse_document(html);
    let mut features = FeatureMap::new();

    let form_sel = Selector::parse("form").unwrap();
    let link_sel = Selector::parse("a[href]").unwrap();
    let iframe_sel = Selector::parse("iframe").unwrap();
    let password_sel = Selector::parse(r#"input[type="password"]"#).unwrap();
    let favicon_sel = Selector::parse("link[rel]").unwrap();
    let title_sel = Selector::parse("title").unwrap();
    let styled_sel = Selector::parse("[style]").unwrap();
    let hidden_sel = Selector::parse("[hidden]").unwrap();

    // Login form: any form whose markup mentions a login keyword.
    let forms: Vec<_> = document.select(&form_sel).collect();
    let has_login_form = forms.iter().any(|form| {
        let markup = form.html().to_lowercase();
        LOGIN_KEYWORDS.iter().any(|kw| markup.contains(kw))
    });
    features.insert("has_login_form".to_string(), flag(has_login_form));

    // External links: absolute links whose registrable domain differs from
    // the page's own.
    let base_domain = DomainUtils::extract(url).registered();
    let links: Vec<_> = document.select(&link_sel).collect();
    let external_links = links
        .iter()
        .filter_map(|link| link.value().attr("href"))
        .filter(|href| href.starts_with("http"))
        .filter(|href| DomainUtils::extract(href).registered() != base_domain)
        .count();
    features.insert("num_external_links".to_string(), external_links as f64);

    features.insert(
        "num_iframes".to_string(),
        document.select(&iframe_sel).count() as f64,
    );

    features.insert(
        "has_password_field".to_string(),
        flag(document.select(&password_sel).next().is_some()),
    );

    let ratio = if links.is_empty() {
        0.0
    } else {
        forms.len() as f64 / links.len() as f64
    };
    features.insert("form_to_link_ratio".to_string(), ratio);

    let has_favicon = document
        .select(&favicon_sel)
        .filter_map(|link| link.value().attr("rel"))
        .any(|rel| rel.to_lowercase().contains("icon"));
    features.insert("has_favicon".to_string(), flag(has_favicon));

    let title = document
        .select(&title_sel)
        .next()
        .map(|t| t.text().collect::<String>().to_lowercase())
        .unwrap_or_default();
    let has_suspicious_title = SUSPICIOUS_TITLE_KEYWORDS
        .iter()
        .any(|kw| title.contains(kw));
    features.insert(
        "has_suspicious_title".to_string(),
        flag(has_suspicious_title),
    );

    let page_domain = DomainUtils::extract(url).domain.to_lowercase();
    let has_misspelled = POPULAR_BRANDS.iter().any(|brand| {
        *brand != page_domain
            && page_domain.contains(brand)
            && brand.len() > 4
            && page_domain.len() > 4
    });
    features.insert("has_misspelled_domains".to_string(), flag(has_misspelled));

    let hidden_by_style = document
        .select(&styled_sel)
        .filter_map(|el| el.value().attr("style"))
        .map(|style| style.to_lowercase())
        .any(|style| style.contains("display:none") || style.contains("visibility:hidden"));
    let hidden_by_attr = document.select(&hidden_sel).next().is_some();
    features.insert(
        "has_hidden_elements".to_string(),
        flag(hidden_by_style || hidden_by_attr),
    );

    features
}

fn flag(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchError;

    struct StaticFetcher(&'static str);

    impl ContentFetcher for StaticFetcher {
        fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingFetcher;

    impl ContentFetcher for FailingFetcher {
        fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            Err(FetchError("connection refused".to_string()))
        }
    }

    const LOGIN_PAGE: &str = r#"
        <html>
        <head>
            <title>Secure Account Login</title>
            <link rel="shortcut icon" href="/favicon.ico">
        </head>
        <body>
            <form action="/login">
                <input type="text" name="user">
                <input type="password" name="pass">
            </form>
            <a href="http://other-site.com/a">external</a>
            <a href="https://example.com/internal">internal</a>
            <iframe src="http://tracker.net/frame"></iframe>
            <div style="display:none">cloaked</div>
        </body>
        </html>
    "#;

    #[test]
    fn test_login_page_features() {
        let features = extract_from_html("https://example.com", LOGIN_PAGE);
        assert_eq!(features["has_login_form"], 1.0);
        assert_eq!(features["has_password_field"], 1.0);
        assert_eq!(features["num_external_links"], 1.0);
        assert_eq!(features["num_iframes"], 1.0);
        assert_eq!(features["form_to_link_ratio"], 0.5);
        assert_eq!(features["has_favicon"], 1.0);
        assert_eq!(features["has_suspicious_title"], 1.0);
        assert_eq!(features["has_hidden_elements"], 1.0);
    }

    #[test]
    fn test_empty_page_features() {
        let features = extract_from_html("https://example.com", "<html><body></body></html>");
        assert_eq!(features["has_login_form"], 0.0);
        assert_eq!(features["num_external_links"], 0.0);
        assert_eq!(features["form_to_link_ratio"], 0.0);
        assert_eq!(features["has_favicon"], 0.0);
        assert_eq!(features["has_hidden_elements"], 0.0);
    }

    #[test]
    fn test_misspelled_brand_domain() {
        let features = extract_from_html("http://paypal-secure.com", "<html></html>");
        assert_eq!(features["has_misspelled_domains"], 1.0);

        // The real brand domain is an exact match, not a misspelling.
        let features = extract_from_html("https://www.paypal.com", "<html></html>");
        assert_eq!(features["has_misspelled_domains"], 0.0);
    }

    #[test]
    fn test_hidden_attribute_detected() {
        let html = r#"<html><body><div hidden>x</div></body></html>"#;
        let features = extract_from_html("https://example.com", html);
        assert_eq!(features["has_hidden_elements"], 1.0);
    }

    #[test]
    fn test_fetch_failure_degrades_to_defaults() {
        let outcome = extract("https://unreachable.example", &FailingFetcher);
        assert!(outcome.is_degraded());
        assert_eq!(outcome.features()["has_favicon"], 1.0);
        assert_eq!(outcome.features()["has_login_form"], 0.0);
    }

    #[test]
    fn test_successful_fetch_is_not_degraded() {
        let outcome = extract("https://example.com", &StaticFetcher(LOGIN_PAGE));
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.features()["has_password_field"], 1.0);
    }
}
