pub mod content;
pub mod email;
pub mod url;

use std::collections::BTreeMap;

use crate::domain_age::{DomainAgeOracle, FixedDomainAge};
use crate::domain_utils::DomainUtils;
use crate::fetcher::{ContentFetcher, FetchError, HttpContentFetcher, NoFetch};
use content::ContentFeatures;

/// Canonical feature order consumed by the classifier. Training vectors and
/// inference vectors are both projected through this list; reordering it
/// invalidates every previously trained artifact.
pub const FEATURE_NAMES: [&str; 20] = [
    // URL-based features
    "url_length",
    "num_digits",
    "num_special_chars",
    "has_ip_address",
    "has_at_symbol",
    "has_double_slash",
    "domain_length",
    "num_subdomains",
    "has_https",
    "domain_age_days",
    "has_suspicious_tld",
    // Content-based features
    "has_login_form",
    "num_external_links",
    "num_iframes",
    "has_password_field",
    "form_to_link_ratio",
    "has_favicon",
    "has_suspicious_title",
    "has_misspelled_domains",
    "has_hidden_elements",
];

/// Sparse name -> value mapping used for inspection and storage.
pub type FeatureMap = BTreeMap<String, f64>;

/// Project a sparse mapping onto the canonical dense vector. The only place
/// missing-feature defaults (0.0) are injected.
pub fn project(map: &FeatureMap) -> Vec<f64> {
    FEATURE_NAMES
        .iter()
        .map(|name| map.get(*name).copied().unwrap_or(0.0))
        .collect()
}

/// Full extraction result for a URL: the dense model input, the complete
/// mapping for storage, and the degradation reason when content features
/// fell back to defaults.
#[derive(Debug, Clone)]
pub struct UrlFeatures {
    pub vector: Vec<f64>,
    pub map: FeatureMap,
    pub degraded: Option<String>,
}

/// Stateless feature extraction facade. The fetcher and domain-age oracle are
/// injected so training, serving and tests can share the same extraction code
/// with different collaborators.
pub struct FeatureExtractor {
    fetcher: Box<dyn ContentFetcher>,
    domain_age: Box<dyn DomainAgeOracle>,
}

impl FeatureExtractor {
    pub fn new(fetcher: Box<dyn ContentFetcher>, domain_age: Box<dyn DomainAgeOracle>) -> Self {
        Self {
            fetcher,
            domain_age,
        }
    }

    /// Extractor with content fetching disabled; every content feature comes
    /// out as its documented default. Used for batch training extraction.
    pub fn offline() -> Self {
        Self::new(Box::new(NoFetch), Box::new(FixedDomainAge::default()))
    }

    /// Extractor backed by a real HTTP fetcher.
    pub fn over_http(timeout_secs: u64, user_agent: &str) -> Result<Self, FetchError> {
        Ok(Self::new(
            Box::new(HttpContentFetcher::new(timeout_secs, user_agent)?),
            Box::new(FixedDomainAge::default()),
        ))
    }

    /// Lexical/structural features computed purely from the URL string,
    /// plus the oracle-supplied domain age. Never fails, even on malformed
    /// input.
    pub fn extract_url_features(&self, url: &str) -> FeatureMap {
        let mut map = url::lexical_features(url);
        let registered = DomainUtils::extract(url).registered();
        map.insert(
            "domain_age_days".to_string(),
            self.domain_age.age_days(&registered),
        );
        map
    }

    /// URL features merged with content features (fetched, or defaults when
    /// `fetch_content` is false), projected onto the canonical vector.
    pub fn extract(&self, url: &str, fetch_content: bool) -> UrlFeatures {
        let mut map = self.extract_url_features(url);

        let (content_map, degraded) = if fetch_content {
            match content::extract(url, self.fetcher.as_ref()) {
                ContentFeatures::Extracted(features) => (features, None),
                ContentFeatures::Degraded { features, reason } => (features, Some(reason)),
            }
        } else {
            (content::default_content_features(), None)
        };
        map.extend(content_map);

        let vector = project(&map);
        UrlFeatures {
            vector,
            map,
            degraded,
        }
    }

    /// Email header/body heuristics. These feed the rule-based email blend,
    /// not the trained classifier, so no dense projection exists for them.
    pub fn extract_email_features(&self, subject: &str, sender: &str, body: &str) -> FeatureMap {
        email::extract_email_features(subject, sender, body)
    }
}
