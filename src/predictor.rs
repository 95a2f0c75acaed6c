use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::features::{email, FeatureExtractor, FeatureMap};
use crate::model::ModelArtifact;

/// How many nested URL verdicts an email verdict carries for inspection.
const MAX_REPORTED_URLS: usize = 3;

/// Classifier verdict for a single URL. `confidence` is the probability of
/// the *predicted* label, so it always lands in [0.5, 1.0].
#[derive(Debug, Clone, Serialize)]
pub struct UrlVerdict {
    pub url: String,
    pub is_phishing: bool,
    pub confidence: f64,
    pub features: FeatureMap,
    /// Set when content features fell back to defaults (fetch failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_degraded: Option<String>,
}

/// Fused verdict for an email: rule-based content score blended with the
/// classifier verdicts of embedded URLs.
#[derive(Debug, Clone, Serialize)]
pub struct EmailVerdict {
    pub subject: String,
    pub sender: String,
    pub is_phishing: bool,
    pub confidence: f64,
    pub features: FeatureMap,
    pub analyzed_urls: Vec<UrlVerdict>,
}

/// Serving-side scorer. Constructed from an already-trained artifact: there
/// is no lazy loading and no train-on-first-request, so a missing artifact
/// fails at startup rather than mid-request. The artifact is read-only for
/// the life of the predictor, making concurrent predictions safe.
pub struct Predictor {
    artifact: ModelArtifact,
    extractor: FeatureExtractor,
}

impl Predictor {
    pub fn new(artifact: ModelArtifact, extractor: FeatureExtractor) -> Self {
        Self {
            artifact,
            extractor,
        }
    }

    /// Fail-fast constructor: not-found error when no artifact exists at
    /// `path`.
    pub fn from_artifact_path(path: &Path, extractor: FeatureExtractor) -> Result<Self> {
        Ok(Self::new(ModelArtifact::load(path)?, extractor))
    }

    /// Score one URL: extract, scale, classify, and express confidence as
    /// certainty in the predicted class.
    pub fn predict_url(&self, url: &str, fetch_content: bool) -> UrlVerdict {
        let extracted = self.extractor.extract(url, fetch_content);
        let (is_phishing, proba) = self.artifact.predict(&extracted.vector);
        let confidence = if is_phishing { proba } else { 1.0 - proba };

        UrlVerdict {
            url: url.to_string(),
            is_phishing,
            confidence,
            features: extracted.map,
            content_degraded: extracted.degraded,
        }
    }

    /// Score an email by blending content heuristics with the verdicts of
    /// its embedded URLs.
    ///
    /// `content_score` is the fraction of five binary indicators that fired.
    /// With at least one scored URL the result is the mean of content score
    /// and the top URL's confidence, with a phishing override when the top
    /// URL itself was classified phishing; without URLs the content score
    /// decides alone against a 0.4 threshold.
    pub fn predict_email(&self, subject: &str, sender: &str, body: &str) -> EmailVerdict {
        let features = self
            .extractor
            .extract_email_features(subject, sender, body);

        let mut url_verdicts: Vec<UrlVerdict> = email::extract_urls(body)
            .iter()
            .map(|url| self.predict_url(url, false))
            .collect();
        url_verdicts.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let indicators = [
            "subject_has_urgent_words",
            "sender_has_domain_mismatch",
            "body_has_suspicious_links",
            "body_has_urgent_language",
            "body_requests_sensitive_info",
        ];
        let fired = indicators
            .iter()
            .filter(|name| features.get(**name).copied().unwrap_or(0.0) == 1.0)
            .count();
        let content_score = fired as f64 / indicators.len() as f64;

        let (is_phishing, confidence) = match url_verdicts.first() {
            Some(top) => {
                let combined = (content_score + top.confidence) / 2.0;
                // A single high-confidence malicious link is enough even
                // when the content signals are weak.
                (combined > 0.5 || top.is_phishing, combined)
            }
            None => (content_score > 0.4, content_score),
        };

        url_verdicts.truncate(MAX_REPORTED_URLS);

        EmailVerdict {
            subject: subject.to_string(),
            sender: sender.to_string(),
            is_phishing,
            confidence,
            features,
            analyzed_urls: url_verdicts,
        }
    }
}
