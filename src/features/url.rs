use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::domain_utils::DomainUtils;
use crate::features::FeatureMap;

/// TLDs disproportionately used for phishing campaigns. Membership is an
/// exact suffix match, not a substring test.
pub const SUSPICIOUS_TLDS: &[&str] = &["xyz", "top", "link", "work", "date", "ml", "gq", "ga", "cf"];

fn ipv4_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap())
}

/// Lexical and structural URL features, computed purely from the string and
/// its parsed components. Best-effort on malformed input: a URL the parser
/// rejects still yields a complete mapping.
///
/// Does not include `domain_age_days`; the extractor facade injects that from
/// its oracle.
pub fn lexical_features(url: &str) -> FeatureMap {
    let mut features = FeatureMap::new();

    features.insert("url_length".to_string(), url.chars().count() as f64);
    features.insert(
        "num_digits".to_string(),
        url.chars().filter(|c| c.is_ascii_digit()).count() as f64,
    );
    features.insert(
        "num_special_chars".to_string(),
        url.chars().filter(|c| !c.is_ascii_alphanumeric()).count() as f64,
    );
    features.insert(
        "has_ip_address".to_string(),
        flag(ipv4_regex().is_match(url)),
    );
    features.insert("has_at_symbol".to_string(), flag(url.contains('@')));
    // A second "//" past the scheme separator signals a redirect-style URL.
    // The offset counts characters, not bytes, so non-ASCII hosts are safe.
    let tail = url.char_indices().nth(8).map(|(i, _)| &url[i..]);
    features.insert(
        "has_double_slash".to_string(),
        flag(tail.is_some_and(|tail| tail.contains("//"))),
    );

    let scheme_is_https = match Url::parse(url) {
        Ok(parsed) => parsed.scheme() == "https",
        Err(_) => url.trim_start().to_lowercase().starts_with("https:"),
    };
    features.insert("has_https".to_string(), flag(scheme_is_https));

    let parts = DomainUtils::extract(url);
    features.insert("domain_length".to_string(), parts.domain.chars().count() as f64);
    features.insert(
        "num_subdomains".to_string(),
        parts.subdomain_count() as f64,
    );
    features.insert(
        "has_suspicious_tld".to_string(),
        flag(SUSPICIOUS_TLDS.contains(&parts.suffix.as_str())),
    );

    features
}

/// True when the URL trips either of the cheap malice signals reused by the
/// email heuristics: an embedded IPv4 literal or a deny-listed TLD.
pub fn looks_suspicious(url: &str) -> bool {
    let features = lexical_features(url);
    features["has_ip_address"] == 1.0 || features["has_suspicious_tld"] == 1.0
}

fn flag(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}
