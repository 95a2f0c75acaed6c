use std::sync::OnceLock;

use regex::Regex;

use crate::features::content::POPULAR_BRANDS;
use crate::features::{url, FeatureMap};

const URGENT_SUBJECT_WORDS: &[&str] = &[
    "urgent", "immediate", "alert", "verify", "suspended", "restricted", "warning",
];

const URGENT_BODY_PHRASES: &[&str] = &[
    "account suspended",
    "verify your account",
    "security alert",
    "unauthorized access",
    "limited time",
    "act now",
    "click here",
];

const SENSITIVE_INFO_PHRASES: &[&str] = &[
    "password",
    "credit card",
    "update your information",
    "confirm your details",
    "social security",
    "bank account",
    "click the link",
];

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://(?:[-\w.]|%[\da-fA-F]{2})+").unwrap())
}

/// Pull every embedded URL out of an email body.
pub fn extract_urls(body: &str) -> Vec<String> {
    url_regex()
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Email header and body heuristics. All values are numeric so they share the
/// `FeatureMap` shape with URL features, but this set is disjoint from the
/// classifier's canonical list: it feeds the rule-based email blend only.
pub fn extract_email_features(subject: &str, sender: &str, body: &str) -> FeatureMap {
    let mut features = FeatureMap::new();

    let subject_lower = subject.to_lowercase();
    features.insert(
        "subject_length".to_string(),
        subject.chars().count() as f64,
    );
    features.insert(
        "subject_has_urgent_words".to_string(),
        flag(URGENT_SUBJECT_WORDS
            .iter()
            .any(|word| subject_lower.contains(word))),
    );

    features.insert(
        "sender_has_domain_mismatch".to_string(),
        flag(sender_domain_mismatch(sender)),
    );

    let body_lower = body.to_lowercase();
    features.insert("body_length".to_string(), body.chars().count() as f64);

    let urls = extract_urls(body);
    features.insert("num_links".to_string(), urls.len() as f64);
    features.insert(
        "body_has_suspicious_links".to_string(),
        flag(urls.iter().any(|u| url::looks_suspicious(u))),
    );

    features.insert(
        "body_has_html".to_string(),
        flag(body_lower.contains("<html") || body_lower.contains("<body")),
    );
    features.insert(
        "body_has_urgent_language".to_string(),
        flag(URGENT_BODY_PHRASES
            .iter()
            .any(|phrase| body_lower.contains(phrase))),
    );
    features.insert(
        "body_has_attachments".to_string(),
        flag(body.contains("Content-Disposition: attachment")),
    );
    features.insert(
        "body_requests_sensitive_info".to_string(),
        flag(SENSITIVE_INFO_PHRASES
            .iter()
            .any(|phrase| body_lower.contains(phrase))),
    );

    features
}

/// Display-name vs address-domain mismatch against popular brand names.
/// Only triggers on the `"Display Name <addr@domain>"` form: a brand in the
/// display name whose address domain does not mention the brand.
fn sender_domain_mismatch(sender: &str) -> bool {
    if !sender.contains('@') {
        return false;
    }

    let (display_name, address) = match sender.split_once('<') {
        Some((name, rest)) => {
            let address = rest.split('>').next().unwrap_or(rest);
            (name.trim(), address)
        }
        None => ("", sender),
    };

    if display_name.is_empty() {
        return false;
    }
    let Some((_, email_domain)) = address.split_once('@') else {
        return false;
    };
    let email_domain = email_domain.to_lowercase();
    let display_filtered: String = display_name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '.')
        .collect::<String>()
        .to_lowercase();

    POPULAR_BRANDS
        .iter()
        .any(|brand| display_filtered.contains(brand) && !email_domain.contains(brand))
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

    #[test]
    fn test_urgent_subject() {
        let features = extract_email_features("Urgent: Verify Account", "a@b.com", "hello");
        assert_eq!(features["subject_has_urgent_words"], 1.0);
        assert_eq!(features["subject_length"], 22.0);

        let features = extract_email_features("Lunch on Friday?", "a@b.com", "hello");
        assert_eq!(features["subject_has_urgent_words"], 0.0);
    }

    #[test]
    fn test_sender_mismatch_requires_display_name() {
        // Brand in the display name, address elsewhere: mismatch.
        let features =
            extract_email_features("hi", "PayPal Support <help@secure-pay.ru>", "hello");
        assert_eq!(features["sender_has_domain_mismatch"], 1.0);

        // Brand display name with a matching address domain: no mismatch.
        let features =
            extract_email_features("hi", "PayPal Support <help@paypal.com>", "hello");
        assert_eq!(features["sender_has_domain_mismatch"], 0.0);

        // Bare address, no display name: heuristic never triggers.
        let features = extract_email_features("hi", "security@phishing.com", "hello");
        assert_eq!(features["sender_has_domain_mismatch"], 0.0);
    }

    #[test]
    fn test_embedded_url_extraction() {
        let urls = extract_urls("go to http://174.129.35.134/login click here now");
        // The character class stops at the path separator.
        assert_eq!(urls, vec!["http://174.129.35.134".to_string()]);

        let urls = extract_urls("a https://example.com and b http://test.org/x");
        assert_eq!(urls.len(), 2);
    }

    #[test]
    fn test_suspicious_link_via_ip_literal() {
        let features = extract_email_features(
            "Urgent: Verify Account",
            "security@phishing.com",
            "http://174.129.35.134/login click here now",
        );
        assert_eq!(features["num_links"], 1.0);
        assert_eq!(features["body_has_suspicious_links"], 1.0);
        assert_eq!(features["body_has_urgent_language"], 1.0); // "click here"
    }

    #[test]
    fn test_html_attachment_and_sensitive_flags() {
        let body = "<html><body>Please confirm your details.\n\
                    Content-Disposition: attachment</body></html>";
        let features = extract_email_features("report", "a@b.com", body);
        assert_eq!(features["body_has_html"], 1.0);
        assert_eq!(features["body_has_attachments"], 1.0);
        assert_eq!(features["body_requests_sensitive_info"], 1.0);
    }

    #[test]
    fn test_clean_email_has_no_flags() {
        let features = extract_email_features(
            "meeting notes",
            "colleague@company.com",
            "see you tomorrow at 10",
        );
        assert_eq!(features["subject_has_urgent_words"], 0.0);
        assert_eq!(features["body_has_suspicious_links"], 0.0);
        assert_eq!(features["body_has_urgent_language"], 0.0);
        assert_eq!(features["body_requests_sensitive_info"], 0.0);
        assert_eq!(features["num_links"], 0.0);
    }
}
