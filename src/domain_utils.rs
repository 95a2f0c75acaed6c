use url::Url;

/// A hostname split into subdomain labels, the registrable label, and the
/// public suffix, e.g. `login.secure.example.co.uk` ->
/// `{ subdomain: "login.secure", domain: "example", suffix: "co.uk" }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainParts {
    pub subdomain: String,
    pub domain: String,
    pub suffix: String,
}

impl DomainParts {
    /// Registrable domain as `domain.suffix` (just `domain` for IP literals
    /// and single-label hosts).
    pub fn registered(&self) -> String {
        if self.suffix.is_empty() {
            self.domain.clone()
        } else {
            format!("{}.{}", self.domain, self.suffix)
        }
    }

    /// Number of subdomain labels (`www.mail` -> 2, none -> 0).
    pub fn subdomain_count(&self) -> usize {
        if self.subdomain.is_empty() {
            0
        } else {
            self.subdomain.split('.').count()
        }
    }
}

/// Two-level public suffixes that must not be mistaken for a registrable
/// label. Deliberately small; unlisted multi-part suffixes degrade to a
/// single-label suffix, which the feature heuristics tolerate.
const TWO_LEVEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "co.jp", "ne.jp", "or.jp", "com.au", "net.au",
    "org.au", "co.nz", "com.br", "com.cn", "com.mx", "com.ar", "co.in", "co.za", "com.tr",
    "com.tw", "co.kr", "com.sg", "com.hk",
];

pub struct DomainUtils;

impl DomainUtils {
    /// Best-effort hostname recovery from a raw URL string. Never fails:
    /// scheme-less input is retried with an `http://` prefix, and anything
    /// the URL parser still rejects falls back to manual slicing.
    pub fn host_of(url: &str) -> String {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                return host.to_lowercase();
            }
        }
        if !url.contains("://") {
            if let Ok(parsed) = Url::parse(&format!("http://{}", url)) {
                if let Some(host) = parsed.host_str() {
                    return host.to_lowercase();
                }
            }
        }

        // Manual fallback: strip scheme, userinfo, path, query, port.
        let after_scheme = match url.find("://") {
            Some(pos) => &url[pos + 3..],
            None => url,
        };
        let authority = after_scheme
            .split(['/', '?', '#'])
            .next()
            .unwrap_or(after_scheme);
        let host = authority.rsplit('@').next().unwrap_or(authority);
        let host = host.split(':').next().unwrap_or(host);
        host.to_lowercase()
    }

    /// Split a URL's hostname into subdomain / domain / suffix parts.
    /// IPv4 literals are treated as a single registrable "domain" with no
    /// suffix, matching how the feature schema consumes them.
    pub fn extract(url: &str) -> DomainParts {
        let host = Self::host_of(url);

        if Self::is_ipv4(&host) {
            return DomainParts {
                subdomain: String::new(),
                domain: host,
                suffix: String::new(),
            };
        }

        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
        match labels.len() {
            0 => DomainParts {
                subdomain: String::new(),
                domain: String::new(),
                suffix: String::new(),
            },
            1 => DomainParts {
                subdomain: String::new(),
                domain: labels[0].to_string(),
                suffix: String::new(),
            },
            n => {
                let last_two = format!("{}.{}", labels[n - 2], labels[n - 1]);
                let suffix_len = if TWO_LEVEL_SUFFIXES.contains(&last_two.as_str()) && n >= 3 {
                    2
                } else {
                    1
                };
                let domain_idx = n - suffix_len - 1;
                DomainParts {
                    subdomain: labels[..domain_idx].join("."),
                    domain: labels[domain_idx].to_string(),
                    suffix: labels[domain_idx + 1..].join("."),
                }
            }
        }
    }

    fn is_ipv4(host: &str) -> bool {
        let octets: Vec<&str> = host.split('.').collect();
        octets.len() == 4 && octets.iter().all(|o| o.parse::<u8>().is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_domain() {
        let parts = DomainUtils::extract("https://www.google.com");
        assert_eq!(parts.subdomain, "www");
        assert_eq!(parts.domain, "google");
        assert_eq!(parts.suffix, "com");
        assert_eq!(parts.registered(), "google.com");
        assert_eq!(parts.subdomain_count(), 1);
    }

    #[test]
    fn test_two_level_suffix() {
        let parts = DomainUtils::extract("http://mail.example.co.uk/inbox");
        assert_eq!(parts.subdomain, "mail");
        assert_eq!(parts.domain, "example");
        assert_eq!(parts.suffix, "co.uk");
    }

    #[test]
    fn test_no_scheme_tolerated() {
        let parts = DomainUtils::extract("amaz0n-security-alert.com");
        assert_eq!(parts.domain, "amaz0n-security-alert");
        assert_eq!(parts.suffix, "com");
        assert_eq!(parts.subdomain_count(), 0);
    }

    #[test]
    fn test_ipv4_host() {
        let parts = DomainUtils::extract("http://174.129.35.134/login");
        assert_eq!(parts.domain, "174.129.35.134");
        assert_eq!(parts.suffix, "");
        assert_eq!(parts.registered(), "174.129.35.134");
    }

    #[test]
    fn test_userinfo_does_not_leak_into_host() {
        // The host here is phishing.ru, not bankofamerica.com.
        let parts = DomainUtils::extract("http://bankofamerica.com@phishing.ru");
        assert_eq!(parts.domain, "phishing");
        assert_eq!(parts.suffix, "ru");
    }

    #[test]
    fn test_deep_subdomains() {
        let parts = DomainUtils::extract("http://www.paypal.com.verification.net");
        assert_eq!(parts.domain, "verification");
        assert_eq!(parts.subdomain, "www.paypal.com");
        assert_eq!(parts.subdomain_count(), 3);
    }
}
