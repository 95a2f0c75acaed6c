use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/96.0.4664.45 Safari/537.36";

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 5;

/// Single failure condition for page retrieval. Network errors, timeouts and
/// non-text bodies all collapse into this; the feature extractor converts it
/// to default content features instead of propagating.
#[derive(Debug, thiserror::Error)]
#[error("content fetch failed: {0}")]
pub struct FetchError(pub String);

/// Retrieves page content for DOM-derived features.
pub trait ContentFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP fetcher with a short fixed timeout and a fixed user agent.
/// No retries: a slow or dead page is a normal outcome, not an error worth
/// waiting on.
pub struct HttpContentFetcher {
    client: reqwest::blocking::Client,
}

impl HttpContentFetcher {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError(e.to_string()))?;
        Ok(Self { client })
    }
}

impl ContentFetcher for HttpContentFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError(e.to_string()))?;
        response.text().map_err(|e| FetchError(e.to_string()))
    }
}

/// Fetcher that always fails. Used wherever content fetching is disabled by
/// construction, e.g. batch feature extraction during training.
pub struct NoFetch;

impl ContentFetcher for NoFetch {
    fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        Err(FetchError("content fetching disabled".to_string()))
    }
}
