/// Domain age source for the `domain_age_days` feature.
///
/// Live WHOIS lookups are deliberately out of the serving path: the trained
/// artifact only ever sees the oracle's value, so swapping implementations
/// changes the model's input distribution and requires retraining.
pub trait DomainAgeOracle: Send + Sync {
    fn age_days(&self, domain: &str) -> f64;
}

/// Default oracle: a fixed placeholder age for every domain.
#[derive(Debug, Clone, Copy)]
pub struct FixedDomainAge(pub f64);

impl Default for FixedDomainAge {
    fn default() -> Self {
        FixedDomainAge(365.0)
    }
}

impl DomainAgeOracle for FixedDomainAge {
    fn age_days(&self, _domain: &str) -> f64 {
        self.0
    }
}
