use crate::config::ConfigError;
use crate::model::RoutingDecision;

pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Answers from the corpus only when the match score is strictly above the
/// threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseRouter {
    threshold: f32,
}

impl ResponseRouter {
    pub fn with_threshold(threshold: f32) -> Result<Self, ConfigError> {
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn decide(&self, score: f32) -> RoutingDecision {
        if score > self.threshold {
            RoutingDecision::FromCorpus
        } else {
            RoutingDecision::FromFallback
        }
    }
}

impl Default for ResponseRouter {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_score_falls_back() {
        let router = ResponseRouter::default();
        assert_eq!(router.decide(0.5), RoutingDecision::FromFallback);
        assert_eq!(router.decide(0.499), RoutingDecision::FromFallback);
        assert_eq!(router.decide(0.501), RoutingDecision::FromCorpus);
    }

    #[test]
    fn extremes() {
        let router = ResponseRouter::default();
        assert_eq!(router.decide(1.0), RoutingDecision::FromCorpus);
        assert_eq!(router.decide(-1.0), RoutingDecision::FromFallback);
        assert_eq!(router.decide(f32::NAN), RoutingDecision::FromFallback);
    }

    #[test]
    fn custom_threshold() {
        let router = ResponseRouter::with_threshold(0.8).unwrap();
        assert_eq!(router.decide(0.75), RoutingDecision::FromFallback);
        assert_eq!(router.decide(0.81), RoutingDecision::FromCorpus);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        assert!(ResponseRouter::with_threshold(1.5).is_err());
        assert!(ResponseRouter::with_threshold(f32::NAN).is_err());
        assert!(ResponseRouter::with_threshold(-1.0).is_ok());
    }
}
