pub mod patterns;

use crate::error::Result;

use patterns::SignatureTable;

/// Trait for redirect-risk scoring backends.
///
/// Returns an estimated likelihood of redirect failure for the combination of
/// platform, user agent, and country, as an integer in `[0, 100]`.
/// Implementations must be `Send + Sync` for use across async handlers.
pub trait RiskScorer: Send + Sync {
    fn score(&self, platform: &str, user_agent: &str, country: Option<&str>) -> Result<u8>;

    /// Return the backend name (e.g., `"heuristic"`).
    fn name(&self) -> &str;
}

/// Default scoring backend built from in-app-browser user-agent signatures,
/// per-platform base weights, and a small country risk table.
///
/// | Signal | Contribution |
/// |--------|--------------|
/// | Platform base weight | 10–45 |
/// | In-app browser UA signature | +30 |
/// | Old Android WebView UA | +15 |
/// | High-failure country | +10 |
///
/// The sum is clamped to `[0, 100]`.
pub struct HeuristicScorer {
    signatures: SignatureTable,
}

impl HeuristicScorer {
    pub fn new() -> Self {
        Self {
            signatures: SignatureTable::new(),
        }
    }

    /// Detect an in-app browser from the user agent, returning the platform
    /// name of the matching signature.
    pub fn detect_in_app_browser(&self, user_agent: &str) -> Option<&str> {
        self.signatures.match_platform(user_agent)
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskScorer for HeuristicScorer {
    fn score(&self, platform: &str, user_agent: &str, country: Option<&str>) -> Result<u8> {
        let mut score = patterns::platform_base_weight(platform) as u32;

        if self.signatures.match_platform(user_agent).is_some() {
            score += 30;
        }
        if self.signatures.is_legacy_android_webview(user_agent) {
            score += 15;
        }
        if let Some(cc) = country {
            if patterns::is_high_failure_country(cc) {
                score += 10;
            }
        }

        Ok(score.min(100) as u8)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
