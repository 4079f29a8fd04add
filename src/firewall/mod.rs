//! Redirect-risk decision engine.
//!
//! Given an incoming redirect request, the engine gates on the user's plan and
//! firewall toggle, scores the request through a [`RiskScorer`], and applies a
//! threshold table to pick a fallback strategy:
//!
//! - gate closed (toggle off or free plan) → no fallback, scorer never called
//! - score ≥ high threshold → safe fallback (`webview-safe`)
//! - score ≥ medium threshold on an eligible platform → recovery fallback
//!   (`webview-recovery`)
//! - otherwise → no fallback
//!
//! The engine itself is fail-fast: scorer errors propagate to the caller,
//! which is expected to fail open (serve the direct redirect).

pub mod reload;

use serde::{Deserialize, Serialize};

use crate::config::FirewallConfig;
use crate::error::Result;
use crate::scorer::RiskScorer;

/// Subscription tier of a LinkPeek user. The firewall is a paid feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
    Business,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Business => "business",
        }
    }

    pub fn parse(s: &str) -> Option<Plan> {
        match s {
            "free" => Some(Plan::Free),
            "pro" => Some(Plan::Pro),
            "business" => Some(Plan::Business),
            _ => None,
        }
    }
}

/// Per-user firewall settings read on every decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub plan: Plan,
    pub firewall_enabled: bool,
}

/// An incoming redirect request to be evaluated.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub link_id: String,
    pub user_agent: String,
    pub platform: String,
    #[serde(default)]
    pub country: Option<String>,
    pub user_id: String,
}

/// Result of a firewall decision, including the strategy and the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub use_fallback: bool,
    pub strategy: Option<String>,
    pub risk_score: u8,
    pub reason: String,
}

impl Decision {
    /// The fail-open decision: direct redirect, zero score.
    pub fn open(reason: &str) -> Self {
        Self {
            use_fallback: false,
            strategy: None,
            risk_score: 0,
            reason: reason.to_string(),
        }
    }
}

/// Evaluate a redirect request against the user's profile and the threshold
/// table. The scorer is only invoked when the gate (toggle + paid plan) is
/// open; `None` for the profile means the user is unknown and the gate stays
/// closed.
pub fn decide(
    profile: Option<&Profile>,
    req: &DecisionRequest,
    scorer: &dyn RiskScorer,
    config: &FirewallConfig,
) -> Result<Decision> {
    let gate_open = profile
        .map(|p| p.firewall_enabled && p.plan != Plan::Free)
        .unwrap_or(false);
    if !gate_open {
        return Ok(Decision::open("firewall_disabled"));
    }

    let score = scorer.score(&req.platform, &req.user_agent, req.country.as_deref())?;

    if score >= config.high_risk_threshold {
        return Ok(Decision {
            use_fallback: true,
            strategy: Some(config.safe_strategy.clone()),
            risk_score: score,
            reason: "high_risk_detected".to_string(),
        });
    }

    let platform = req.platform.to_lowercase();
    if score >= config.medium_risk_threshold
        && config
            .medium_risk_platforms
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&platform))
    {
        let reason = if platform == "instagram" {
            "medium_risk_instagram"
        } else {
            "medium_risk_platform"
        };
        return Ok(Decision {
            use_fallback: true,
            strategy: Some(config.recovery_strategy.clone()),
            risk_score: score,
            reason: reason.to_string(),
        });
    }

    Ok(Decision {
        use_fallback: false,
        strategy: None,
        risk_score: score,
        reason: "low_risk".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkPeekError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scorer returning a fixed score, counting invocations.
    struct StubScorer {
        score: u8,
        calls: AtomicUsize,
    }

    impl StubScorer {
        fn new(score: u8) -> Self {
            Self {
                score,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl RiskScorer for StubScorer {
        fn score(&self, _: &str, _: &str, _: Option<&str>) -> crate::error::Result<u8> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.score)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    struct FailingScorer;

    impl RiskScorer for FailingScorer {
        fn score(&self, _: &str, _: &str, _: Option<&str>) -> crate::error::Result<u8> {
            Err(LinkPeekError::Scorer("backend down".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn make_profile(plan: Plan, enabled: bool) -> Profile {
        Profile {
            user_id: "u1".to_string(),
            plan,
            firewall_enabled: enabled,
        }
    }

    fn make_req(platform: &str) -> DecisionRequest {
        DecisionRequest {
            link_id: "lnk_1".to_string(),
            user_agent: "Instagram 300.0".to_string(),
            platform: platform.to_string(),
            country: None,
            user_id: "u1".to_string(),
        }
    }

    #[test]
    fn disabled_toggle_skips_scorer() {
        let scorer = StubScorer::new(99);
        let profile = make_profile(Plan::Pro, false);
        let d = decide(
            Some(&profile),
            &make_req("instagram"),
            &scorer,
            &FirewallConfig::default(),
        )
        .unwrap();
        assert_eq!(d, Decision::open("firewall_disabled"));
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn free_plan_skips_scorer() {
        let scorer = StubScorer::new(99);
        let profile = make_profile(Plan::Free, true);
        let d = decide(
            Some(&profile),
            &make_req("instagram"),
            &scorer,
            &FirewallConfig::default(),
        )
        .unwrap();
        assert!(!d.use_fallback);
        assert_eq!(d.risk_score, 0);
        assert_eq!(d.reason, "firewall_disabled");
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_user_fails_open() {
        let scorer = StubScorer::new(99);
        let d = decide(
            None,
            &make_req("instagram"),
            &scorer,
            &FirewallConfig::default(),
        )
        .unwrap();
        assert_eq!(d, Decision::open("firewall_disabled"));
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn high_score_gets_safe_strategy_on_any_platform() {
        let scorer = StubScorer::new(70);
        let profile = make_profile(Plan::Pro, true);
        let d = decide(
            Some(&profile),
            &make_req("newsletter"),
            &scorer,
            &FirewallConfig::default(),
        )
        .unwrap();
        assert!(d.use_fallback);
        assert_eq!(d.strategy.as_deref(), Some("webview-safe"));
        assert_eq!(d.risk_score, 70);
        assert_eq!(d.reason, "high_risk_detected");
    }

    #[test]
    fn medium_score_on_instagram_gets_recovery_strategy() {
        let scorer = StubScorer::new(55);
        let profile = make_profile(Plan::Pro, true);
        let d = decide(
            Some(&profile),
            &make_req("instagram"),
            &scorer,
            &FirewallConfig::default(),
        )
        .unwrap();
        assert!(d.use_fallback);
        assert_eq!(d.strategy.as_deref(), Some("webview-recovery"));
        assert_eq!(d.risk_score, 55);
        assert_eq!(d.reason, "medium_risk_instagram");
    }

    #[test]
    fn medium_score_on_other_platform_passes_through() {
        let scorer = StubScorer::new(55);
        let profile = make_profile(Plan::Business, true);
        let d = decide(
            Some(&profile),
            &make_req("facebook"),
            &scorer,
            &FirewallConfig::default(),
        )
        .unwrap();
        assert!(!d.use_fallback);
        assert!(d.strategy.is_none());
        assert_eq!(d.risk_score, 55);
        assert_eq!(d.reason, "low_risk");
    }

    #[test]
    fn low_score_passes_through() {
        let scorer = StubScorer::new(39);
        let profile = make_profile(Plan::Pro, true);
        let d = decide(
            Some(&profile),
            &make_req("instagram"),
            &scorer,
            &FirewallConfig::default(),
        )
        .unwrap();
        assert!(!d.use_fallback);
        assert_eq!(d.reason, "low_risk");
    }

    #[test]
    fn threshold_boundaries_are_inclusive() {
        let profile = make_profile(Plan::Pro, true);
        let config = FirewallConfig::default();

        let d = decide(
            Some(&profile),
            &make_req("instagram"),
            &StubScorer::new(40),
            &config,
        )
        .unwrap();
        assert_eq!(d.strategy.as_deref(), Some("webview-recovery"));

        let d = decide(
            Some(&profile),
            &make_req("instagram"),
            &StubScorer::new(69),
            &config,
        )
        .unwrap();
        assert_eq!(d.strategy.as_deref(), Some("webview-recovery"));
    }

    #[test]
    fn configured_extra_platform_uses_generic_reason() {
        let scorer = StubScorer::new(50);
        let profile = make_profile(Plan::Pro, true);
        let config = FirewallConfig {
            medium_risk_platforms: vec!["instagram".to_string(), "tiktok".to_string()],
            ..FirewallConfig::default()
        };
        let d = decide(Some(&profile), &make_req("tiktok"), &scorer, &config).unwrap();
        assert!(d.use_fallback);
        assert_eq!(d.reason, "medium_risk_platform");
    }

    #[test]
    fn scorer_error_propagates() {
        let profile = make_profile(Plan::Pro, true);
        let err = decide(
            Some(&profile),
            &make_req("instagram"),
            &FailingScorer,
            &FirewallConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LinkPeekError::Scorer(_)));
    }

    #[test]
    fn platform_match_is_case_insensitive() {
        let scorer = StubScorer::new(55);
        let profile = make_profile(Plan::Pro, true);
        let d = decide(
            Some(&profile),
            &make_req("Instagram"),
            &scorer,
            &FirewallConfig::default(),
        )
        .unwrap();
        assert!(d.use_fallback);
        assert_eq!(d.reason, "medium_risk_instagram");
    }
}
