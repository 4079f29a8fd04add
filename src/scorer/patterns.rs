//! User-agent signature table for in-app browser detection.
//!
//! Ships with built-in signatures for the embedded web views that are known to
//! mishandle redirects:
//!
//! | Platform | Signature |
//! |----------|-----------|
//! | instagram | `Instagram` token |
//! | facebook | `FBAN` / `FBAV` / `FB_IAB` tokens |
//! | tiktok | `TikTok` / `musical_ly` / `BytedanceWebview` |
//! | snapchat | `Snapchat` |
//! | linkedin | `LinkedInApp` |
//! | twitter | `TwitterAndroid` / `Twitter for iPhone` |
//! | pinterest | `Pinterest` |
//! | webview | generic Android `; wv)` marker |
//!
//! Signature order matters: platform-specific tokens are checked before the
//! generic WebView marker so a platform name is reported when one is known.

use regex::Regex;

/// Internal signature definition pairing a compiled regex with its platform.
struct SignatureDef {
    platform: &'static str,
    regex: Regex,
}

/// Ordered table of in-app-browser user-agent signatures.
pub struct SignatureTable {
    signatures: Vec<SignatureDef>,
    legacy_android_webview: Regex,
}

impl SignatureTable {
    pub fn new() -> Self {
        let defs: &[(&'static str, &str)] = &[
            ("instagram", r"\bInstagram\b"),
            ("facebook", r"\bFBAN\b|\bFBAV\b|\bFB_IAB\b"),
            ("tiktok", r"\bTikTok\b|musical_ly|BytedanceWebview"),
            ("snapchat", r"\bSnapchat\b"),
            ("linkedin", r"\bLinkedInApp\b"),
            ("twitter", r"TwitterAndroid|Twitter for iPhone"),
            ("pinterest", r"\bPinterest\b"),
            // Generic Android WebView marker; must stay last.
            ("webview", r"; wv\)"),
        ];

        let signatures = defs
            .iter()
            .map(|(platform, pattern)| SignatureDef {
                platform,
                regex: Regex::new(pattern).unwrap(),
            })
            .collect();

        Self {
            signatures,
            // Android 4.x–9 WebViews predate the redirect fixes in modern
            // Chromium WebView builds.
            legacy_android_webview: Regex::new(r"Android [4-9](?:\.\d+)*;.*; wv\)").unwrap(),
        }
    }

    /// Return the platform of the first matching signature, if any.
    pub fn match_platform(&self, user_agent: &str) -> Option<&str> {
        self.signatures
            .iter()
            .find(|def| def.regex.is_match(user_agent))
            .map(|def| def.platform)
    }

    /// True if the user agent is an old Android WebView build.
    pub fn is_legacy_android_webview(&self, user_agent: &str) -> bool {
        self.legacy_android_webview.is_match(user_agent)
    }
}

impl Default for SignatureTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Base risk weight for a declared traffic platform.
pub fn platform_base_weight(platform: &str) -> u8 {
    match platform.to_lowercase().as_str() {
        "instagram" => 45,
        "facebook" | "tiktok" => 40,
        "snapchat" => 35,
        "linkedin" | "twitter" => 30,
        "pinterest" => 25,
        _ => 10,
    }
}

/// Countries with measurably elevated redirect-failure rates (carrier
/// proxying, data-saver rewriting of redirect chains).
pub fn is_high_failure_country(country: &str) -> bool {
    matches!(
        country.to_uppercase().as_str(),
        "IN" | "ID" | "BD" | "PK" | "NG" | "PH"
    )
}
