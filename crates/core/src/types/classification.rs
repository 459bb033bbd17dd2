use serde::{Deserialize, Serialize};

// =============================================================================
// Categories
// =============================================================================

/// The fixed set of issue categories the provider may choose from.
pub const CATEGORIES: [&str; 8] = [
    "Road Damage",
    "Street Light",
    "Garbage",
    "Water Leak",
    "Traffic Signal",
    "Pothole",
    "Street Sign",
    "Other",
];

/// Sentinel category for images that do not show a civic issue.
pub const CATEGORY_NOT_APPLICABLE: &str = "Not Applicable";

/// Fallback category when the provider's answer is missing or unknown.
pub const CATEGORY_OTHER: &str = "Other";

/// Map a provider-supplied category onto the fixed set.
///
/// Matching is case-insensitive; the canonical spelling is restored in the
/// output. Unknown categories collapse to [`CATEGORY_OTHER`].
pub fn normalize_category(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case(CATEGORY_NOT_APPLICABLE) {
        return CATEGORY_NOT_APPLICABLE.to_string();
    }
    CATEGORIES
        .iter()
        .find(|c| c.eq_ignore_ascii_case(trimmed))
        .map(|c| c.to_string())
        .unwrap_or_else(|| CATEGORY_OTHER.to_string())
}

// =============================================================================
// Urgency
// =============================================================================

/// Urgency of a reported issue, based on safety and impact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

impl Urgency {
    /// Parse a provider-supplied urgency, falling back to `Medium` for
    /// anything outside the low/medium/high set.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::default(),
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

// =============================================================================
// Classification Result
// =============================================================================

/// Normalized output of a classification request.
///
/// Always well-formed and consumable, regardless of what the provider
/// returned; every field carries a documented default on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Issue category: one of [`CATEGORIES`], or [`CATEGORY_NOT_APPLICABLE`]
    /// for non-civic images.
    pub category: String,

    /// Human-readable description of the issue.
    pub description: String,

    /// Urgency based on safety and impact.
    pub urgency: Urgency,

    /// Provider confidence in `[0, 100]`. Present on image classifications
    /// only; text classifications carry no confidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
}
