use orc_core::config::TenantKeywords;
use orc_core::types::Intent;

/// Scan the question against four keyword families in priority order and
/// return a secondary intent distinct from the primary one (§4.K
/// `detect_secondary_intent`).
pub fn detect_secondary_intent(question: &str, primary: Intent, keywords: &TenantKeywords) -> Option<(Intent, f32)> {
    let lower = question.to_lowercase();
    let hits = |set: &[String]| set.iter().any(|kw| lower.contains(&kw.to_lowercase()));

    if hits(&keywords.emergency) && primary != Intent::Emergency {
        return Some((Intent::Emergency, 0.9));
    }
    if matches!(primary, Intent::Schedule | Intent::Support) && hits(&keywords.sales) {
        return Some((Intent::Sales, 0.8));
    }
    if matches!(primary, Intent::Sales | Intent::Support) && hits(&keywords.schedule) {
        return Some((Intent::Schedule, 0.8));
    }
    if matches!(primary, Intent::Sales | Intent::Schedule) && hits(&keywords.support) {
        return Some((Intent::Support, 0.75));
    }
    None
}
