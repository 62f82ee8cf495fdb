use orc_core::types::Intent;

use crate::state::OrchestratorState;

pub const GENERIC_ERROR_REPLY: &str = "Lo sentimos, ocurrió un problema al procesar tu mensaje. Por favor intenta de nuevo.";

/// `validate_input` (§4.K): non-empty `question`/`user_id`, and the caller's
/// `company_id` must match the tenant resolved for this request.
pub fn validate_input(state: &OrchestratorState, expected_company_id: &str) -> Result<(), String> {
    if state.question.trim().is_empty() {
        return Err("empty question".to_string());
    }
    if state.user_id.trim().is_empty() {
        return Err("empty user_id".to_string());
    }
    if state.company_id != expected_company_id {
        return Err(format!("company_id mismatch: {} != {}", state.company_id, expected_company_id));
    }
    Ok(())
}

/// `validate_output` (§4.K): reply must be non-empty and at least 10 chars.
pub fn validate_output(reply: &str) -> bool {
    reply.trim().len() >= 10
}

const PRICING_MARKERS: &[&str] = &["$", "COP"];
const SCHEDULE_MARKERS: &[&str] = &["disponib", "cita", "horario"];
const EMERGENCY_MARKERS: &[&str] = &["emergencia", "urgente", "🚨"];

/// `validate_cross_agent_info` (§4.K): non-blocking check for an agent's
/// reply leaking a different family's information (e.g. Schedule quoting a
/// price). Emits a warning into `validations`, never fails the request.
pub fn validate_cross_agent_info(current_agent: Intent, reply: &str) -> Option<String> {
    let canonical_family = |text: &str| -> Option<&'static str> {
        if PRICING_MARKERS.iter().any(|m| text.contains(m)) {
            Some("pricing")
        } else if SCHEDULE_MARKERS.iter().any(|m| text.to_lowercase().contains(m)) {
            Some("scheduling")
        } else if EMERGENCY_MARKERS.iter().any(|m| text.to_lowercase().contains(m)) {
            Some("emergency")
        } else {
            None
        }
    };

    let family = canonical_family(reply)?;
    let is_canonical_author = matches!(
        (current_agent, family),
        (Intent::Sales, "pricing") | (Intent::Schedule, "scheduling") | (Intent::Emergency, "emergency")
    );

    if is_canonical_author {
        None
    } else {
        Some(format!(
            "{current_agent} reply contains {family} signals but is not the canonical author of that information family"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn state() -> OrchestratorState {
        OrchestratorState::new("hola", "u1", "benova", "", Utc::now())
    }

    #[test]
    fn rejects_empty_question() {
        let mut s = state();
        s.question = "".to_string();
        assert!(validate_input(&s, "benova").is_err());
    }

    #[test]
    fn rejects_company_id_mismatch() {
        let s = state();
        assert!(validate_input(&s, "other").is_err());
    }

    #[test]
    fn accepts_well_formed_input() {
        let s = state();
        assert!(validate_input(&s, "benova").is_ok());
    }

    #[test]
    fn short_reply_fails_output_validation() {
        assert!(!validate_output("ok"));
        assert!(validate_output("Claro, con gusto te ayudo."));
    }

    #[test]
    fn schedule_agent_quoting_price_emits_warning() {
        let warning = validate_cross_agent_info(Intent::Schedule, "El tratamiento cuesta $150.000");
        assert!(warning.is_some());
    }

    #[test]
    fn sales_agent_quoting_price_is_canonical_and_silent() {
        let warning = validate_cross_agent_info(Intent::Sales, "El tratamiento cuesta $150.000");
        assert!(warning.is_none());
    }
}
