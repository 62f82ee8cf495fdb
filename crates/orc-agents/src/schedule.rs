use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use orc_adapter::Handler;
use orc_core::config::{ScheduleBackendConfig, TreatmentDuration};
use orc_core::OrcError;
use orc_llm::{ChatRequest, LlmProvider};
use orc_prompt::{PromptResolver, RenderVars};
use orc_tools::ToolExecutor;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use crate::common::format_history;

#[derive(Debug, Deserialize)]
pub struct ScheduleInput {
    pub question: String,
    #[serde(default)]
    pub chat_history: Vec<(String, String)>,
    pub user_id: String,
    pub conversation_id: String,
    pub company_id: String,
    pub company_name: String,
    #[serde(default)]
    pub treatment_durations: HashMap<String, TreatmentDuration>,
    #[serde(default)]
    pub required_booking_fields: Vec<String>,
    pub schedule_backend: ScheduleBackendConfig,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Override for "today", `YYYY-MM-DD`. Absent in production; used by
    /// tests so date-relative extraction ("mañana") is deterministic.
    #[serde(default)]
    pub reference_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ScheduleOutput {
    pub reply: String,
    pub date: Option<String>,
    pub treatment: Option<String>,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub patient_national_id: Option<String>,
    pub missing_fields: Vec<String>,
    /// `"HH:MM - HH:MM"` candidates sized to the treatment's total duration
    /// (§8: "candidates `09:00 – 11:00` and `09:30 – 11:30`").
    pub available_slots: Vec<String>,
    /// The bare start of each `available_slots` entry, in the same order —
    /// what `execute_booking` actually books.
    pub available_slot_starts: Vec<String>,
    pub checked_availability: bool,
}

/// Schedule specialist (§4.G, §4.K.1): runs `extract_info → validate_info →
/// (check_availability | skip) → generate_response` instead of calling the
/// LLM directly like the other three specialists.
pub struct ScheduleHandler {
    llm: Arc<dyn LlmProvider>,
    prompts: Arc<dyn PromptResolver>,
    tools: Arc<ToolExecutor>,
}

impl ScheduleHandler {
    pub fn new(llm: Arc<dyn LlmProvider>, prompts: Arc<dyn PromptResolver>, tools: Arc<ToolExecutor>) -> Self {
        Self { llm, prompts, tools }
    }
}

#[async_trait]
impl Handler for ScheduleHandler {
    async fn invoke(&self, inputs: &Value) -> Result<Value, OrcError> {
        let input: ScheduleInput = serde_json::from_value(inputs.clone())?;

        let today = match &input.reference_date {
            Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive()),
            None => Utc::now().date_naive(),
        };

        let history_text = input
            .chat_history
            .iter()
            .map(|(_, content)| content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let full_text = format!("{} {}", input.question, history_text);

        let extracted = extract_info(&full_text, today, &input.treatment_durations);

        let mut missing_fields = Vec::new();
        for field in &input.required_booking_fields {
            let present = match field.as_str() {
                "date" => extracted.date.is_some(),
                "treatment" => extracted.treatment.is_some(),
                "patient_name" => extracted.patient_name.is_some(),
                "patient_phone" => extracted.patient_phone.is_some(),
                "patient_email" => extracted.patient_email.is_some(),
                "patient_national_id" | "national_id" => extracted.patient_national_id.is_some(),
                _ => false,
            };
            if !present {
                missing_fields.push(field.clone());
            }
        }

        let date_valid = extracted
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%d-%m-%Y").ok())
            .map(|d| d >= today)
            .unwrap_or(false);
        let treatment_valid = extracted
            .treatment
            .as_deref()
            .map(|t| input.treatment_durations.contains_key(t))
            .unwrap_or(false);

        let mut available_slots = Vec::new();
        let mut available_slot_starts = Vec::new();
        let mut checked_availability = false;

        if date_valid && treatment_valid && !is_information_only(&input.question) {
            checked_availability = true;
            let treatment_name = extracted.treatment.clone().unwrap();
            let treatment_cfg = input.treatment_durations.get(&treatment_name);
            // §6 generic contract: `treatment: {duration, sessions, deposit, agenda_id}`,
            // not the bare treatment name — a backend needs the duration to size slots.
            let treatment_value = serde_json::json!({
                "duration": treatment_cfg.map(|t| t.duration_minutes).unwrap_or(30),
                "sessions": treatment_cfg.map(|t| t.sessions).unwrap_or(1),
                "deposit": treatment_cfg.and_then(|t| t.deposit.clone()),
                "agenda_id": treatment_cfg.and_then(|t| t.agenda_id.clone()),
            });
            let params = serde_json::json!({
                "action": "check_availability",
                "date": extracted.date.clone().unwrap(),
                "treatment": treatment_value,
            });
            let result = self
                .tools
                .execute(
                    "google_calendar",
                    &params,
                    &input.user_id,
                    "schedule",
                    &input.conversation_id,
                    &input.company_id,
                    &input.schedule_backend,
                )
                .await;

            if result.success {
                let raw_slots: Vec<String> = result
                    .data
                    .as_ref()
                    .and_then(|d| d.get("available_slots"))
                    .and_then(|v| v.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();

                let needed_minutes = treatment_cfg.map(|t| t.duration_minutes * t.sessions).unwrap_or(30);
                let slots = collapse_slots(raw_slots, needed_minutes);
                available_slot_starts = slots.iter().map(|(start, _)| start.clone()).collect();
                available_slots = slots.into_iter().map(|(_, range)| range).collect();
            }
        }

        let slots_preview = available_slots.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
        let context = format!(
            "date: {}\ntreatment: {}\navailable_slots: {}\nmissing_fields: {}",
            extracted.date.as_deref().unwrap_or("unknown"),
            extracted.treatment.as_deref().unwrap_or("unknown"),
            if slots_preview.is_empty() { "none" } else { &slots_preview },
            missing_fields.join(", "),
        );
        let history = format_history(&input.chat_history);
        let vars = RenderVars {
            question: &input.question,
            chat_history: &history,
            context: &context,
            company_name: &input.company_name,
            services: "",
        };
        let template = self.prompts.resolve(&input.company_id, "schedule");
        let system = orc_prompt::render(&template.body, &vars);

        let request = ChatRequest {
            model: input.model_name.clone(),
            system,
            history: Vec::new(),
            question: input.question.clone(),
            max_tokens: input.max_tokens,
            temperature: input.temperature,
        };
        let response = self.llm.send(&request).await.map_err(|e| OrcError::LlmProvider(e.to_string()))?;

        Ok(serde_json::to_value(ScheduleOutput {
            reply: response.content,
            date: extracted.date,
            treatment: extracted.treatment,
            patient_name: extracted.patient_name,
            patient_phone: extracted.patient_phone,
            patient_email: extracted.patient_email,
            patient_national_id: extracted.patient_national_id,
            missing_fields,
            available_slots,
            available_slot_starts,
            checked_availability,
        })?)
    }
}

struct ExtractedInfo {
    date: Option<String>,
    treatment: Option<String>,
    patient_name: Option<String>,
    patient_phone: Option<String>,
    patient_email: Option<String>,
    patient_national_id: Option<String>,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w.+-]+@[\w-]+\.[\w.-]+").unwrap())
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+?\d{9,13}").unwrap())
}

fn national_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{6,8}\b").unwrap())
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:me llamo|mi nombre es)\s+([a-záéíóúñ]+(?:\s[a-záéíóúñ]+)?)").unwrap())
}

fn date_dash_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{2})-(\d{2})-(\d{4})\b").unwrap())
}

fn date_slash_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{2})/(\d{2})/(\d{4})\b").unwrap())
}

fn extract_info(full_text: &str, today: NaiveDate, treatments: &HashMap<String, TreatmentDuration>) -> ExtractedInfo {
    let lower = full_text.to_lowercase();

    let date = if lower.contains("pasado mañana") {
        Some((today + ChronoDuration::days(2)).format("%d-%m-%Y").to_string())
    } else if lower.contains("mañana") {
        Some((today + ChronoDuration::days(1)).format("%d-%m-%Y").to_string())
    } else if lower.contains("hoy") {
        Some(today.format("%d-%m-%Y").to_string())
    } else if let Some(caps) = date_dash_regex().captures(full_text) {
        Some(format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]))
    } else if let Some(caps) = date_slash_regex().captures(full_text) {
        Some(format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]))
    } else {
        None
    };

    let mut treatment_keys: Vec<&String> = treatments.keys().collect();
    treatment_keys.sort();
    let treatment = treatment_keys
        .into_iter()
        .find(|key| lower.contains(&key.to_lowercase()))
        .cloned();

    let patient_email = email_regex().find(full_text).map(|m| m.as_str().to_string());
    let remaining_after_email = match &patient_email {
        Some(email) => full_text.replacen(email, " ", 1),
        None => full_text.to_string(),
    };
    let patient_phone = phone_regex().find(&remaining_after_email).map(|m| m.as_str().to_string());
    let remaining_after_phone = match &patient_phone {
        Some(phone) => remaining_after_email.replacen(phone, " ", 1),
        None => remaining_after_email,
    };
    let patient_national_id = national_id_regex().find(&remaining_after_phone).map(|m| m.as_str().to_string());
    let patient_name = name_regex()
        .captures(full_text)
        .and_then(|c| c.get(1))
        .map(|m| titlecase(m.as_str()));

    ExtractedInfo {
        date,
        treatment,
        patient_name,
        patient_phone,
        patient_email,
        patient_national_id,
    }
}

fn titlecase(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Heuristic: a question asking only about price/info, with no booking
/// commitment words, skips `check_availability` (§4.K.1).
fn is_information_only(question: &str) -> bool {
    let lower = question.to_lowercase();
    const INFO_MARKERS: &[&str] = &["cuánto cuesta", "cuanto cuesta", "precio", "información", "informacion"];
    const BOOKING_MARKERS: &[&str] = &["agendar", "reservar", "quiero una cita", "disponibilidad"];
    let has_info = INFO_MARKERS.iter().any(|m| lower.contains(m));
    let has_booking = BOOKING_MARKERS.iter().any(|m| lower.contains(m));
    has_info && !has_booking
}

fn parse_hhmm(s: &str) -> Option<i64> {
    let mut parts = s.split(':');
    let h: i64 = parts.next()?.parse().ok()?;
    let m: i64 = parts.next()?.parse().ok()?;
    Some(h * 60 + m)
}

fn add_minutes_to_time(time: &str, minutes_to_add: u32) -> String {
    match parse_hhmm(time) {
        Some(total) => {
            let total = (total + minutes_to_add as i64).rem_euclid(24 * 60);
            format!("{:02}:{:02}", total / 60, total % 60)
        }
        None => time.to_string(),
    }
}

/// Collapse consecutive 30-minute slots so a multi-session or long
/// treatment only shows starts that have enough contiguous room (§4.K.1,
/// "the slot comparator is lexicographic by HH:MM"), then size each
/// surviving start to the treatment's total duration. Returns
/// `(start, "start - end")` pairs: booking needs the bare start, the reply
/// to the user needs the full window (§8: "candidates `09:00 – 11:00` and
/// `09:30 – 11:30`").
fn collapse_slots(mut slots: Vec<String>, needed_minutes: u32) -> Vec<(String, String)> {
    slots.sort();
    slots.dedup();
    let needed_blocks = ((needed_minutes + 29) / 30).max(1) as usize;

    let parsed: Vec<(String, i64)> = slots.into_iter().filter_map(|s| parse_hhmm(&s).map(|m| (s, m))).collect();

    let mut usable = Vec::new();
    for i in 0..parsed.len() {
        let mut consecutive = 1usize;
        let mut j = i;
        while consecutive < needed_blocks && j + 1 < parsed.len() && parsed[j + 1].1 - parsed[j].1 == 30 {
            consecutive += 1;
            j += 1;
        }
        if consecutive >= needed_blocks {
            let start = parsed[i].0.clone();
            let end = add_minutes_to_time(&start, needed_minutes);
            let range = format!("{start} - {end}");
            usable.push((start, range));
        }
    }
    usable
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_llm::MockLlmProvider;
    use orc_prompt::StaticPromptResolver;
    use serde_json::json;

    fn treatments() -> HashMap<String, TreatmentDuration> {
        let mut m = HashMap::new();
        m.insert(
            "limpieza".to_string(),
            TreatmentDuration { duration_minutes: 60, sessions: 1, deposit: None, agenda_id: None },
        );
        m
    }

    fn base_input(question: &str, reference_date: &str) -> Value {
        json!({
            "question": question,
            "chat_history": [],
            "user_id": "benova_contact_1",
            "conversation_id": "conv-1",
            "company_id": "benova",
            "company_name": "Benova",
            "treatment_durations": {"limpieza": {"duration_minutes": 60, "sessions": 1}},
            "required_booking_fields": ["date", "treatment"],
            "schedule_backend": {"url": "http://127.0.0.1:1", "kind": "generic"},
            "model_name": "default-chat-model",
            "max_tokens": 256,
            "temperature": 0.3,
            "reference_date": reference_date,
        })
    }

    fn handler(mock: MockLlmProvider) -> ScheduleHandler {
        ScheduleHandler::new(Arc::new(mock), Arc::new(StaticPromptResolver::empty()), Arc::new(ToolExecutor::new()))
    }

    #[test]
    fn relative_date_word_resolves_against_reference_date() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let extracted = extract_info("quiero una cita mañana para limpieza", today, &treatments());
        assert_eq!(extracted.date.as_deref(), Some("29-07-2026"));
        assert_eq!(extracted.treatment.as_deref(), Some("limpieza"));
    }

    #[test]
    fn explicit_dash_date_is_extracted_verbatim() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let extracted = extract_info("disponibilidad el 05-08-2026 para limpieza", today, &treatments());
        assert_eq!(extracted.date.as_deref(), Some("05-08-2026"));
    }

    #[test]
    fn name_and_contact_fields_are_extracted() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let extracted = extract_info(
            "me llamo Ana Gomez, mi correo es ana@example.com y mi celular 3001234567",
            today,
            &treatments(),
        );
        assert_eq!(extracted.patient_name.as_deref(), Some("Ana Gomez"));
        assert_eq!(extracted.patient_email.as_deref(), Some("ana@example.com"));
        assert_eq!(extracted.patient_phone.as_deref(), Some("3001234567"));
    }

    #[test]
    fn collapse_slots_keeps_only_starts_with_enough_contiguous_room() {
        let slots = vec!["09:00", "09:30", "10:00", "11:30"].into_iter().map(String::from).collect();
        let usable = collapse_slots(slots, 60);
        assert_eq!(
            usable,
            vec![
                ("09:00".to_string(), "09:00 - 10:00".to_string()),
                ("09:30".to_string(), "09:30 - 10:30".to_string()),
            ]
        );
    }

    #[test]
    fn collapse_slots_emits_full_treatment_window_for_multi_session_bookings() {
        let slots = vec!["09:00", "09:30", "10:00", "10:30"].into_iter().map(String::from).collect();
        let usable = collapse_slots(slots, 120);
        assert_eq!(usable, vec![("09:00".to_string(), "09:00 - 11:00".to_string())]);
    }

    #[test]
    fn pure_price_question_is_information_only() {
        assert!(is_information_only("¿Cuánto cuesta la limpieza?"));
        assert!(!is_information_only("Quiero agendar una cita para limpieza"));
    }

    #[tokio::test]
    async fn information_only_question_skips_availability_check() {
        let mock = MockLlmProvider::with_responses(vec![Ok("La limpieza cuesta $120.000.".to_string())]);
        let handler = handler(mock);
        let input = base_input("¿Cuánto cuesta la limpieza?", "2026-07-28");
        let out: ScheduleOutput = serde_json::from_value(handler.invoke(&input).await.unwrap()).unwrap();
        assert!(!out.checked_availability);
    }

    #[tokio::test]
    async fn missing_required_fields_are_reported() {
        let mock = MockLlmProvider::with_responses(vec![Ok("Necesito más datos.".to_string())]);
        let handler = handler(mock);
        let input = base_input("Hola, quiero información general", "2026-07-28");
        let out: ScheduleOutput = serde_json::from_value(handler.invoke(&input).await.unwrap()).unwrap();
        assert!(out.missing_fields.contains(&"date".to_string()));
        assert!(out.missing_fields.contains(&"treatment".to_string()));
    }
}
