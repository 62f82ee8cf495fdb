use std::time::Duration;

use orc_core::config::{ScheduleBackendConfig, ScheduleBackendKind};
use serde_json::{json, Value};
use tracing::{instrument, warn};

use crate::endpoints::paths_for;
use crate::error::ToolError;
use crate::types::ToolResult;

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(30);
const BOOKING_TIMEOUT: Duration = Duration::from_secs(60);
const NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Uniform interface to every side-effecting tool the Specialist Handlers
/// and Orchestration Graph can invoke (§4.H). All HTTP I/O to the schedule
/// backend lives here; the backend `kind` from the Tenant Registry
/// selects endpoint paths, the external contracts at §6 are authoritative.
///
/// `send_email`/`create_ticket`/`close_ticket` are routed through the same
/// per-tenant schedule backend gateway as the calendar operations — the
/// data model exposes no separate notification backend, so the schedule
/// backend doubles as the tenant's one integration surface (see DESIGN.md).
pub struct ToolExecutor {
    client: reqwest::Client,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    #[instrument(skip(self, parameters, backend), fields(tool_name, user_id, agent_name, conversation_id))]
    pub async fn execute(
        &self,
        tool_name: &str,
        parameters: &Value,
        user_id: &str,
        agent_name: &str,
        conversation_id: &str,
        company_id: &str,
        backend: &ScheduleBackendConfig,
    ) -> ToolResult {
        let outcome = match tool_name {
            "google_calendar" => self.google_calendar(parameters, user_id, conversation_id, company_id, backend).await,
            "send_email" => self.send_email(parameters, backend).await,
            "create_ticket" => self.create_ticket(parameters, user_id, backend).await,
            "close_ticket" => self.close_ticket(parameters, backend).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        };

        match outcome {
            Ok(data) => ToolResult::ok(data),
            Err(err) => {
                warn!(tool_name, agent_name, error = %err, "tool execution failed");
                ToolResult::err(err.to_string())
            }
        }
    }

    async fn google_calendar(
        &self,
        parameters: &Value,
        user_id: &str,
        conversation_id: &str,
        company_id: &str,
        backend: &ScheduleBackendConfig,
    ) -> Result<Value, ToolError> {
        let action = parameters
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::MissingParameter("action".to_string()))?;
        let paths = paths_for(backend.kind);

        match action {
            "check_availability" => {
                let date = require_str(parameters, "date")?;
                let treatment = parameters
                    .get("treatment")
                    .cloned()
                    .ok_or_else(|| ToolError::MissingParameter("treatment".to_string()))?;
                let treatment = treatment_for_backend(treatment, backend.kind);
                let body = if paths.single_endpoint {
                    json!({"action": "check_availability", "date": date, "treatment": treatment, "company_id": company_id})
                } else {
                    json!({"date": date, "treatment": treatment, "company_id": company_id})
                };
                self.post(backend, paths.availability, &body, AVAILABILITY_TIMEOUT).await
            }
            "create_booking" => {
                let treatment = require_str(parameters, "treatment")?;
                let date = require_str(parameters, "date")?;
                let time = require_str(parameters, "time")?;
                let patient_name = require_str(parameters, "patient_name")?;
                let patient_phone = require_str(parameters, "patient_phone")?;
                let body = if paths.single_endpoint {
                    json!({
                        "action": "create_booking", "treatment": treatment, "date": date, "time": time,
                        "patient_name": patient_name, "patient_phone": patient_phone,
                        "user_id": user_id, "conversation_id": conversation_id, "company_id": company_id,
                    })
                } else {
                    json!({
                        "treatment": treatment, "date": date, "time": time,
                        "patient_name": patient_name, "patient_phone": patient_phone,
                        "user_id": user_id, "conversation_id": conversation_id, "company_id": company_id,
                    })
                };
                self.post(backend, paths.book, &body, BOOKING_TIMEOUT).await
            }
            "delete_event" => {
                let event_id = require_str(parameters, "event_id")?;
                let body = if paths.single_endpoint {
                    json!({"action": "delete_event", "event_id": event_id, "company_id": company_id})
                } else {
                    json!({"event_id": event_id, "company_id": company_id})
                };
                self.post(backend, paths.delete, &body, AVAILABILITY_TIMEOUT).await
            }
            other => Err(ToolError::MissingParameter(format!("unknown google_calendar action: {other}"))),
        }
    }

    async fn send_email(&self, parameters: &Value, backend: &ScheduleBackendConfig) -> Result<Value, ToolError> {
        let to_email = require_str(parameters, "to_email")?;
        let template_name = require_str(parameters, "template_name")?;
        let template_vars = parameters.get("template_vars").cloned().unwrap_or_else(|| json!({}));
        let body = json!({"to_email": to_email, "template_name": template_name, "template_vars": template_vars});
        self.post(backend, "/notify/email", &body, NOTIFICATION_TIMEOUT).await
    }

    async fn create_ticket(&self, parameters: &Value, user_id: &str, backend: &ScheduleBackendConfig) -> Result<Value, ToolError> {
        let subject = require_str(parameters, "subject")?;
        let description = require_str(parameters, "description")?;
        let priority = parameters.get("priority").and_then(Value::as_str).unwrap_or("medium");
        let requester_id = parameters.get("requester_id").and_then(Value::as_str).unwrap_or(user_id);
        let body = json!({"subject": subject, "description": description, "priority": priority, "requester_id": requester_id});
        self.post(backend, "/tickets", &body, NOTIFICATION_TIMEOUT).await
    }

    async fn close_ticket(&self, parameters: &Value, backend: &ScheduleBackendConfig) -> Result<Value, ToolError> {
        let ticket_id = require_str(parameters, "ticket_id")?;
        let path = format!("/tickets/{ticket_id}/close");
        self.post(backend, &path, &json!({}), NOTIFICATION_TIMEOUT).await
    }

    async fn post(&self, backend: &ScheduleBackendConfig, path: &str, body: &Value, timeout: Duration) -> Result<Value, ToolError> {
        let url = format!("{}{}", backend.url.trim_end_matches('/'), path);
        let resp = self.client.post(&url).json(body).timeout(timeout).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ToolError::Backend(format!("{status}: {text}")));
        }

        resp.json::<Value>().await.map_err(ToolError::Http)
    }
}

/// §6: the `google_calendar` backend names its agenda field `calendar_id`
/// instead of the generic contract's `agenda_id`.
fn treatment_for_backend(mut treatment: Value, kind: ScheduleBackendKind) -> Value {
    if kind == ScheduleBackendKind::GoogleCalendar {
        if let Value::Object(ref mut map) = treatment {
            if let Some(agenda_id) = map.remove("agenda_id") {
                map.insert("calendar_id".to_string(), agenda_id);
            }
        }
    }
    treatment
}

fn require_str<'a>(parameters: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    parameters
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::MissingParameter(field.to_string()))
}
