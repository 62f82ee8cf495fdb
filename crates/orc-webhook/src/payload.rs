//! Pure helpers over the raw Chatwoot webhook JSON (§4.L, §6). Nothing here
//! touches a store or the network — that keeps the parsing rules unit
//! testable without spinning up any backend.

use serde_json::Value;

pub fn event_type(payload: &Value) -> Option<&str> {
    payload.get("event").and_then(Value::as_str)
}

pub fn is_incoming_message(payload: &Value) -> bool {
    payload.get("message_type").and_then(Value::as_str) == Some("incoming")
}

pub fn conversation(payload: &Value) -> Option<&Value> {
    payload.get("conversation")
}

/// `conversation.id`, accepting either a JSON number or a string.
pub fn conversation_id(payload: &Value) -> Option<String> {
    let id = conversation(payload)?.get("id")?;
    id.as_str()
        .map(str::to_string)
        .or_else(|| id.as_u64().map(|n| n.to_string()))
}

pub fn conversation_status(payload: &Value) -> Option<&str> {
    conversation(payload)?.get("status").and_then(Value::as_str)
}

/// Top-level `id` — the Chatwoot message id used for the idempotency key.
pub fn message_id(payload: &Value) -> Option<String> {
    let id = payload.get("id")?;
    id.as_str()
        .map(str::to_string)
        .or_else(|| id.as_u64().map(|n| n.to_string()))
}

pub fn content(payload: &Value) -> &str {
    payload.get("content").and_then(Value::as_str).unwrap_or("")
}

/// `contact_id` priority chain (§4.L step 4):
/// `conversation.contact_inbox.contact_id` → `conversation.meta.sender.id` →
/// root `sender.id` (only if the root sender isn't an agent).
pub fn extract_contact_id(payload: &Value) -> Option<String> {
    let from_value = |v: &Value| -> Option<String> {
        v.as_str().map(str::to_string).or_else(|| v.as_u64().map(|n| n.to_string()))
    };

    if let Some(id) = conversation(payload)
        .and_then(|c| c.get("contact_inbox"))
        .and_then(|ci| ci.get("contact_id"))
    {
        if let Some(id) = from_value(id) {
            return Some(id);
        }
    }

    if let Some(id) = conversation(payload)
        .and_then(|c| c.get("meta"))
        .and_then(|m| m.get("sender"))
        .and_then(|s| s.get("id"))
    {
        if let Some(id) = from_value(id) {
            return Some(id);
        }
    }

    let sender = payload.get("sender")?;
    let sender_type = sender.get("type").and_then(Value::as_str).unwrap_or("");
    if sender_type == "agent" || sender_type == "user" {
        return None;
    }
    from_value(sender.get("id")?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Audio,
    Image,
    Other,
}

pub struct Attachment<'a> {
    pub kind: AttachmentKind,
    pub url: Option<&'a str>,
}

pub fn attachments(payload: &Value) -> Vec<Attachment<'_>> {
    payload
        .get("attachments")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    let kind = match item.get("file_type").and_then(Value::as_str) {
                        Some("audio") => AttachmentKind::Audio,
                        Some("image") => AttachmentKind::Image,
                        _ => AttachmentKind::Other,
                    };
                    let url = item.get("data_url").and_then(Value::as_str);
                    Attachment { kind, url }
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Transcribes/describes every attachment and joins the results into one
/// context blob for the Orchestration Graph (§4.L step 4). Both are stubs —
/// no speech-to-text or vision backend is wired up — but the combination
/// shape (one line per attachment, skipped when there's nothing to add) is
/// what every future real implementation plugs into.
pub fn media_context(payload: &Value) -> String {
    attachments(payload)
        .into_iter()
        .filter_map(|a| match a.kind {
            AttachmentKind::Audio => Some(format!("[audio attachment: {}]", a.url.unwrap_or("unknown"))),
            AttachmentKind::Image => Some(format!("[image attachment: {}]", a.url.unwrap_or("unknown"))),
            AttachmentKind::Other => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}
