//! Outbound platform message (§6): delivers the assistant's reply back to
//! the conversation it answered.

use orc_core::config::ChatwootConfig;
use serde_json::json;
use tracing::warn;

/// `POST {base_url}/api/v1/accounts/{account_id}/conversations/{cid}/messages`.
/// Failure is logged and swallowed by the caller — the graph has already
/// produced and persisted a reply, so a delivery failure shouldn't be
/// retried as if the whole webhook had failed.
pub async fn send_reply(http: &reqwest::Client, chatwoot: &ChatwootConfig, conversation_id: &str, content: &str) -> Result<(), String> {
    let url = format!(
        "{}/api/v1/accounts/{}/conversations/{}/messages",
        chatwoot.base_url, chatwoot.account_id, conversation_id
    );

    let response = http
        .post(&url)
        .header("api_access_token", &chatwoot.api_access_token)
        .json(&json!({
            "content": content,
            "message_type": "outgoing",
            "private": false,
        }))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        let status = response.status();
        warn!(%status, conversation_id, "platform rejected outbound reply");
        return Err(format!("platform responded with {status}"));
    }

    Ok(())
}
