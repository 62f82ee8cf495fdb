//! Key layout shared by both backends: `{prefix}shared_state:{slot}:{user_id}`
//! (§3 SharedContext). `prefix` is the tenant's `redis_prefix`, already
//! including any trailing separator the tenant config supplies.

pub fn pricing(prefix: &str, user_id: &str) -> String {
    format!("{prefix}shared_state:pricing:{user_id}")
}

pub fn schedule(prefix: &str, user_id: &str) -> String {
    format!("{prefix}shared_state:schedule:{user_id}")
}

pub fn user(prefix: &str, user_id: &str) -> String {
    format!("{prefix}shared_state:user:{user_id}")
}

pub fn service(prefix: &str, user_id: &str) -> String {
    format!("{prefix}shared_state:service:{user_id}")
}

pub fn support(prefix: &str, user_id: &str) -> String {
    format!("{prefix}shared_state:support:{user_id}")
}

pub fn emergency(prefix: &str, user_id: &str) -> String {
    format!("{prefix}shared_state:emergency:{user_id}")
}

pub fn handoff(prefix: &str, user_id: &str) -> String {
    format!("{prefix}shared_state:handoff:{user_id}")
}

/// `ProcessedMessageKey` (§3): 1-hour TTL, one per `(conversation_id, message_id)`.
pub fn processed_message(prefix: &str, conversation_id: &str, message_id: &str) -> String {
    format!("{prefix}processed_message:{conversation_id}:{message_id}")
}

/// `BotStatusKey` (§3): 24-hour TTL, one per conversation.
pub fn bot_status(prefix: &str, conversation_id: &str) -> String {
    format!("{prefix}bot_status:{conversation_id}")
}

/// Every per-user key for a given prefix, used by `clear_user_data`.
pub fn all_for_user(prefix: &str, user_id: &str) -> Vec<String> {
    vec![
        pricing(prefix, user_id),
        schedule(prefix, user_id),
        user(prefix, user_id),
        service(prefix, user_id),
        support(prefix, user_id),
        emergency(prefix, user_id),
        handoff(prefix, user_id),
    ]
}
