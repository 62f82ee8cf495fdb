use orc_core::types::UserInfo;

/// Apply a `SetUser` patch on top of whatever is already stored.
///
/// Merge semantics (§4.D): non-null fields in `patch` overwrite the
/// existing value; `intent_history` appends rather than replacing.
pub fn merge_user_info(existing: Option<UserInfo>, patch: UserInfo) -> UserInfo {
    let Some(mut current) = existing else {
        return patch;
    };

    if patch.name.is_some() {
        current.name = patch.name;
    }
    if patch.phone.is_some() {
        current.phone = patch.phone;
    }
    if patch.email.is_some() {
        current.email = patch.email;
    }
    for (k, v) in patch.preferences {
        current.preferences.insert(k, v);
    }
    current.intent_history.extend(patch.intent_history);
    current.last_updated = patch.last_updated;
    current
}
