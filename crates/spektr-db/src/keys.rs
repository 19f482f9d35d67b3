/// Storage key vocabulary. Session records are process-wide; chat records
/// are scoped per identity by suffixing the identity id.

/// Current identity, present only when "remember me" was chosen.
pub const SESSION_USER: &str = "session_user";
/// Full identity directory.
pub const SESSION_USERS: &str = "session_users";
pub const SESSION_THEME: &str = "session_theme";
pub const SESSION_LANGUAGE: &str = "session_language";

/// Full chat list for one identity.
pub fn conversations(user_id: &str) -> String {
    format!("conversations_{user_id}")
}

/// Map from chat id to ordered message list for one identity.
pub fn messages(user_id: &str) -> String {
    format!("messages_{user_id}")
}
