//! Activity-log action names and change-history value helpers.
//!
//! Lives in `core` so the HTTP surface, the WebSocket session and the
//! coordinator all log the same action strings.

// ---------------------------------------------------------------------------
// Action type constants
// ---------------------------------------------------------------------------

/// Actions the coordinator logs on its own. Business code may log any
/// other action that passes [`validate_action`].
pub mod actions {
    pub const LOGIN: &str = "login";
    pub const LOGOUT: &str = "logout";
    pub const VIEW: &str = "view";
    pub const LOCK: &str = "lock";
    pub const UNLOCK: &str = "unlock";
    pub const COLLABORATE: &str = "collaborate";
    pub const TAKEOVER: &str = "takeover";
}

/// Resource type recorded for session-level actions (login, logout, view).
pub const SESSION_RESOURCE_TYPE: &str = "session";

/// Default and maximum page size for activity-log queries.
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Entries the fire-and-forget audit queue holds before it starts dropping.
pub const DEFAULT_AUDIT_BUFFER_SIZE: usize = 1024;

const MAX_ACTION_LEN: usize = 64;

pub fn validate_action(action: &str) -> Result<(), String> {
    if action.trim().is_empty() {
        return Err("action must not be empty".to_string());
    }
    if action.len() > MAX_ACTION_LEN {
        return Err(format!("action must be at most {MAX_ACTION_LEN} characters"));
    }
    Ok(())
}

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn clamp_page_size(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

// ---------------------------------------------------------------------------
// Change-history values
// ---------------------------------------------------------------------------

/// Render a field value as the opaque string stored in change history.
///
/// `null` is stored as SQL `NULL`; strings are stored without quotes;
/// everything else is stored as compact JSON.
pub fn stringify_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Detail redaction
// ---------------------------------------------------------------------------

/// Keys whose values never reach the activity log.
pub const REDACTED_KEYS: &[&str] = &["password", "token", "secret", "api_key", "authorization"];

/// Replace values of credential-looking keys with `"[REDACTED]"`, at any depth.
pub fn redact_details(details: &serde_json::Value) -> serde_json::Value {
    match details {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, val)| {
                    let lower = key.to_lowercase();
                    let val = if REDACTED_KEYS.iter().any(|k| lower.contains(k)) {
                        serde_json::Value::String("[REDACTED]".to_string())
                    } else {
                        redact_details(val)
                    };
                    (key.clone(), val)
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(redact_details).collect())
        }
        other => other.clone(),
    }
}
