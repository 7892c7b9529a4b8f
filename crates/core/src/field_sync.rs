//! Field-level edit notifications and the expiring "someone is editing"
//! indicator map.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, UserId};

/// How long an editing indicator stays visible after the last update.
pub const FIELD_INDICATOR_TTL_MS: u64 = 3_000;

/// Wire event name on a resource's field channel.
pub const FIELD_UPDATE_EVENT: &str = "field_update";

const MAX_FIELD_NAME_LEN: usize = 128;

/// A live edit notification. Best-effort, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub user_id: UserId,
    pub user_name: String,
    pub field: String,
    pub value: serde_json::Value,
    pub timestamp: Timestamp,
}

pub fn validate_field_name(field: &str) -> Result<(), String> {
    if field.trim().is_empty() {
        return Err("field must not be empty".to_string());
    }
    if field.len() > MAX_FIELD_NAME_LEN {
        return Err(format!("field must be at most {MAX_FIELD_NAME_LEN} characters"));
    }
    Ok(())
}

/// Last update per field, each with its own expiry.
///
/// The newest update for a field overwrites the previous one and restarts
/// its timer. Callers pass `now` explicitly so eviction is deterministic.
#[derive(Debug)]
pub struct FieldIndicators {
    ttl: Duration,
    entries: HashMap<String, (FieldUpdate, Instant)>,
}

impl FieldIndicators {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn record(&mut self, update: FieldUpdate, now: Instant) {
        let expires = now + self.ttl;
        self.entries.insert(update.field.clone(), (update, expires));
    }

    /// The live update for `field`, if it has not expired.
    pub fn get(&self, field: &str, now: Instant) -> Option<&FieldUpdate> {
        self.entries
            .get(field)
            .filter(|(_, expires)| *expires > now)
            .map(|(update, _)| update)
    }

    /// All live updates, sorted by field name.
    pub fn active(&self, now: Instant) -> Vec<&FieldUpdate> {
        let mut live: Vec<&FieldUpdate> = self
            .entries
            .values()
            .filter(|(_, expires)| *expires > now)
            .map(|(update, _)| update)
            .collect();
        live.sort_by(|a, b| a.field.cmp(&b.field));
        live
    }

    /// Drop expired entries; returns how many were removed.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, (_, expires)| *expires > now);
        before - self.entries.len()
    }

    /// Earliest pending expiry, for scheduling the next eviction tick.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.entries.values().map(|(_, expires)| *expires).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FieldIndicators {
    fn default() -> Self {
        Self::new(Duration::from_millis(FIELD_INDICATOR_TTL_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(field: &str, value: &str) -> FieldUpdate {
        FieldUpdate {
            user_id: uuid::Uuid::new_v4(),
            user_name: "Ada".into(),
            field: field.into(),
            value: serde_json::Value::String(value.into()),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn indicator_clears_after_ttl() {
        let start = Instant::now();
        let mut map = FieldIndicators::default();
        map.record(update("phone", "555"), start);

        assert!(map.get("phone", start + Duration::from_millis(2_999)).is_some());
        assert!(map.get("phone", start + Duration::from_millis(3_000)).is_none());
        assert_eq!(map.evict_expired(start + Duration::from_secs(3)), 1);
        assert!(map.is_empty());
    }

    #[test]
    fn newer_update_overwrites_and_restarts_timer() {
        let start = Instant::now();
        let mut map = FieldIndicators::default();
        map.record(update("phone", "555"), start);
        map.record(update("phone", "556"), start + Duration::from_secs(2));

        let at = start + Duration::from_secs(4);
        let live = map.get("phone", at).expect("second update still live");
        assert_eq!(live.value, "556");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn active_lists_live_fields_only() {
        let start = Instant::now();
        let mut map = FieldIndicators::new(Duration::from_secs(1));
        map.record(update("name", "a"), start);
        map.record(update("email", "b"), start + Duration::from_millis(800));

        let fields: Vec<_> = map
            .active(start + Duration::from_millis(1_200))
            .into_iter()
            .map(|u| u.field.as_str())
            .collect();
        assert_eq!(fields, vec!["email"]);
        assert_eq!(map.next_expiry(), Some(start + Duration::from_secs(1)));
    }

    #[test]
    fn field_name_validation() {
        assert!(validate_field_name("phone").is_ok());
        assert!(validate_field_name(" ").is_err());
        assert!(validate_field_name(&"f".repeat(129)).is_err());
    }
}
