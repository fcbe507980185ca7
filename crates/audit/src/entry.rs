use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action name written for every dispatched catalog command.
pub const EXECUTE_COMMAND: &str = "execute_command";

/// One authorization decision.
///
/// `role` is kept as the raw string the caller presented so that denials of
/// unrecognised roles can be recorded too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub role: String,
    pub action: String,
    pub resource: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEntry {
    pub fn allowed(
        user_id: impl Into<String>,
        role: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: user_id.into(),
            role: role.into(),
            action: action.into(),
            resource: resource.into(),
            allowed: true,
            reason: None,
        }
    }

    pub fn denied(
        user_id: impl Into<String>,
        role: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            ..Self::allowed(user_id, role, action, resource)
        }
    }
}

/// Conjunctive filter; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub allowed: Option<bool>,
}

impl AuditFilter {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn allowed(mut self, allowed: bool) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.user_id.as_deref().map_or(true, |u| u == entry.user_id)
            && self.action.as_deref().map_or(true, |a| a == entry.action)
            && self.allowed.map_or(true, |a| a == entry.allowed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_carries_reason() {
        let entry = AuditEntry::denied("u1", "analyst", EXECUTE_COMMAND, "pov_create", "insufficient role permissions");
        assert!(!entry.allowed);
        assert_eq!(entry.reason.as_deref(), Some("insufficient role permissions"));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let entry = AuditEntry::allowed("u1", "dc", EXECUTE_COMMAND, "pov_list");
        assert!(AuditFilter::default().matches(&entry));
        assert!(AuditFilter::user("u1").action(EXECUTE_COMMAND).matches(&entry));
        assert!(!AuditFilter::user("u1").allowed(false).matches(&entry));
        assert!(!AuditFilter::user("u2").matches(&entry));
    }

    #[test]
    fn test_reason_omitted_when_allowed() {
        let entry = AuditEntry::allowed("u1", "dc", EXECUTE_COMMAND, "pov_list");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("reason").is_none());
        let back: AuditEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
