use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status given to a ticket created without one.
pub const DEFAULT_STATUS: &str = "New";

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

/// Create payload for a repair ticket.
///
/// `created_by` is deliberately absent: authorship is derived from the caller
/// context, so a client-supplied value is dropped during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRepair {
    /// Name or type of the item that needs repair, e.g. `Laptop` or `Printer`.
    pub item: String,
    /// Short description of the reported issue.
    pub description: String,
    /// Current status such as `New`, `In Progress` or `Completed`.
    #[serde(default = "default_status")]
    pub status: String,
    /// Person or team the repair is assigned to.
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl NewRepair {
    /// Payload with the default status and no assignee.
    pub fn new(item: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            description: description.into(),
            status: default_status(),
            assigned_to: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    #[must_use]
    pub fn with_assignee(mut self, assigned_to: impl Into<String>) -> Self {
        self.assigned_to = Some(assigned_to.into());
        self
    }
}

/// A persisted repair ticket. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairTicket {
    pub id: String,
    pub item: String,
    pub description: String,
    pub status: String,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl RepairTicket {
    /// Build a ticket from a payload with a fresh identifier.
    ///
    /// `created_at` is supplied by the caller so that the clock read happens
    /// exactly once per create.
    #[must_use]
    pub fn from_new(new: NewRepair, created_by: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            item: new.item,
            description: new.description,
            status: new.status,
            assigned_to: new.assigned_to,
            created_at,
            created_by: Some(created_by),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_repair_defaults_status_when_absent() {
        let payload: NewRepair =
            serde_json::from_str(r#"{"item":"Laptop","description":"Screen is flickering"}"#)
                .expect("parse payload");
        assert_eq!(payload.status, "New");
        assert!(payload.assigned_to.is_none());
    }

    #[test]
    fn new_repair_ignores_client_created_by() {
        let payload: NewRepair = serde_json::from_str(
            r#"{"item":"Printer","description":"Jam","created_by":"mallory"}"#,
        )
        .expect("parse payload");
        let json = serde_json::to_value(&payload).expect("serialize");
        assert!(json.get("created_by").is_none());
    }

    #[test]
    fn from_new_generates_distinct_ids() {
        let now = Utc::now();
        let a = RepairTicket::from_new(NewRepair::new("Laptop", "x"), "T1".into(), now);
        let b = RepairTicket::from_new(NewRepair::new("Laptop", "x"), "T1".into(), now);
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
        assert_eq!(a.created_by.as_deref(), Some("T1"));
    }

    #[test]
    fn ticket_serializes_rfc3339_and_null_assignee() {
        let created_at = DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
            .expect("parse ts")
            .with_timezone(&Utc);
        let ticket =
            RepairTicket::from_new(NewRepair::new("Laptop", "x"), "unknown".into(), created_at);
        let json = serde_json::to_value(&ticket).expect("serialize");
        assert_eq!(json["created_at"], "2025-01-02T03:04:05Z");
        assert!(json["assigned_to"].is_null());
        assert_eq!(json["status"], "New");
    }
}
