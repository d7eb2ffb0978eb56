//! Shared types for the email processing pipeline.

use serde::{Deserialize, Serialize};

use crate::applications::model::ApplicationStatus;
use crate::mime::MessagePart;

/// Value the classifier writes for fields the email does not reveal.
pub const NOT_AVAILABLE: &str = "N/A";

// ── Inbound email ───────────────────────────────────────────────────

/// An email delivered to the pipeline, with the account it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEmail {
    /// Mailbox-native message id.
    pub message_id: String,
    /// Owner of the mailbox.
    #[serde(alias = "uid")]
    pub user_id: String,
    /// Address the email was delivered to.
    pub user_email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    /// Root of the MIME tree.
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

// ── Classification ──────────────────────────────────────────────────

/// What the classifier made of an email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationEvent {
    /// Not about an application. Carries the raw category tag.
    Other { category: String },
    /// Reports a status change of one application.
    JobApplicationUpdate(ApplicationUpdate),
}

impl ClassificationEvent {
    pub fn as_update(&self) -> Option<&ApplicationUpdate> {
        match self {
            Self::JobApplicationUpdate(update) => Some(update),
            Self::Other { .. } => None,
        }
    }
}

/// Fields extracted from an application update email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUpdate {
    pub application_status: ApplicationStatus,
    /// Requisition id, or [`NOT_AVAILABLE`].
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_email: Option<String>,
    pub company_name: String,
    pub role: String,
    /// Defaults to [`NOT_AVAILABLE`].
    pub location: String,
    pub is_internship: bool,
}

impl ApplicationUpdate {
    /// Minimal update; everything unknown is empty or [`NOT_AVAILABLE`].
    pub fn new(
        status: ApplicationStatus,
        company_name: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            application_status: status,
            job_id: NOT_AVAILABLE.to_string(),
            applicant_name: None,
            applicant_phone: None,
            applicant_email: None,
            company_name: company_name.into(),
            role: role.into(),
            location: NOT_AVAILABLE.to_string(),
            is_internship: false,
        }
    }

    /// Builder: set location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Builder: set job id.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self
    }

    /// True when the role is missing or the not-available sentinel.
    pub fn role_unknown(&self) -> bool {
        let role = self.role.trim();
        role.is_empty() || role.eq_ignore_ascii_case(NOT_AVAILABLE)
    }
}

// ── Reconciliation outcome ──────────────────────────────────────────

pub const MSG_IGNORED: &str = "Email did not trigger a job application update.";
pub const MSG_CREATED: &str = "New job application created.";
pub const MSG_UPDATED: &str = "Application updated (exact match).";
pub const MSG_BATCH_UPDATED: &str = "Application status updated for likely matching job applications.";
pub const MSG_NO_MATCH: &str = "Received a status update for a job application that was never recorded.";
pub const MSG_FAILED: &str = "Error processing email.";

/// What reconciliation did to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReconcileAction {
    /// Not an application update.
    Ignored,
    /// Exact match updated.
    Updated { id: String },
    /// New application recorded.
    Created { id: String },
    /// Heuristic matches updated together and flagged unsured.
    BatchUpdated { ids: Vec<String> },
    /// Nothing on record to update.
    NoMatch,
    /// Processing aborted with an error; nothing is known about the store.
    Failed,
}

impl ReconcileAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Updated { .. } => "updated",
            Self::Created { .. } => "created",
            Self::BatchUpdated { .. } => "batch_updated",
            Self::NoMatch => "no_match",
            Self::Failed => "failed",
        }
    }
}

/// Result reported to the caller for one email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub success: bool,
    pub message: String,
    pub action: ReconcileAction,
}

impl ReconcileOutcome {
    pub fn ignored() -> Self {
        Self::ok(MSG_IGNORED, ReconcileAction::Ignored)
    }

    pub fn updated(id: impl Into<String>) -> Self {
        Self::ok(MSG_UPDATED, ReconcileAction::Updated { id: id.into() })
    }

    pub fn created(id: impl Into<String>) -> Self {
        Self::ok(MSG_CREATED, ReconcileAction::Created { id: id.into() })
    }

    pub fn batch_updated(ids: Vec<String>) -> Self {
        Self::ok(MSG_BATCH_UPDATED, ReconcileAction::BatchUpdated { ids })
    }

    pub fn no_match() -> Self {
        Self {
            success: false,
            message: MSG_NO_MATCH.to_string(),
            action: ReconcileAction::NoMatch,
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            message: MSG_FAILED.to_string(),
            action: ReconcileAction::Failed,
        }
    }

    fn ok(message: &str, action: ReconcileAction) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_email_from_camel_case_json() {
        let json = r#"{
            "messageId": "18c1",
            "uid": "u1",
            "userEmail": "a@x.com",
            "subject": "Your application",
            "sender": "jobs@acme.com",
            "payload": {"mimeType": "text/plain", "body": {"data": "aGk"}}
        }"#;
        let email: InboundEmail = serde_json::from_str(json).unwrap();
        assert_eq!(email.user_id, "u1");
        assert_eq!(email.payload.unwrap().mime_type, "text/plain");
    }

    #[test]
    fn inbound_email_without_payload() {
        let json = r#"{"messageId": "m", "userId": "u", "userEmail": "e"}"#;
        let email: InboundEmail = serde_json::from_str(json).unwrap();
        assert!(email.payload.is_none());
        assert_eq!(email.subject, "");
    }

    #[test]
    fn role_unknown_detection() {
        let update = ApplicationUpdate::new(ApplicationStatus::Rejected, "Acme", "");
        assert!(update.role_unknown());
        let update = ApplicationUpdate::new(ApplicationStatus::Rejected, "Acme", " n/a ");
        assert!(update.role_unknown());
        let update = ApplicationUpdate::new(ApplicationStatus::Rejected, "Acme", "SWE");
        assert!(!update.role_unknown());
    }

    #[test]
    fn outcome_serializes_with_action_tag() {
        let json = serde_json::to_value(ReconcileOutcome::created("abc")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], MSG_CREATED);
        assert_eq!(json["action"]["type"], "created");
        assert_eq!(json["action"]["id"], "abc");
    }

    #[test]
    fn failure_outcomes() {
        assert!(!ReconcileOutcome::no_match().success);
        assert!(!ReconcileOutcome::failed().success);
        assert_eq!(ReconcileOutcome::failed().message, MSG_FAILED);
        assert_eq!(ReconcileAction::NoMatch.label(), "no_match");
    }

    #[test]
    fn event_accessor() {
        let other = ClassificationEvent::Other {
            category: "OtherEmail".into(),
        };
        assert!(other.as_update().is_none());
    }
}
