//! Job application data model: status state machine, timeline, records, patches.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder written for applicant fields the classifier cannot supply.
pub const PLACEHOLDER: &str = "placeholder";

/// Format a timestamp the way every stored date is written.
///
/// Millisecond precision with a `Z` suffix, so lexical order of the stored
/// strings matches chronological order.
pub fn iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Status of a job application.
///
/// Any status may follow any other; no forward-only ordering is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Interview,
    Actions,
    Rejected,
    Offer,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Interview => "interview",
            Self::Actions => "actions",
            Self::Rejected => "rejected",
            Self::Offer => "offer",
        }
    }

    /// Whether the application is finished (no further updates expected).
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Rejected | Self::Offer)
    }

    /// Position in the usual hiring funnel, used only for logging regressions.
    fn rank(&self) -> u8 {
        match self {
            Self::Applied => 0,
            Self::Interview | Self::Actions => 1,
            Self::Rejected | Self::Offer => 2,
        }
    }

    /// True when moving to `next` goes backwards in the funnel.
    pub fn is_regression_to(&self, next: ApplicationStatus) -> bool {
        next.rank() < self.rank()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "applied" => Ok(Self::Applied),
            "interview" => Ok(Self::Interview),
            "actions" => Ok(Self::Actions),
            "rejected" => Ok(Self::Rejected),
            "offer" => Ok(Self::Offer),
            other => Err(format!("unknown application status: '{other}'")),
        }
    }
}

/// One entry of an application's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineItem {
    pub date: String,
    pub status: ApplicationStatus,
}

impl TimelineItem {
    pub fn new(date: DateTime<Utc>, status: ApplicationStatus) -> Self {
        Self {
            date: iso(date),
            status,
        }
    }
}

/// Applicant contact details attached to an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantInfo {
    pub name: String,
    pub phone_number: String,
    pub email: String,
    pub cv_url: String,
}

impl ApplicantInfo {
    /// Applicant info known only by email; everything else is a placeholder.
    pub fn for_email(email: impl Into<String>) -> Self {
        Self {
            name: PLACEHOLDER.to_string(),
            phone_number: PLACEHOLDER.to_string(),
            email: email.into(),
            cv_url: PLACEHOLDER.to_string(),
        }
    }
}

/// A persisted job application.
///
/// Created only by an "applied" event; afterwards only mutated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub applicant_info: ApplicantInfo,
    pub company_name: String,
    pub role: String,
    pub location: String,
    pub status: ApplicationStatus,
    pub is_internship: bool,
    pub date_applied: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_interview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_rejected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_offer: Option<String>,
    pub timeline: Vec<TimelineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsured: Option<bool>,
}

impl JobApplication {
    /// A freshly applied-for position with a single-entry timeline.
    pub fn applied(
        user_id: impl Into<String>,
        applicant_email: impl Into<String>,
        company_name: impl Into<String>,
        role: impl Into<String>,
        location: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let status = ApplicationStatus::Applied;
        Self {
            user_id: user_id.into(),
            job_id: None,
            applicant_info: ApplicantInfo::for_email(applicant_email),
            company_name: company_name.into(),
            role: role.into(),
            location: location.into(),
            status,
            is_internship: false,
            date_applied: iso(now),
            date_interview: None,
            date_action: None,
            date_rejected: None,
            date_offer: None,
            timeline: vec![TimelineItem::new(now, status)],
            unsured: None,
        }
    }

    /// Builder: set job id.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Builder: set internship flag.
    pub fn with_internship(mut self, is_internship: bool) -> Self {
        self.is_internship = is_internship;
        self
    }

    /// The last timeline status must equal the current status.
    pub fn timeline_consistent(&self) -> bool {
        self.timeline.last().is_some_and(|t| t.status == self.status)
    }

    /// Apply a patch in place (merge semantics: `None` fields are untouched).
    pub fn merge(&mut self, patch: &ApplicationPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(ref timeline) = patch.timeline {
            self.timeline = timeline.clone();
        }
        if let Some(ref d) = patch.date_interview {
            self.date_interview = Some(d.clone());
        }
        if let Some(ref d) = patch.date_action {
            self.date_action = Some(d.clone());
        }
        if let Some(ref d) = patch.date_rejected {
            self.date_rejected = Some(d.clone());
        }
        if let Some(ref d) = patch.date_offer {
            self.date_offer = Some(d.clone());
        }
        if let Some(unsured) = patch.unsured {
            self.unsured = Some(unsured);
        }
    }
}

/// An application together with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredApplication {
    pub id: String,
    #[serde(flatten)]
    pub application: JobApplication,
}

/// Partial update merged into an existing application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Vec<TimelineItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_interview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_rejected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_offer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsured: Option<bool>,
}

impl ApplicationPatch {
    /// Status transition: append to the existing timeline, set the status and
    /// the status-specific date field. "applied" has no date field to set.
    pub fn transition(
        existing: &JobApplication,
        status: ApplicationStatus,
        now: DateTime<Utc>,
    ) -> Self {
        let date = iso(now);
        let mut timeline = existing.timeline.clone();
        timeline.push(TimelineItem {
            date: date.clone(),
            status,
        });

        let mut patch = Self {
            status: Some(status),
            timeline: Some(timeline),
            ..Default::default()
        };
        match status {
            ApplicationStatus::Applied => {}
            ApplicationStatus::Interview => patch.date_interview = Some(date),
            ApplicationStatus::Actions => patch.date_action = Some(date),
            ApplicationStatus::Rejected => patch.date_rejected = Some(date),
            ApplicationStatus::Offer => patch.date_offer = Some(date),
        }
        patch
    }

    /// Builder: flag the update as heuristically matched.
    pub fn unsured(mut self) -> Self {
        self.unsured = Some(true);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
