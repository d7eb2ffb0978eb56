//! `Database` trait: async interface for job application persistence.
//!
//! Queries go through a small filter/ordering contract so the reconciliation
//! engine never sees SQL and tests can substitute their own store.

use async_trait::async_trait;

use crate::applications::model::{ApplicationPatch, JobApplication, StoredApplication};
use crate::error::DatabaseError;

/// Queryable fields of a job application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    UserId,
    JobId,
    CompanyName,
    ApplicantEmail,
    Role,
    Location,
    Status,
    DateApplied,
}

impl Field {
    /// Document-style path, used in logs.
    pub fn path(&self) -> &'static str {
        match self {
            Self::UserId => "userId",
            Self::JobId => "jobId",
            Self::CompanyName => "companyName",
            Self::ApplicantEmail => "applicantInfo.email",
            Self::Role => "role",
            Self::Location => "location",
            Self::Status => "status",
            Self::DateApplied => "dateApplied",
        }
    }
}

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
    In,
}

/// Right-hand side of a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    List(Vec<String>),
}

/// A single `field op value` condition. All filters of a query are ANDed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: Field,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    pub fn eq(field: Field, value: impl Into<String>) -> Self {
        Self {
            field,
            op: FilterOp::Eq,
            value: FilterValue::Text(value.into()),
        }
    }

    pub fn gte(field: Field, value: impl Into<String>) -> Self {
        Self {
            field,
            op: FilterOp::Gte,
            value: FilterValue::Text(value.into()),
        }
    }

    pub fn lte(field: Field, value: impl Into<String>) -> Self {
        Self {
            field,
            op: FilterOp::Lte,
            value: FilterValue::Text(value.into()),
        }
    }

    pub fn is_in(field: Field, values: Vec<String>) -> Self {
        Self {
            field,
            op: FilterOp::In,
            value: FilterValue::List(values),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: Field,
    pub direction: Direction,
}

impl OrderBy {
    pub fn desc(field: Field) -> Self {
        Self {
            field,
            direction: Direction::Desc,
        }
    }

    pub fn asc(field: Field) -> Self {
        Self {
            field,
            direction: Direction::Asc,
        }
    }
}

/// Backend-agnostic store for job applications and linked accounts.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Job applications ────────────────────────────────────────────

    /// Records matching every filter, optionally ordered.
    ///
    /// Rows that fail strict parsing are skipped and logged.
    async fn query_applications(
        &self,
        filters: &[Filter],
        order_by: Option<OrderBy>,
    ) -> Result<Vec<StoredApplication>, DatabaseError>;

    /// Fetch records by id. Missing ids are silently absent from the result.
    async fn get_applications(
        &self,
        ids: &[String],
    ) -> Result<Vec<StoredApplication>, DatabaseError>;

    /// Insert a new record. Returns the generated id.
    async fn create_application(&self, application: &JobApplication)
    -> Result<String, DatabaseError>;

    /// Merge a partial update into one record.
    async fn update_application(
        &self,
        id: &str,
        patch: &ApplicationPatch,
    ) -> Result<(), DatabaseError>;

    /// Merge partial updates into several records atomically.
    ///
    /// Either every update commits or none does.
    async fn batch_update_applications(
        &self,
        updates: &[(String, ApplicationPatch)],
    ) -> Result<(), DatabaseError>;

    // ── Linked accounts ─────────────────────────────────────────────

    /// Associate a mailbox address with a user.
    async fn link_account(&self, email: &str, user_id: &str) -> Result<(), DatabaseError>;

    /// All mailbox addresses linked to a user.
    async fn linked_emails(&self, user_id: &str) -> Result<Vec<String>, DatabaseError>;
}
