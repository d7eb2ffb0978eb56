//! Read-side queries: listing applications and linked mailbox addresses.

use serde::Serialize;
use tracing::{error, info};

use crate::applications::model::StoredApplication;
use crate::error::DatabaseError;
use crate::store::{Database, Field, Filter, OrderBy};

pub const MSG_LISTED: &str = "Job applications retrieved successfully";
pub const MSG_LIST_FAILED: &str = "Error retrieving job applications";

/// Which applications to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationSelector {
    ByIds(Vec<String>),
    ByUser(String),
    ByUsers(Vec<String>),
}

impl ApplicationSelector {
    /// Pick a selector from loosely specified request parameters.
    ///
    /// Non-empty `ids` win, then a non-empty `user_id`, then non-empty
    /// `user_ids`. Returns `None` when nothing usable was given.
    pub fn from_parts(
        ids: &[String],
        user_id: Option<&str>,
        user_ids: &[String],
    ) -> Option<Self> {
        if !ids.is_empty() {
            return Some(Self::ByIds(ids.to_vec()));
        }
        if let Some(uid) = user_id.filter(|u| !u.is_empty()) {
            return Some(Self::ByUser(uid.to_string()));
        }
        if !user_ids.is_empty() {
            return Some(Self::ByUsers(user_ids.to_vec()));
        }
        None
    }
}

/// Response envelope for a listing request.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationList {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<StoredApplication>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// List applications. Store errors are reported in the envelope, not returned.
///
/// User listings come back oldest application first; id lookups keep the
/// store's order.
pub async fn list_applications(
    db: &dyn Database,
    selector: &ApplicationSelector,
) -> ApplicationList {
    let oldest_first = Some(OrderBy::asc(Field::DateApplied));
    let result = match selector {
        ApplicationSelector::ByIds(ids) => db.get_applications(ids).await,
        ApplicationSelector::ByUser(uid) => {
            db.query_applications(&[Filter::eq(Field::UserId, uid.as_str())], oldest_first)
                .await
        }
        ApplicationSelector::ByUsers(uids) => {
            db.query_applications(&[Filter::is_in(Field::UserId, uids.clone())], oldest_first)
                .await
        }
    };

    match result {
        Ok(data) => {
            info!(count = data.len(), selector = ?selector, "Listed job applications");
            ApplicationList {
                success: true,
                message: MSG_LISTED.to_string(),
                data: Some(data),
                error: None,
            }
        }
        Err(e) => {
            error!(selector = ?selector, error = %e, "Failed to list job applications");
            ApplicationList {
                success: false,
                message: MSG_LIST_FAILED.to_string(),
                data: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Mailbox addresses linked to a user.
pub async fn linked_emails_for_user(
    db: &dyn Database,
    user_id: &str,
) -> Result<Vec<String>, DatabaseError> {
    db.linked_emails(user_id).await
}
