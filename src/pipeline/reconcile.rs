//! Reconciliation of classified events against stored job applications.
//!
//! 1. Exact match (same user, company, applicant email, role, location and
//!    job id, applied within the exact window): update the most recent one.
//! 2. No exact match and the event is "applied": create a new application.
//! 3. Otherwise look back over the user's recent applications at the same
//!    company and batch-update the plausible ones, flagged `unsured`.
//!
//! Each run is a read-then-write sequence with no isolation against a
//! concurrent run for the same user. Two "applied" emails for the same
//! position processed at the same time can both miss the exact match and
//! create duplicate records. Only the batch update is atomic; the libSQL
//! backend serializes writes so another run's statements never land inside
//! that transaction.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::applications::model::{
    iso, ApplicationPatch, ApplicationStatus, JobApplication, StoredApplication,
};
use crate::config::ReconcileConfig;
use crate::error::PipelineError;
use crate::pipeline::similarity::TitleRanker;
use crate::pipeline::types::{ApplicationUpdate, ClassificationEvent, ReconcileOutcome};
use crate::store::{Database, Field, Filter, OrderBy};

/// Matches classified events to stored applications and mutates them.
pub struct Reconciler {
    db: Arc<dyn Database>,
    ranker: TitleRanker,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(db: Arc<dyn Database>, ranker: TitleRanker, config: ReconcileConfig) -> Self {
        Self { db, ranker, config }
    }

    /// Reconcile one event at the current time.
    pub async fn reconcile(
        &self,
        event: &ClassificationEvent,
        message_id: &str,
        user_id: &str,
        user_email: &str,
    ) -> Result<ReconcileOutcome, PipelineError> {
        self.reconcile_at(event, message_id, user_id, user_email, Utc::now())
            .await
    }

    /// Reconcile one event as if processed at `now`.
    pub async fn reconcile_at(
        &self,
        event: &ClassificationEvent,
        message_id: &str,
        user_id: &str,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, PipelineError> {
        let Some(update) = event.as_update() else {
            debug!(message_id, "Not an application update, nothing to reconcile");
            return Ok(ReconcileOutcome::ignored());
        };

        let status = update.application_status;
        let exact = self.exact_matches(update, user_id, user_email, now).await?;

        // Most recently applied first.
        if let Some(target) = exact.first() {
            log_regression(target, status);
            let patch = ApplicationPatch::transition(&target.application, status, now);
            self.db.update_application(&target.id, &patch).await?;
            info!(
                message_id,
                user_id,
                id = %target.id,
                company = %update.company_name,
                status = %status,
                candidates = exact.len(),
                "Updated application (exact match)"
            );
            return Ok(ReconcileOutcome::updated(target.id.clone()));
        }

        if status == ApplicationStatus::Applied {
            let application = new_application(update, user_id, user_email, now);
            let id = self.db.create_application(&application).await?;
            info!(
                message_id,
                user_id,
                id = %id,
                company = %update.company_name,
                role = %update.role,
                "Created application"
            );
            return Ok(ReconcileOutcome::created(id));
        }

        warn!(
            message_id,
            user_id,
            company = %update.company_name,
            status = %status,
            "Status update without an exact match, searching lookback window"
        );
        let recent = self.lookback_matches(update, user_id, user_email, now).await?;
        if recent.is_empty() {
            warn!(
                message_id,
                user_id,
                company = %update.company_name,
                "No application on record for status update"
            );
            return Ok(ReconcileOutcome::no_match());
        }

        let candidates = self.select_candidates(update, recent).await?;
        let updates: Vec<(String, ApplicationPatch)> = candidates
            .iter()
            .map(|stored| {
                log_regression(stored, status);
                let patch =
                    ApplicationPatch::transition(&stored.application, status, now).unsured();
                (stored.id.clone(), patch)
            })
            .collect();

        if !updates.is_empty() {
            self.db.batch_update_applications(&updates).await?;
        }

        let ids: Vec<String> = updates.into_iter().map(|(id, _)| id).collect();
        info!(
            message_id,
            user_id,
            company = %update.company_name,
            status = %status,
            count = ids.len(),
            "Batch-updated applications (unsured)"
        );
        Ok(ReconcileOutcome::batch_updated(ids))
    }

    async fn exact_matches(
        &self,
        update: &ApplicationUpdate,
        user_id: &str,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredApplication>, PipelineError> {
        let mut filters = vec![
            Filter::eq(Field::UserId, user_id),
            Filter::eq(Field::CompanyName, update.company_name.as_str()),
            Filter::eq(Field::ApplicantEmail, user_email),
            Filter::eq(Field::Role, update.role.as_str()),
            Filter::eq(Field::Location, update.location.as_str()),
            Filter::gte(Field::DateApplied, iso(now - self.config.exact_window)),
        ];
        if !update.job_id.is_empty() {
            filters.push(Filter::eq(Field::JobId, update.job_id.as_str()));
        }

        Ok(self
            .db
            .query_applications(&filters, Some(OrderBy::desc(Field::DateApplied)))
            .await?)
    }

    async fn lookback_matches(
        &self,
        update: &ApplicationUpdate,
        user_id: &str,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredApplication>, PipelineError> {
        let filters = [
            Filter::eq(Field::UserId, user_id),
            Filter::eq(Field::CompanyName, update.company_name.as_str()),
            Filter::eq(Field::ApplicantEmail, user_email),
            Filter::gte(Field::DateApplied, iso(now - self.config.lookback)),
            Filter::lte(Field::DateApplied, iso(now + self.config.lookahead)),
        ];
        Ok(self.db.query_applications(&filters, None).await?)
    }

    /// Narrow lookback records to the ones the update plausibly refers to.
    async fn select_candidates(
        &self,
        update: &ApplicationUpdate,
        recent: Vec<StoredApplication>,
    ) -> Result<Vec<StoredApplication>, PipelineError> {
        if update.role_unknown() {
            return Ok(recent
                .into_iter()
                .filter(|s| !s.application.status.is_closed())
                .collect());
        }

        let titles = distinct_titles(&recent);
        let ranked: HashSet<String> = self
            .ranker
            .rank_similar(&titles, &update.role)
            .await?
            .into_iter()
            .collect();
        debug!(candidates = ?titles, ranked = ?ranked, "Ranked lookback titles");

        // NOTE: `|| status != offer` admits every non-offer record whatever
        // its title, so the ranking only matters for offers. Kept as is
        // pending a product decision on the intended filter.
        Ok(recent
            .into_iter()
            .filter(|s| {
                let app = &s.application;
                (ranked.contains(&normalize_title(&app.role))
                    && app.status != ApplicationStatus::Rejected)
                    || app.status != ApplicationStatus::Offer
            })
            .collect())
    }
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Normalized titles in first-seen order, without duplicates.
fn distinct_titles(records: &[StoredApplication]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|s| normalize_title(&s.application.role))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn new_application(
    update: &ApplicationUpdate,
    user_id: &str,
    user_email: &str,
    now: DateTime<Utc>,
) -> JobApplication {
    JobApplication::applied(
        user_id,
        user_email,
        update.company_name.as_str(),
        update.role.as_str(),
        update.location.as_str(),
        now,
    )
    .with_job_id(update.job_id.as_str())
    .with_internship(update.is_internship)
}

/// Transitions are never refused, only logged when they go backwards.
fn log_regression(stored: &StoredApplication, next: ApplicationStatus) {
    let current = stored.application.status;
    if current.is_regression_to(next) {
        debug!(
            id = %stored.id,
            from = %current,
            to = %next,
            "Application status moves backwards"
        );
    }
}
