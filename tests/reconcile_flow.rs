//! End-to-end tests: MIME payload → extraction → classification →
//! reconciliation → libSQL store.
//!
//! The oracle is a stub that answers from keywords in the prompt, so every
//! test runs offline against an in-memory database.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use job_tracker::applications::{ApplicationPatch, ApplicationStatus, JobApplication};
use job_tracker::config::ReconcileConfig;
use job_tracker::error::LlmError;
use job_tracker::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
use job_tracker::mime::MessagePart;
use job_tracker::pipeline::{
    Classifier, EmailProcessor, InboundEmail, ReconcileAction, Reconciler, TitleRanker,
};
use job_tracker::store::{Database, Field, Filter, LibSqlBackend};

/// Stub oracle. Classification answers depend on marker words in the email
/// body; similarity requests always rank "platform engineer" first.
struct StubOracle {
    similarity_calls: AtomicUsize,
}

impl StubOracle {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            similarity_calls: AtomicUsize::new(0),
        })
    }
}

fn update_response(status: &str, role: &str, location: &str) -> String {
    format!(
        "<category>JobApplicationUpdate</category>\n\
         <application_status>{status}</application_status>\n\
         <job_id>N/A</job_id>\n\
         <company_name>Acme</company_name>\n\
         <role>{role}</role>\n\
         <location>{location}</location>\n\
         <is_internship>false</is_internship>"
    )
}

#[async_trait]
impl LlmProvider for StubOracle {
    fn model_name(&self) -> &str {
        "stub-oracle"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let content = if prompt.contains("<job_titles_list>") {
            self.similarity_calls.fetch_add(1, Ordering::SeqCst);
            "<ranked_list>platform engineer</ranked_list>".to_string()
        } else if prompt.contains("ORACLE_DOWN") {
            return Err(LlmError::RequestFailed {
                provider: "stub".into(),
                reason: "503 Service Unavailable".into(),
            });
        } else if prompt.contains("received your application") {
            update_response("applied", "Platform Engineer", "Remote")
        } else if prompt.contains("schedule an interview") {
            update_response("interview", "Platform Engineer", "Remote")
        } else if prompt.contains("not moving forward") {
            update_response("rejected", "N/A", "N/A")
        } else if prompt.contains("coding assessment") {
            update_response("actions", "Infra Engineer", "Berlin")
        } else if prompt.contains("pleased to offer") {
            update_response("offer", "Platform Engineer", "Remote")
        } else {
            "<category>OtherEmail</category>".to_string()
        };

        Ok(CompletionResponse {
            content,
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}

struct Harness {
    db: Arc<LibSqlBackend>,
    oracle: Arc<StubOracle>,
    processor: EmailProcessor,
}

async fn harness() -> Harness {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let oracle = StubOracle::new();
    let processor = EmailProcessor::new(
        Classifier::new(oracle.clone()),
        Reconciler::new(
            db.clone(),
            TitleRanker::new(oracle.clone()),
            ReconcileConfig::default(),
        ),
    );
    Harness {
        db,
        oracle,
        processor,
    }
}

/// Gmail-style multipart/alternative email with plain and HTML bodies.
fn email(message_id: &str, body: &str) -> InboundEmail {
    let html = format!("<html><body><p>{body}</p><script>track()</script></body></html>");
    InboundEmail {
        message_id: message_id.to_string(),
        user_id: "u1".to_string(),
        user_email: "dev@example.com".to_string(),
        subject: "About your application".to_string(),
        sender: "talent@acme.com".to_string(),
        payload: Some(MessagePart::container(
            "multipart/mixed",
            vec![
                MessagePart::container(
                    "multipart/alternative",
                    vec![
                        MessagePart::leaf("text/plain", body.as_bytes()),
                        MessagePart::leaf("text/html", html.as_bytes()),
                    ],
                ),
                MessagePart::leaf("image/png", &[0x89, 0x50, 0x4e, 0x47]).with_filename("logo.png"),
            ],
        )),
    }
}

async fn seed(db: &LibSqlBackend, role: &str, status: ApplicationStatus, days_ago: i64) -> String {
    let applied = Utc::now() - Duration::days(days_ago);
    let mut app =
        JobApplication::applied("u1", "dev@example.com", "Acme", role, "Remote", applied)
            .with_job_id("N/A");
    if status != ApplicationStatus::Applied {
        let patch = ApplicationPatch::transition(&app, status, applied);
        app.merge(&patch);
    }
    db.create_application(&app).await.unwrap()
}

async fn user_records(db: &LibSqlBackend) -> Vec<job_tracker::applications::StoredApplication> {
    db.query_applications(&[Filter::eq(Field::UserId, "u1")], None)
        .await
        .unwrap()
}

#[tokio::test]
async fn applied_then_interview_updates_same_record() {
    let h = harness().await;

    let created = h
        .processor
        .process(&email("m1", "We have received your application for Platform Engineer."))
        .await
        .unwrap();
    assert!(created.success);
    let ReconcileAction::Created { id } = created.action else {
        panic!("expected creation");
    };

    let updated = h
        .processor
        .process(&email("m2", "We'd like to schedule an interview with you."))
        .await
        .unwrap();
    assert_eq!(updated.action, ReconcileAction::Updated { id: id.clone() });

    let records = user_records(&h.db).await;
    assert_eq!(records.len(), 1);
    let app = &records[0].application;
    assert_eq!(app.status, ApplicationStatus::Interview);
    assert_eq!(app.timeline.len(), 2);
    assert!(app.date_interview.is_some());
    assert!(app.unsured.is_none());
    assert!(app.timeline_consistent());
    assert_eq!(h.oracle.similarity_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejection_without_role_updates_open_lookback_records() {
    let h = harness().await;
    let open = seed(&h.db, "Platform Engineer", ApplicationStatus::Interview, 30).await;
    let other_open = seed(&h.db, "Data Engineer", ApplicationStatus::Applied, 90).await;
    let already_rejected = seed(&h.db, "SRE", ApplicationStatus::Rejected, 40).await;
    let offered = seed(&h.db, "Backend Engineer", ApplicationStatus::Offer, 20).await;

    let outcome = h
        .processor
        .process(&email("m3", "Unfortunately we are not moving forward."))
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(matches!(outcome.action, ReconcileAction::BatchUpdated { ref ids } if ids.len() == 2));
    assert_eq!(h.oracle.similarity_calls.load(Ordering::SeqCst), 0);

    for stored in user_records(&h.db).await {
        let app = &stored.application;
        if stored.id == open || stored.id == other_open {
            assert_eq!(app.status, ApplicationStatus::Rejected);
            assert_eq!(app.unsured, Some(true));
            assert!(app.date_rejected.is_some());
        } else {
            assert!(stored.id == already_rejected || stored.id == offered);
            assert!(app.unsured.is_none());
        }
    }
}

#[tokio::test]
async fn known_role_without_exact_match_consults_ranker() {
    let h = harness().await;
    seed(&h.db, "Platform Engineer", ApplicationStatus::Applied, 10).await;
    let offered = seed(&h.db, "Sales Lead", ApplicationStatus::Offer, 12).await;

    // Role and location differ from the stored records, so no exact match.
    let outcome = h
        .processor
        .process(&email("m4", "Please complete the coding assessment by Friday."))
        .await
        .unwrap();
    assert_eq!(h.oracle.similarity_calls.load(Ordering::SeqCst), 1);

    let ReconcileAction::BatchUpdated { ids } = outcome.action else {
        panic!("expected batch update");
    };
    assert_eq!(ids.len(), 1);
    assert!(!ids.contains(&offered));

    let updated = h.db.get_applications(&ids).await.unwrap();
    assert_eq!(updated[0].application.status, ApplicationStatus::Actions);
    assert!(updated[0].application.date_action.is_some());
}

#[tokio::test]
async fn offer_for_unknown_application_fails_without_mutation() {
    let h = harness().await;
    let stale = seed(&h.db, "Platform Engineer", ApplicationStatus::Applied, 365).await;

    let outcome = h
        .processor
        .process(&email("m5", "We are pleased to offer you the position."))
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.action, ReconcileAction::NoMatch);

    let records = user_records(&h.db).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, stale);
    assert_eq!(records[0].application.status, ApplicationStatus::Applied);
    assert_eq!(records[0].application.timeline.len(), 1);
}

#[tokio::test]
async fn unrelated_email_is_ignored() {
    let h = harness().await;
    let outcome = h
        .processor
        .process(&email("m6", "Top 10 jobs picked for you this week"))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.action, ReconcileAction::Ignored);
    assert!(user_records(&h.db).await.is_empty());
}

#[tokio::test]
async fn batch_continues_after_oracle_failure() {
    let h = harness().await;
    let outcomes = h
        .processor
        .process_batch(&[
            email("m7", "ORACLE_DOWN"),
            email("m8", "We have received your application for Platform Engineer."),
        ])
        .await;

    assert!(!outcomes[0].success);
    assert_eq!(outcomes[0].message, "Error processing email.");
    assert!(outcomes[1].success);
    assert_eq!(user_records(&h.db).await.len(), 1);
}

#[tokio::test]
async fn inbound_email_json_drives_pipeline() {
    let h = harness().await;
    let json = serde_json::json!({
        "messageId": "m9",
        "uid": "u1",
        "userEmail": "dev@example.com",
        "subject": "Thanks",
        "sender": "no-reply@acme.com",
        "payload": {
            "mimeType": "text/plain",
            // "We received your application"
            "body": {"data": "V2UgcmVjZWl2ZWQgeW91ciBhcHBsaWNhdGlvbg"}
        }
    });
    let inbound: InboundEmail = serde_json::from_value(json).unwrap();
    let outcome = h.processor.process(&inbound).await.unwrap();
    assert!(matches!(outcome.action, ReconcileAction::Created { .. }));
}
