//! Email processor: runs one inbound email through extraction,
//! classification and reconciliation.
//!
//! Flow per email:
//! 1. `extract_email_content()` flattens the MIME tree to plain text
//! 2. `Classifier::classify()` asks the oracle what the email is about
//! 3. `Reconciler::reconcile()` applies the event to the store

use tracing::{debug, error, info};

use crate::error::PipelineError;
use crate::mime::extract_email_content;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::reconcile::Reconciler;
use crate::pipeline::types::{InboundEmail, ReconcileOutcome};

/// Drives emails through the pipeline.
pub struct EmailProcessor {
    classifier: Classifier,
    reconciler: Reconciler,
}

impl EmailProcessor {
    pub fn new(classifier: Classifier, reconciler: Reconciler) -> Self {
        Self {
            classifier,
            reconciler,
        }
    }

    /// Process a single email.
    ///
    /// Oracle and store failures propagate; nothing has been written when
    /// the classifier fails.
    pub async fn process(&self, email: &InboundEmail) -> Result<ReconcileOutcome, PipelineError> {
        let text = extract_email_content(email.payload.as_ref());
        debug!(
            message_id = %email.message_id,
            chars = text.len(),
            "Extracted email text"
        );

        let event = self
            .classifier
            .classify(&email.subject, &email.sender, &text)
            .await?;
        debug!(message_id = %email.message_id, event = ?event, "Classified email");

        let outcome = self
            .reconciler
            .reconcile(&event, &email.message_id, &email.user_id, &email.user_email)
            .await?;

        info!(
            message_id = %email.message_id,
            user_id = %email.user_id,
            success = outcome.success,
            action = outcome.action.label(),
            "Email processed"
        );
        Ok(outcome)
    }

    /// Process emails one after another.
    ///
    /// A failing email is logged and reported as a failed outcome; the rest
    /// of the batch is unaffected. Outcomes are in input order.
    pub async fn process_batch(&self, emails: &[InboundEmail]) -> Vec<ReconcileOutcome> {
        let count = emails.len();
        info!(count, "Processing email batch");

        let mut outcomes = Vec::with_capacity(count);
        for email in emails {
            match self.process(email).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(message_id = %email.message_id, error = %e, "Failed to process email");
                    outcomes.push(ReconcileOutcome::failed());
                }
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        info!(succeeded, total = count, "Batch processing complete");
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::ReconcileConfig;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};
    use crate::mime::MessagePart;
    use crate::pipeline::similarity::TitleRanker;
    use crate::pipeline::types::{ReconcileAction, MSG_FAILED};
    use crate::store::{Database, Field, Filter, LibSqlBackend};

    /// Classifier mock that answers based on a keyword in the prompt.
    struct KeywordLlm;

    #[async_trait::async_trait]
    impl LlmProvider for KeywordLlm {
        fn model_name(&self) -> &str {
            "mock-keyword"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let prompt = &request.messages[0].content;
            if prompt.contains("EXPLODE") {
                return Err(LlmError::RequestFailed {
                    provider: "mock".into(),
                    reason: "connection reset".into(),
                });
            }
            let content = if prompt.contains("Thanks for applying") {
                "<category>JobApplicationUpdate</category>\
                 <application_status>applied</application_status>\
                 <company_name>Acme</company_name><role>SWE</role>\
                 <location>Remote</location><is_internship>false</is_internship>"
            } else {
                "<category>OtherEmail</category>"
            };
            Ok(CompletionResponse {
                content: content.to_string(),
                input_tokens: 1,
                output_tokens: 1,
                finish_reason: FinishReason::Stop,
                response_id: None,
            })
        }
    }

    fn email(id: &str, body: &str) -> InboundEmail {
        InboundEmail {
            message_id: id.to_string(),
            user_id: "u1".to_string(),
            user_email: "a@x.com".to_string(),
            subject: "Hello".to_string(),
            sender: "jobs@acme.com".to_string(),
            payload: Some(MessagePart::container(
                "multipart/alternative",
                vec![MessagePart::leaf("text/plain", body.as_bytes())],
            )),
        }
    }

    async fn processor() -> (Arc<LibSqlBackend>, EmailProcessor) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let llm: Arc<dyn LlmProvider> = Arc::new(KeywordLlm);
        let processor = EmailProcessor::new(
            Classifier::new(llm.clone()),
            Reconciler::new(db.clone(), TitleRanker::new(llm), ReconcileConfig::default()),
        );
        (db, processor)
    }

    #[tokio::test]
    async fn applied_email_creates_application() {
        let (db, processor) = processor().await;
        let outcome = processor
            .process(&email("m1", "Thanks for applying to Acme!"))
            .await
            .unwrap();
        assert!(matches!(outcome.action, ReconcileAction::Created { .. }));

        let stored = db
            .query_applications(&[Filter::eq(Field::UserId, "u1")], None)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn oracle_failure_propagates_from_process() {
        let (_db, processor) = processor().await;
        let err = processor.process(&email("m1", "EXPLODE")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Llm(_)));
    }

    #[tokio::test]
    async fn batch_isolates_failures() {
        let (_db, processor) = processor().await;
        let outcomes = processor
            .process_batch(&[
                email("m1", "Weekly newsletter"),
                email("m2", "EXPLODE"),
                email("m3", "Thanks for applying to Acme!"),
            ])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].action, ReconcileAction::Ignored);
        assert!(!outcomes[1].success);
        assert_eq!(outcomes[1].message, MSG_FAILED);
        assert!(matches!(outcomes[2].action, ReconcileAction::Created { .. }));
    }
}
