//! Email classification: decides whether an email is an application update
//! and extracts its fields.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::applications::model::ApplicationStatus;
use crate::error::LlmError;
use crate::llm::prompts::EMAIL_CLASSIFICATION;
use crate::llm::tags::{extract_non_empty, extract_tag};
use crate::llm::template::substitute;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::{ApplicationUpdate, ClassificationEvent, NOT_AVAILABLE};

/// Category tag value marking an application update.
const UPDATE_CATEGORY: &str = "JobApplicationUpdate";

const CLASSIFY_TEMPERATURE: f32 = 0.0;
const CLASSIFY_MAX_TOKENS: u32 = 512;

/// Classification client over an LLM provider.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Classify one email. Oracle failures propagate; there is no retry.
    pub async fn classify(
        &self,
        subject: &str,
        sender: &str,
        text: &str,
    ) -> Result<ClassificationEvent, LlmError> {
        let prompt = substitute(
            EMAIL_CLASSIFICATION,
            &[("SUBJECT", subject), ("SENDER", sender), ("TEXT", text)],
        );

        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(CLASSIFY_TEMPERATURE)
            .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        debug!(
            model = self.llm.model_name(),
            raw_response = %response.content,
            "Classification response"
        );

        parse_classification(&response.content).map_err(|reason| {
            warn!(raw_response = %response.content, reason = %reason, "Unusable classification");
            LlmError::InvalidResponse {
                provider: self.llm.model_name().to_string(),
                reason,
            }
        })
    }
}

/// Parse a tagged classification response.
///
/// Missing tags are not errors. The only failure is an update whose status
/// is not one of the known statuses.
pub fn parse_classification(response: &str) -> Result<ClassificationEvent, String> {
    let category = extract_tag(response, "category").unwrap_or_default();
    if !category.contains(UPDATE_CATEGORY) {
        return Ok(ClassificationEvent::Other { category });
    }

    let status_text = extract_tag(response, "application_status").unwrap_or_default();
    let application_status: ApplicationStatus = status_text.parse()?;

    let job_id = extract_non_empty(response, "job_id")
        .filter(|id| id != NOT_AVAILABLE)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let is_internship = extract_tag(response, "is_internship").is_some_and(|v| v == "true");

    Ok(ClassificationEvent::JobApplicationUpdate(ApplicationUpdate {
        application_status,
        job_id,
        applicant_name: extract_tag(response, "applicant_name"),
        applicant_phone: extract_tag(response, "applicant_phone"),
        applicant_email: extract_tag(response, "applicant_email"),
        company_name: extract_tag(response, "company_name").unwrap_or_default(),
        role: extract_tag(response, "role").unwrap_or_default(),
        location: extract_non_empty(response, "location")
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        is_internship,
    }))
}
