//! Job title similarity ranking.

use std::sync::Arc;

use tracing::debug;

use crate::error::LlmError;
use crate::llm::prompts::JOB_TITLE_SIMILARITY;
use crate::llm::tags::extract_tag;
use crate::llm::template::substitute;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

const RANK_TEMPERATURE: f32 = 0.0;
const RANK_MAX_TOKENS: u32 = 1024;

/// Target sent when the event carries no role.
const UNKNOWN_TARGET: &str = "n/a";

/// Ranks candidate job titles against a target title.
pub struct TitleRanker {
    llm: Arc<dyn LlmProvider>,
}

impl TitleRanker {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Titles from `candidates` the oracle considers closely related to
    /// `target`, most similar first, lowercased.
    pub async fn rank_similar(
        &self,
        candidates: &[String],
        target: &str,
    ) -> Result<Vec<String>, LlmError> {
        let titles = candidates.join(", ");
        let target = if target.trim().is_empty() {
            UNKNOWN_TARGET
        } else {
            target
        };

        let prompt = substitute(
            JOB_TITLE_SIMILARITY,
            &[("JOB_TITLES_LIST", &titles), ("TARGET_JOB_TITLE", target)],
        );
        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(RANK_TEMPERATURE)
            .with_max_tokens(RANK_MAX_TOKENS);

        let response = self.llm.complete(request).await?;
        debug!(
            model = self.llm.model_name(),
            raw_response = %response.content,
            "Title ranking response"
        );

        Ok(parse_ranked_list(&response.content))
    }
}

/// Comma-separated `<ranked_list>` entries, trimmed and lowercased.
pub fn parse_ranked_list(response: &str) -> Vec<String> {
    let Some(list) = extract_tag(response, "ranked_list") else {
        return Vec::new();
    };
    list.split(',')
        .map(|title| title.trim().to_lowercase())
        .filter(|title| !title.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::llm::{CompletionResponse, FinishReason};

    #[test]
    fn parses_and_normalizes_entries() {
        let response = "<ranked_list>\n Senior Software Engineer, software engineer ,SWE II\n</ranked_list>";
        assert_eq!(
            parse_ranked_list(response),
            vec!["senior software engineer", "software engineer", "swe ii"]
        );
    }

    #[test]
    fn missing_tag_is_empty() {
        assert!(parse_ranked_list("None of these are related.").is_empty());
    }

    #[test]
    fn empty_tag_is_empty() {
        assert!(parse_ranked_list("<ranked_list>\n</ranked_list>").is_empty());
    }

    struct ScriptedLlm {
        response: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "mock-ranker"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.extend(request.messages.into_iter().map(|m| m.content));
            Ok(CompletionResponse {
                content: self.response.clone(),
                input_tokens: 10,
                output_tokens: 5,
                finish_reason: FinishReason::Stop,
                response_id: None,
            })
        }
    }

    #[tokio::test]
    async fn prompt_lists_candidates_and_target() {
        let llm = Arc::new(ScriptedLlm {
            response: "<ranked_list>backend engineer</ranked_list>".into(),
            prompts: Mutex::new(Vec::new()),
        });
        let ranker = TitleRanker::new(llm.clone());

        let ranked = ranker
            .rank_similar(
                &["backend engineer".into(), "data analyst".into()],
                "Software Engineer",
            )
            .await
            .unwrap();
        assert_eq!(ranked, vec!["backend engineer"]);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("backend engineer, data analyst"));
        assert!(prompts[0].contains("<target_job_title>\nSoftware Engineer\n</target_job_title>"));
    }

    #[tokio::test]
    async fn empty_target_becomes_na() {
        let llm = Arc::new(ScriptedLlm {
            response: String::new(),
            prompts: Mutex::new(Vec::new()),
        });
        let ranked = TitleRanker::new(llm.clone())
            .rank_similar(&["x".into()], "  ")
            .await
            .unwrap();
        assert!(ranked.is_empty());
        assert!(llm.prompts.lock().unwrap()[0].contains("<target_job_title>\nn/a\n</target_job_title>"));
    }
}
