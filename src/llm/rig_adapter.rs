//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::completion::message::AssistantContent;
use rig::completion::{CompletionError, CompletionModel};

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// Wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request.last_user_message().unwrap_or_default().to_string();

        let mut builder = self.model.completion_request(prompt);
        if let Some(system) = request.system_prompt() {
            builder = builder.preamble(system.to_string());
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_completion_error(&self.model_name, e))?;

        let content = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let input_tokens = saturate(response.usage.input_tokens);
        let output_tokens = saturate(response.usage.output_tokens);
        tracing::debug!(
            model = %self.model_name,
            input_tokens,
            output_tokens,
            "Completion received"
        );

        Ok(CompletionResponse {
            content: content.trim().to_string(),
            input_tokens,
            output_tokens,
        })
    }
}

fn saturate(tokens: u64) -> u32 {
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

fn map_completion_error(model: &str, err: CompletionError) -> LlmError {
    match err {
        CompletionError::ProviderError(reason) => LlmError::Rejected {
            provider: model.to_string(),
            reason,
        },
        other => LlmError::RequestFailed {
            provider: model.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_is_a_rejection() {
        let err = map_completion_error(
            "gpt-4o-mini",
            CompletionError::ProviderError("invalid_api_key".into()),
        );
        match err {
            LlmError::Rejected { provider, reason } => {
                assert_eq!(provider, "gpt-4o-mini");
                assert_eq!(reason, "invalid_api_key");
            }
            other => panic!("Expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn other_errors_are_request_failures() {
        let err = map_completion_error(
            "gpt-4o-mini",
            CompletionError::ResponseError("no content".into()),
        );
        assert!(matches!(err, LlmError::RequestFailed { .. }));
        assert!(err.to_string().contains("no content"));
    }

    #[test]
    fn token_counts_saturate() {
        assert_eq!(saturate(42), 42);
        assert_eq!(saturate(u64::MAX), u32::MAX);
    }
}
