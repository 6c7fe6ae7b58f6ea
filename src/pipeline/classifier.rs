//! Classifier: asks the model whether a message is a trading signal.
//!
//! The model either reformats the signal or answers with the `IGNORE`
//! sentinel. Only the sentinel is checked here; the shape of an accepted
//! payload is left to the instruction prompt.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::ClassificationError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::{Verdict, preview};

/// Literal the model returns for noise.
pub const IGNORE_SENTINEL: &str = "IGNORE";

/// Default bound on one model call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Classifier tuning.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub temperature: f32,
    pub timeout: Duration,
    pub max_tokens: Option<u32>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            timeout: DEFAULT_TIMEOUT,
            max_tokens: None,
        }
    }
}

/// Wraps one model call per message.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(llm: Arc<dyn LlmProvider>, config: ClassifierConfig) -> Self {
        Self { llm, config }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Classify one message.
    ///
    /// A timeout or backend failure is an error, never a `Rejected` verdict.
    pub async fn classify(
        &self,
        text: &str,
        source_label: &str,
    ) -> Result<Verdict, ClassificationError> {
        let mut request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_user_prompt(text, source_label)),
        ])
        .with_temperature(self.config.temperature);
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = tokio::time::timeout(self.config.timeout, self.llm.complete(request))
            .await
            .map_err(|_| ClassificationError::Timeout {
                after: self.config.timeout,
            })??;

        debug!(
            source = %source_label,
            model = %self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            response = %preview(&response.content, 200),
            "Model response"
        );

        interpret_response(&response.content)
    }
}

/// Map raw model output to a verdict.
///
/// Exact (trimmed, case-insensitive) `IGNORE` rejects; any other non-empty
/// text is accepted verbatim.
pub fn interpret_response(raw: &str) -> Result<Verdict, ClassificationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClassificationError::EmptyResponse);
    }
    if trimmed.eq_ignore_ascii_case(IGNORE_SENTINEL) {
        return Ok(Verdict::Rejected);
    }
    Ok(Verdict::Accepted {
        formatted_payload: trimmed.to_string(),
    })
}

// ── Prompt construction ─────────────────────────────────────────────

/// Fixed rule set sent as the system turn.
pub fn build_system_prompt() -> String {
    "You are an expert trading signal filter. Extract only valid forex/crypto trading signals.\n\n\
     VALID SIGNAL CRITERIA:\n\
     - Must contain a trading pair (e.g., XAU/USD, EUR/USD, BTC/USD)\n\
     - Must have clear entry price\n\
     - Must have stop loss (SL)\n\
     - Must have at least one take profit (TP)\n\
     - Must specify action: BUY or SELL\n\n\
     If it's a valid signal, return in this format:\n\
     🚨 SIGNAL DETECTED 🚨\n\n\
     Pair: [trading pair]\n\
     Action: [BUY or SELL]\n\
     Entry: [entry price]\n\
     SL: [stop loss]\n\
     TPs: [list all TPs, e.g., TP1 xxx, TP2 xxx, ...]\n\
     Risk: [risk percentage if mentioned]\n\n\
     If the message is promotional, testimonial, invitation to paid groups, or doesn't \
     contain clear trading parameters, return exactly: IGNORE\n\n\
     Examples:\n\
     - \"Join our VIP group\" → IGNORE\n\
     - \"Great signals!\" → IGNORE\n\
     - \"BUY XAU/USD at 2330, SL 2325, TP1 2340, TP2 2350\" → [SIGNAL] format"
        .to_string()
}

/// User turn carrying the source label and message text.
pub fn build_user_prompt(text: &str, source_label: &str) -> String {
    format!("Channel: {source_label}\nMessage: {text}")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::provider::CompletionResponse;

    /// Mock LLM that returns a fixed completion and records the request.
    struct MockLlm {
        response: Result<String, fn() -> LlmError>,
        delay: Duration,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl MockLlm {
        fn replying(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                delay: Duration::ZERO,
                last_request: Mutex::new(None),
            }
        }

        fn failing(err: fn() -> LlmError) -> Self {
            Self {
                response: Err(err),
                delay: Duration::ZERO,
                last_request: Mutex::new(None),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::replying("IGNORE")
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock-classifier"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.last_request.lock().unwrap() = Some(request);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.response {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                    input_tokens: 100,
                    output_tokens: 20,
                }),
                Err(make) => Err(make()),
            }
        }
    }

    fn classifier(llm: MockLlm) -> (Classifier, Arc<MockLlm>) {
        let llm = Arc::new(llm);
        let classifier = Classifier::new(
            llm.clone(),
            ClassifierConfig {
                temperature: 0.4,
                timeout: Duration::from_millis(50),
                max_tokens: None,
            },
        );
        (classifier, llm)
    }

    // ── Sentinel handling ───────────────────────────────────────────

    #[test]
    fn sentinel_variants_reject() {
        for raw in ["IGNORE", "ignore", " Ignore ", "\nIGNORE\n\t", "iGnOrE"] {
            assert_eq!(interpret_response(raw).unwrap(), Verdict::Rejected, "{raw:?}");
        }
    }

    #[test]
    fn sentinel_must_be_exact() {
        let verdict = interpret_response("IGNORE this one").unwrap();
        assert!(verdict.is_accepted());
    }

    #[test]
    fn accepted_payload_is_trimmed_but_otherwise_verbatim() {
        let raw = "\n🚨 SIGNAL DETECTED 🚨\n\nPair: XAU/USD\nAction: BUY\n";
        match interpret_response(raw).unwrap() {
            Verdict::Accepted { formatted_payload } => {
                assert_eq!(formatted_payload, "🚨 SIGNAL DETECTED 🚨\n\nPair: XAU/USD\nAction: BUY");
            }
            other => panic!("Expected Accepted, got {other:?}"),
        }
    }

    #[test]
    fn empty_response_is_an_error() {
        assert!(matches!(
            interpret_response("   "),
            Err(ClassificationError::EmptyResponse)
        ));
    }

    // ── Prompt construction ─────────────────────────────────────────

    #[test]
    fn system_prompt_names_required_fields() {
        let prompt = build_system_prompt();
        for needle in ["trading pair", "entry", "stop loss", "take profit", "BUY or SELL", "IGNORE"] {
            assert!(prompt.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn user_prompt_carries_label_and_text() {
        let prompt = build_user_prompt("BUY XAU/USD", "FX-Room");
        assert_eq!(prompt, "Channel: FX-Room\nMessage: BUY XAU/USD");
    }

    // ── Classifier with mock LLM ────────────────────────────────────

    #[tokio::test]
    async fn classify_sends_system_and_user_turns() {
        let (classifier, llm) = classifier(MockLlm::replying("IGNORE"));
        let verdict = classifier.classify("Join our VIP group now!", "Promo-Room").await.unwrap();
        assert_eq!(verdict, Verdict::Rejected);

        let request = llm.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert!(request.system_prompt().unwrap().contains("VALID SIGNAL CRITERIA"));
        assert!(request.last_user_message().unwrap().contains("Promo-Room"));
        assert_eq!(request.temperature, Some(0.4));
    }

    #[tokio::test]
    async fn classify_accepts_formatted_signal() {
        let (classifier, _) = classifier(MockLlm::replying(
            "🚨 SIGNAL DETECTED 🚨\n\nPair: XAU/USD\nAction: BUY\nEntry: 2330\nSL: 2325\nTPs: TP1 2340",
        ));
        let verdict = classifier.classify("BUY XAU/USD ...", "FX-Room").await.unwrap();
        assert!(verdict.is_accepted());
    }

    #[tokio::test]
    async fn classify_timeout_is_not_rejection() {
        let (classifier, _) = classifier(MockLlm::slow(Duration::from_millis(500)));
        let err = classifier.classify("anything", "FX-Room").await.unwrap_err();
        match err {
            ClassificationError::Timeout { after } => {
                assert_eq!(after, Duration::from_millis(50))
            }
            other => panic!("Expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn classify_backend_failure_is_not_rejection() {
        let (classifier, _) = classifier(MockLlm::failing(|| LlmError::Rejected {
            provider: "mock".into(),
            reason: "HTTP 503: overloaded".into(),
        }));
        let err = classifier.classify("anything", "FX-Room").await.unwrap_err();
        assert!(matches!(
            err,
            ClassificationError::Backend(LlmError::Rejected { ref reason, .. }) if reason.contains("503")
        ));
    }

    #[tokio::test]
    async fn classify_sends_configured_max_tokens() {
        let llm = Arc::new(MockLlm::replying("IGNORE"));
        let classifier = Classifier::new(
            llm.clone(),
            ClassifierConfig {
                max_tokens: Some(300),
                ..Default::default()
            },
        );
        classifier.classify("Great signals!", "Promo-Room").await.unwrap();

        let request = llm.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.max_tokens, Some(300));
    }

    #[tokio::test]
    async fn classify_is_stable_under_sentinel_whitespace() {
        for raw in ["IGNORE", "ignore\n", "  Ignore  "] {
            let (classifier, _) = classifier(MockLlm::replying(raw));
            let verdict = classifier.classify("Great signals!", "Promo-Room").await.unwrap();
            assert_eq!(verdict, Verdict::Rejected);
        }
    }
}
