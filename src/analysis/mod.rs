// =============================================================================
// Analysis Generator — candles in, rendered HTML analysis out
// =============================================================================

pub mod openai;
pub mod prompt;
pub mod render;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{AnalysisError, CompletionError};
use crate::types::Candle;

pub use openai::OpenAiClient;

/// Chat-style text completion with one system and one user message.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the text of the top choice.
    async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError>;
}

/// Ask the completion model for a swing-trade read of `candles` and return
/// the answer as an HTML fragment.
#[instrument(skip_all, fields(candles = candles.len()))]
pub async fn analyse(
    client: &dyn CompletionClient,
    candles: &[Candle],
) -> Result<String, AnalysisError> {
    let user_prompt = prompt::build_prompt(candles);
    let answer = client.complete(prompt::SYSTEM_PROMPT, &user_prompt).await?;
    debug!(chars = answer.len(), "analysis received");
    Ok(render::markdown_to_html(&answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candle, StubCompletion};

    #[tokio::test]
    async fn sends_system_and_user_messages() {
        let stub = StubCompletion::replying("**Buy** near support.");
        let candles = vec![candle("2024-01-02T00:00:00+0530", 10.0, 12.0, 9.5, 11.0)];

        let html = analyse(&stub, &candles).await.unwrap();
        assert!(html.contains("<strong>Buy</strong>"));

        let (system, user) = stub.last_request.lock().clone().unwrap();
        assert_eq!(system, "You are a financial trading analyst.");
        assert!(user.contains("2024-01-02 00:00:00+05:30: Open=10, High=12, Low=9.5, Close=11"));
    }

    #[tokio::test]
    async fn completion_failure_is_reported_as_its_own_kind() {
        let stub = StubCompletion::failing();
        let candles = vec![candle("2024-01-02T00:00:00+0530", 1.0, 1.0, 1.0, 1.0)];

        let err = analyse(&stub, &candles).await.unwrap_err();
        assert!(matches!(err, AnalysisError::RemoteCompletion(_)));
    }
}
