use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use food_monitor_core::analysis::{AnalysisGateway, ChatMessage, extract_content};

use crate::config::Settings;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

/// Chat-completions client used as the analysis gateway.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    api_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("food-monitor/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            api_url: settings.api_url.clone(),
        })
    }
}

impl AnalysisGateway for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        };
        debug!(model = %self.model, url = %self.api_url, "sending analysis request");

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to reach the analysis API")?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("Failed to read the analysis response")?;
        if !status.is_success() {
            bail!("{}", error_message(status, &body));
        }

        let payload: Value =
            serde_json::from_str(&body).context("Analysis response is not valid JSON")?;
        Ok(extract_content(&payload))
    }
}

/// The response body text, or a generic message when the body is empty.
fn error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("Failed to analyze (HTTP {status})")
    } else {
        format!("Failed to analyze (HTTP {status}): {body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use food_monitor_core::analysis::{AnalysisInput, build_messages, parse_analysis};
    use food_monitor_core::models::GoalState;

    #[test]
    fn test_error_message_carries_body() {
        let msg = error_message(
            StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "Incorrect API key provided"}}"#,
        );
        assert!(msg.contains("401"));
        assert!(msg.contains("Incorrect API key provided"));
    }

    #[test]
    fn test_error_message_empty_body() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "  "),
            "Failed to analyze (HTTP 502 Bad Gateway)"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let messages = build_messages(
            &AnalysisInput {
                text: Some("bowl of porridge".to_string()),
                image_data_url: None,
            },
            &GoalState::default(),
        )
        .unwrap();
        let request = ChatRequest {
            model: "gpt-5.2",
            messages: &messages,
            max_tokens: 400,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-5.2");
        assert_eq!(json["max_tokens"], 400);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[tokio::test]
    #[ignore = "calls the real API; needs OPENAI_API_KEY"]
    async fn test_live_text_analysis() {
        let key = std::env::var("OPENAI_API_KEY").unwrap();
        let client = OpenAiClient::new(key, &Settings::default()).unwrap();
        let messages = build_messages(
            &AnalysisInput {
                text: Some("two boiled eggs".to_string()),
                image_data_url: None,
            },
            &GoalState::default(),
        )
        .unwrap();
        let content = client.complete(&messages).await.unwrap();
        assert!(parse_analysis(&content).estimate().is_some());
    }
}
