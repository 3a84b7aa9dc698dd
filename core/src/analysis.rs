//! Message model and response handling for the photo/description analysis
//! service. The transport itself lives behind [`AnalysisGateway`].

use std::path::Path;

use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ValidationError;
use crate::models::{GoalState, Macros};
use crate::numeric;

pub const SYSTEM_PROMPT: &str = "You are a nutrition assistant. Given a photo of food (often on a digital scale) or a written description of a meal, extract the visible scale weight in grams and identify foods with a short note. Estimate macros for the pictured or described portion.";

const RESPONSE_SHAPE: &str = "Return ONLY JSON with keys: items (array of {name, note}), weight_grams (number or null), macros ({protein, carbs, fat, calories}), macros100 (the same keys per 100 g, or null), and confidence (0-1).";

pub const UNPARSED_ERROR: &str = "Could not parse JSON from analysis response";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    #[must_use]
    pub fn system(text: &str) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.to_string()),
        }
    }
}

/// What the user supplied: a typed or dictated description, a photo, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisInput {
    pub text: Option<String>,
    pub image_data_url: Option<String>,
}

impl AnalysisInput {
    fn description(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    fn image(&self) -> Option<&str> {
        self.image_data_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description().is_none() && self.image().is_none()
    }
}

/// Sends one analysis request and returns the assistant's raw content.
///
/// Transport and HTTP failures are errors carrying the response body text.
pub trait AnalysisGateway {
    fn complete(&self, messages: &[ChatMessage]) -> impl Future<Output = Result<String>> + Send;
}

/// System prompt plus a single user message. The stored goal, when present,
/// is appended so the notes can reference it.
pub fn build_messages(input: &AnalysisInput, goal: &GoalState) -> Result<Vec<ChatMessage>> {
    if input.is_empty() {
        return Err(ValidationError::MissingAnalysisInput.into());
    }

    let mut prompt = String::from(if input.image().is_some() {
        "Analyze the meal in this photo. "
    } else {
        "Analyze the meal described below. "
    });
    prompt.push_str(RESPONSE_SHAPE);
    if let Some(text) = input.description() {
        prompt.push_str("\n\nDescription: ");
        prompt.push_str(text);
    }
    if let Some(goal) = goal.describe() {
        prompt.push_str("\n\nThe user's goal: ");
        prompt.push_str(&goal);
        prompt.push_str(". Mention anything relevant to it in the item notes.");
    }

    let content = match input.image() {
        Some(url) => MessageContent::Parts(vec![
            ContentPart::Text { text: prompt },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: url.to_string(),
                },
            },
        ]),
        None => MessageContent::Text(prompt),
    };

    Ok(vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage {
            role: Role::User,
            content,
        },
    ])
}

/// `choices[0].message.content`, trimmed, or `{}` when absent or blank.
#[must_use]
pub fn extract_content(payload: &Value) -> String {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("{}")
        .to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoodItem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroEstimate {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<FoodItem>,
    #[serde(default, deserialize_with = "numeric::lenient")]
    pub weight_grams: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub macros: Macros,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macros100: Option<Macros>,
    #[serde(default, deserialize_with = "numeric::lenient")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Estimate(MacroEstimate),
    Unparsed { raw: String, error: String },
}

impl AnalysisOutcome {
    #[must_use]
    pub fn estimate(&self) -> Option<&MacroEstimate> {
        match self {
            AnalysisOutcome::Estimate(e) => Some(e),
            AnalysisOutcome::Unparsed { .. } => None,
        }
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Interpret the assistant's content. Never fails: anything that is not a
/// JSON object comes back as [`AnalysisOutcome::Unparsed`] with the raw text.
#[must_use]
pub fn parse_analysis(content: &str) -> AnalysisOutcome {
    let unparsed = || AnalysisOutcome::Unparsed {
        raw: content.to_string(),
        error: UNPARSED_ERROR.to_string(),
    };

    let value = match serde_json::from_str::<Value>(strip_code_fence(content)) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) => return unparsed(),
        Err(e) => {
            debug!(error = %e, "analysis content is not JSON");
            return unparsed();
        }
    };

    match serde_json::from_value::<MacroEstimate>(value) {
        Ok(mut estimate) => {
            estimate.confidence = estimate.confidence.map(|c| c.clamp(0.0, 1.0));
            estimate.macros100 = estimate.macros100.filter(|m| !m.is_empty());
            AnalysisOutcome::Estimate(estimate)
        }
        Err(e) => {
            debug!(error = %e, "analysis JSON has an unexpected shape");
            unparsed()
        }
    }
}

/// `data:<mime>;base64,<payload>` for attaching a photo to a message.
#[must_use]
pub fn image_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

#[must_use]
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::as_validation;
    use serde_json::json;

    fn text_input(text: &str) -> AnalysisInput {
        AnalysisInput {
            text: Some(text.to_string()),
            image_data_url: None,
        }
    }

    #[test]
    fn test_build_messages_rejects_empty_input() {
        let blank = text_input("   ");
        for input in [AnalysisInput::default(), blank] {
            let err = build_messages(&input, &GoalState::default()).unwrap_err();
            assert_eq!(
                as_validation(&err),
                Some(&ValidationError::MissingAnalysisInput)
            );
        }
    }

    #[test]
    fn test_build_messages_with_image() {
        let input = AnalysisInput {
            text: None,
            image_data_url: Some("data:image/png;base64,AAAA".to_string()),
        };
        let messages = build_messages(&input, &GoalState::default()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);

        let json = serde_json::to_value(&messages[1]).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"][0]["type"], "text");
        assert!(
            json["content"][0]["text"]
                .as_str()
                .unwrap()
                .starts_with("Analyze the meal in this photo.")
        );
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(
            json["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_build_messages_text_only_includes_description_and_goal() {
        let goal = GoalState {
            goal: Some("build_muscle".to_string()),
            goal_custom: None,
        };
        let messages = build_messages(&text_input("two eggs and toast"), &goal).unwrap();
        let MessageContent::Text(prompt) = &messages[1].content else {
            panic!("expected plain text content");
        };
        assert!(prompt.contains("Description: two eggs and toast"));
        assert!(prompt.contains("The user's goal: build muscle."));
        assert!(prompt.contains("weight_grams"));
    }

    #[test]
    fn test_system_message_serializes_as_plain_string() {
        let json = serde_json::to_value(ChatMessage::system("hi")).unwrap();
        assert_eq!(json, json!({"role": "system", "content": "hi"}));
    }

    #[test]
    fn test_extract_content() {
        let payload = json!({"choices": [{"message": {"content": "  {\"items\": []}\n"}}]});
        assert_eq!(extract_content(&payload), "{\"items\": []}");
        assert_eq!(extract_content(&json!({"choices": []})), "{}");
        assert_eq!(
            extract_content(&json!({"choices": [{"message": {"content": "   "}}]})),
            "{}"
        );
    }

    #[test]
    fn test_parse_analysis_estimate() {
        let content = r#"{
            "items": [{"name": "chicken breast", "note": "grilled"}, {"name": "rice", "note": null}],
            "weight_grams": "320",
            "macros": {"protein": 45, "carbs": 60, "fat": 8, "calories": 500},
            "confidence": 0.8
        }"#;
        let outcome = parse_analysis(content);
        let estimate = outcome.estimate().unwrap();
        assert_eq!(estimate.items.len(), 2);
        assert_eq!(estimate.items[1].note, "");
        assert_eq!(estimate.weight_grams, Some(320.0));
        assert_eq!(estimate.macros.calories, Some(500.0));
        assert!(estimate.macros100.is_none());
        assert_eq!(estimate.confidence, Some(0.8));
    }

    #[test]
    fn test_parse_analysis_tolerates_code_fence_and_clamps_confidence() {
        let content = "```json\n{\"items\": [], \"weight_grams\": null, \"macros\": {}, \"confidence\": 4}\n```";
        let estimate = parse_analysis(content).estimate().cloned().unwrap();
        assert_eq!(estimate.confidence, Some(1.0));
        assert!(estimate.weight_grams.is_none());
    }

    #[test]
    fn test_parse_analysis_unparsed_keeps_raw() {
        for content in ["Sorry, I can't see a meal.", "[1, 2]", "{\"items\": 5}"] {
            match parse_analysis(content) {
                AnalysisOutcome::Unparsed { raw, error } => {
                    assert_eq!(raw, content);
                    assert_eq!(error, UNPARSED_ERROR);
                }
                AnalysisOutcome::Estimate(_) => panic!("expected unparsed for {content}"),
            }
        }
    }

    #[test]
    fn test_unparsed_serializes_flat() {
        let json = serde_json::to_value(parse_analysis("nope")).unwrap();
        assert_eq!(json["raw"], "nope");
        assert_eq!(json["error"], UNPARSED_ERROR);
    }

    #[test]
    fn test_image_data_url() {
        assert_eq!(image_data_url(b"hi", "image/png"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("meal.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("scale.webp")), Some("image/webp"));
        assert!(mime_for_path(Path::new("notes.txt")).is_none());
        assert!(mime_for_path(Path::new("noext")).is_none());
    }
}
