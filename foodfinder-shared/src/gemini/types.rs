//! # Gemini Wire Types
//!
//! Request and response bodies of the `generateContent` and `models` endpoints,
//! plus the conversion from widget chat history to Gemini `contents`.

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;

use crate::models::{ChatMessage, ChatRole};

/// Protocol version segment of the API path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiVersion {
    #[serde(rename = "v1")]
    V1,
    #[serde(rename = "v1beta")]
    V1Beta,
}

impl ApiVersion {
    /// Probe order used by every selection phase.
    pub const ALL: [Self; 2] = [Self::V1, Self::V1Beta];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V1Beta => "v1beta",
        }
    }

    /// `systemInstruction` is rejected by `v1`.
    #[must_use]
    pub const fn supports_system_instruction(self) -> bool {
        matches!(self, Self::V1Beta)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub text: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: ContentRole,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: ContentRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::text(text)],
        }
    }
}

/// Reads a field, treating `null` or a value of the wrong shape as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Reads a list, keeping only the entries that parse.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries: Vec<Value> = lenient(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}

/// Converts widget history into Gemini `contents`.
///
/// Turns whose content is blank are dropped; the rest keep their text as sent.
#[must_use]
pub fn build_contents(messages: &[ChatMessage]) -> Vec<Content> {
    messages
        .iter()
        .filter(|message| !message.content.trim().is_empty())
        .map(|message| {
            let role = match message.role {
                ChatRole::Assistant => ContentRole::Model,
                ChatRole::User => ContentRole::User,
            };
            Content::new(role, message.content.clone())
        })
        .collect()
}

/// Whether any turn was authored by the user.
#[must_use]
pub fn has_user_content(contents: &[Content]) -> bool {
    contents
        .iter()
        .any(|content| content.role == ContentRole::User)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<Part>,
}

/// Body of `POST models/{model}:generateContent`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub contents: &'a [Content],
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
}

impl<'a> GenerateContentRequest<'a> {
    /// Builds a payload for `version`, attaching the system instruction only
    /// where the version accepts it.
    #[must_use]
    pub fn for_version(
        version: ApiVersion,
        contents: &'a [Content],
        generation_config: GenerationConfig,
        system_instruction: &str,
    ) -> Self {
        let system_instruction = (version.supports_system_instruction()
            && !system_instruction.trim().is_empty())
        .then(|| SystemInstruction {
            parts: vec![Part::text(system_instruction)],
        });

        Self {
            contents,
            generation_config,
            system_instruction,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default, deserialize_with = "lenient_list")]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text of the first candidate's parts, concatenated and trimmed.
    #[must_use]
    pub fn reply_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub supported_generation_methods: Vec<String>,
}

impl ModelDescriptor {
    #[must_use]
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|method| method == "generateContent")
    }
}

/// Body of `GET models`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListModelsResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub models: Vec<ModelDescriptor>,
}
