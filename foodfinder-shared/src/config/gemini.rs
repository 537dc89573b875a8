//! # Gemini Configuration
//!
//! Settings for the upstream Generative Language API: credentials, the optional
//! forced model, and the knobs that drive model selection.

use serde::{Deserialize, Serialize};
use std::env;

use crate::gemini::catalog::{DEFAULT_FALLBACK_MODELS, DEFAULT_PREFERRED_MODELS};

/// Public endpoint of the Generative Language API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Instruction sent with `v1beta` requests.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are Smart Food Finder, a friendly food/restaurant assistant. Help users pick meals, cuisines, and dishes. Ask short clarifying questions when needed and keep answers concise.";

/// Upstream API settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key. Read from the config file or `GEMINI_API_KEY`; never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Model to try before any auto-selection (`GEMINI_MODEL`).
    pub model: Option<String>,

    /// Scheme and host of the API, without a version segment (`GEMINI_API_BASE`).
    pub base_url: String,

    /// Per-request timeout for upstream calls.
    pub request_timeout_seconds: u64,

    /// How long a successful auto-selected model is reused.
    pub choice_cache_ttl_seconds: u64,

    /// How many listed models are tried per API version.
    pub max_discovered_candidates: usize,

    /// Listed model names that are tried first, in order.
    pub preferred_models: Vec<String>,

    /// Model names tried blindly when discovery yields nothing usable.
    pub fallback_models: Vec<String>,

    pub temperature: f32,

    pub max_output_tokens: u32,

    pub system_instruction: String,

    /// Upstream body excerpts in diagnostics are cut to this many characters.
    pub diagnostics_body_limit: usize,

    /// Fallback attempts stop being logged once the diagnostic log reaches this size.
    pub max_logged_attempts: usize,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_seconds: 30,
            choice_cache_ttl_seconds: 60 * 60,
            max_discovered_candidates: 5,
            preferred_models: DEFAULT_PREFERRED_MODELS
                .iter()
                .map(ToString::to_string)
                .collect(),
            fallback_models: DEFAULT_FALLBACK_MODELS
                .iter()
                .map(ToString::to_string)
                .collect(),
            temperature: 0.7,
            max_output_tokens: 512,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            diagnostics_body_limit: 500,
            max_logged_attempts: 10,
        }
    }
}

impl GeminiConfig {
    /// Applies `GEMINI_*` environment variables on top of the current values.
    ///
    /// A blank `GEMINI_MODEL` clears any configured forced model.
    pub fn apply_env_overrides(&mut self) {
        if let Some(api_key) = non_empty_env("GEMINI_API_KEY") {
            self.api_key = Some(api_key);
        }

        if let Ok(model) = env::var("GEMINI_MODEL") {
            self.model = Some(model);
        }

        if let Some(base_url) = non_empty_env("GEMINI_API_BASE") {
            self.base_url = base_url;
        }

        self.normalize();
    }

    /// Trims string settings and turns blank optionals into `None`.
    pub fn normalize(&mut self) {
        self.api_key = self
            .api_key
            .take()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        self.model = self
            .model
            .take()
            .map(|model| model.trim().to_string())
            .filter(|model| !model.is_empty());
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
    }

    /// The configured API key, if any.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// The forced model, if any.
    #[must_use]
    pub fn forced_model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Validates the selection settings.
    ///
    /// # Errors
    /// Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.base_url.is_empty() {
            errors.push("gemini.base_url must not be empty".to_string());
        }
        if self.fallback_models.is_empty() {
            errors.push("gemini.fallback_models must list at least one model".to_string());
        }
        if self.choice_cache_ttl_seconds == 0 {
            errors.push("gemini.choice_cache_ttl_seconds must be greater than 0".to_string());
        }
        if self.request_timeout_seconds == 0 {
            errors.push("gemini.request_timeout_seconds must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            errors.push("gemini.temperature must be between 0.0 and 2.0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
