//! Picks a Gemini model/version pair that can answer the current conversation.
//!
//! Candidates are tried in priority order: the forced model, the cached choice,
//! models discovered through the listing endpoint, then a hardcoded fallback
//! list. Each tier is probed across both API versions. Failures are classified
//! so a forced model that exists but errors aborts immediately, while missing
//! models keep the cascade going and quota errors shape the final verdict.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::http::StatusCode;
use serde::Serialize;
use shared::{
    config::gemini::GeminiConfig,
    gemini::{
        ApiVersion, AttemptFailure, Content, FailureKind, normalize_model_name,
        ordered_models_from_list,
    },
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::gemini_client::{ClientBuildError, GenerativeApi, HttpGeminiClient};

/// Tier of the cascade that produced (or attempted) a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceSource {
    Forced,
    Cached,
    Discovered,
    Fallback,
}

impl ChoiceSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Forced => "forced",
            Self::Cached => "cached",
            Self::Discovered => "discovered",
            Self::Fallback => "fallback",
        }
    }
}

/// A successful completion and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub version: ApiVersion,
    pub model: String,
    pub reply: String,
    pub source: ChoiceSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionAttempt {
    pub version: ApiVersion,
    pub status: u16,
    pub body_text: String,
}

/// One entry of the diagnostic log returned to non-production clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "phase",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum AttemptRecord {
    ForcedModel {
        model: String,
        attempts: Vec<VersionAttempt>,
    },
    CachedChoice {
        version: ApiVersion,
        model: String,
        status: u16,
        body_text: String,
    },
    ListModels {
        version: ApiVersion,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body_text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        model_count: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ordered_candidates: Option<Vec<String>>,
    },
    GenerateWithCandidate {
        version: ApiVersion,
        model: String,
        status: u16,
        body_text: String,
    },
    FallbackGenerate {
        version: ApiVersion,
        model: String,
        status: u16,
        body_text: String,
    },
}

/// Everything tried during one selection. Never contains the API key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionDiagnostics {
    pub forced_model: Option<String>,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Forced model failed: {model} ({summary})")]
    ForcedModelFailed {
        model: String,
        summary: String,
        diagnostics: SelectionDiagnostics,
    },
    #[error(
        "Gemini quota exceeded for this API key. Check your plan/billing in Google AI Studio (or wait and try again)."
    )]
    QuotaExceeded { diagnostics: SelectionDiagnostics },
    #[error("No supported Gemini model found for this API key.")]
    NoSupportedModel { diagnostics: SelectionDiagnostics },
}

impl SelectionError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::ForcedModelFailed { .. } | Self::NoSupportedModel { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    #[must_use]
    pub const fn diagnostics(&self) -> &SelectionDiagnostics {
        match self {
            Self::ForcedModelFailed { diagnostics, .. }
            | Self::QuotaExceeded { diagnostics }
            | Self::NoSupportedModel { diagnostics } => diagnostics,
        }
    }
}

/// Knobs of the cascade, resolved from [`GeminiConfig`].
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    pub forced_model: Option<String>,
    pub preferred_models: Vec<String>,
    pub fallback_models: Vec<String>,
    pub max_discovered_candidates: usize,
    pub cache_ttl: Duration,
    pub body_limit: usize,
    pub max_logged_attempts: usize,
}

impl SelectionPolicy {
    #[must_use]
    pub fn from_config(config: &GeminiConfig) -> Self {
        Self {
            forced_model: config.forced_model().map(ToString::to_string),
            preferred_models: config.preferred_models.clone(),
            fallback_models: config.fallback_models.clone(),
            max_discovered_candidates: config.max_discovered_candidates,
            cache_ttl: Duration::from_secs(config.choice_cache_ttl_seconds),
            body_limit: config.diagnostics_body_limit,
            max_logged_attempts: config.max_logged_attempts,
        }
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::from_config(&GeminiConfig::default())
    }
}

#[derive(Debug, Clone)]
struct CachedChoice {
    version: ApiVersion,
    model: String,
    at: Instant,
}

/// Last auto-selected pair, shared by all requests of the process.
#[derive(Debug)]
pub struct ChoiceCache {
    ttl: Duration,
    entry: RwLock<Option<CachedChoice>>,
}

impl ChoiceCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// The cached pair if it is younger than the TTL.
    pub async fn fresh(&self) -> Option<(ApiVersion, String)> {
        let guard = self.entry.read().await;
        guard
            .as_ref()
            .filter(|choice| choice.at.elapsed() < self.ttl)
            .map(|choice| (choice.version, choice.model.clone()))
    }

    pub async fn store(&self, version: ApiVersion, model: &str) {
        *self.entry.write().await = Some(CachedChoice {
            version,
            model: model.to_string(),
            at: Instant::now(),
        });
    }
}

/// Mutable state of one `choose_working_model` call.
struct SelectionRun {
    diagnostics: SelectionDiagnostics,
    saw_quota_exceeded: bool,
}

impl SelectionRun {
    fn new(forced_model: Option<String>) -> Self {
        Self {
            diagnostics: SelectionDiagnostics {
                forced_model,
                attempts: Vec::new(),
            },
            saw_quota_exceeded: false,
        }
    }

    fn record(&mut self, record: AttemptRecord) {
        self.diagnostics.attempts.push(record);
    }

    fn note_failure(&mut self, failure: &AttemptFailure) {
        if failure.kind() == FailureKind::QuotaExceeded {
            self.saw_quota_exceeded = true;
        }
    }
}

/// Runs the model-selection cascade against a [`GenerativeApi`].
pub struct ModelSelector {
    api: Arc<dyn GenerativeApi>,
    policy: SelectionPolicy,
    cache: ChoiceCache,
}

impl std::fmt::Debug for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSelector")
            .field("policy", &self.policy)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ModelSelector {
    pub fn new(api: Arc<dyn GenerativeApi>, policy: SelectionPolicy) -> Self {
        let cache = ChoiceCache::new(policy.cache_ttl);
        Self { api, policy, cache }
    }

    /// Builds a selector backed by [`HttpGeminiClient`], or `None` without an API key.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &GeminiConfig) -> Result<Option<Self>, ClientBuildError> {
        let Some(api_key) = config.api_key() else {
            return Ok(None);
        };
        let client = HttpGeminiClient::new(config, api_key)?;
        Ok(Some(Self::new(
            Arc::new(client),
            SelectionPolicy::from_config(config),
        )))
    }

    #[must_use]
    pub fn forced_model(&self) -> Option<&str> {
        self.policy.forced_model.as_deref()
    }

    /// The currently cached choice, if still fresh.
    pub async fn cached_choice(&self) -> Option<(ApiVersion, String)> {
        self.cache.fresh().await
    }

    /// Produces a reply for `contents`, walking the cascade until a model answers.
    ///
    /// # Errors
    /// Returns [`SelectionError::ForcedModelFailed`] when the forced model exists
    /// but fails, [`SelectionError::QuotaExceeded`] when nothing answered and at
    /// least one attempt hit the quota, and [`SelectionError::NoSupportedModel`]
    /// otherwise.
    #[instrument(skip_all, fields(turns = contents.len()))]
    pub async fn choose_working_model(
        &self,
        contents: &[Content],
    ) -> Result<Selection, SelectionError> {
        let mut run = SelectionRun::new(self.policy.forced_model.clone());

        if let Some(forced) = self.policy.forced_model.as_deref() {
            if let Some(selection) = self.try_forced(forced, contents, &mut run).await? {
                return Ok(selection);
            }
        }

        if let Some(selection) = self.try_cached(contents, &mut run).await {
            return Ok(selection);
        }

        if let Some(selection) = self.try_discovered(contents, &mut run).await {
            return Ok(selection);
        }

        if let Some(selection) = self.try_fallback(contents, &mut run).await {
            return Ok(selection);
        }

        let diagnostics = run.diagnostics;
        if run.saw_quota_exceeded {
            warn!(attempts = diagnostics.attempts.len(), "every candidate failed; quota exceeded");
            Err(SelectionError::QuotaExceeded { diagnostics })
        } else {
            warn!(attempts = diagnostics.attempts.len(), "every candidate failed");
            Err(SelectionError::NoSupportedModel { diagnostics })
        }
    }

    async fn try_forced(
        &self,
        model: &str,
        contents: &[Content],
        run: &mut SelectionRun,
    ) -> Result<Option<Selection>, SelectionError> {
        let mut attempts = Vec::with_capacity(ApiVersion::ALL.len());

        for version in ApiVersion::ALL {
            match self
                .attempt(ChoiceSource::Forced, version, model, contents)
                .await
            {
                Ok(reply) => {
                    return Ok(Some(Selection {
                        version,
                        model: model.to_string(),
                        reply,
                        source: ChoiceSource::Forced,
                    }));
                }
                Err(failure) => attempts.push(VersionAttempt {
                    version,
                    status: failure.status,
                    body_text: failure.truncated_body(self.policy.body_limit),
                }),
            }
        }

        let all_not_found = attempts
            .iter()
            .all(|attempt| FailureKind::classify(attempt.status) == FailureKind::NotFound);
        let summary = attempts
            .iter()
            .map(|attempt| format!("{}:{}", attempt.version, attempt.status))
            .collect::<Vec<_>>()
            .join(",");

        run.record(AttemptRecord::ForcedModel {
            model: model.to_string(),
            attempts,
        });

        if all_not_found {
            info!(model, "forced model is not available; falling back to auto-selection");
            return Ok(None);
        }

        Err(SelectionError::ForcedModelFailed {
            model: model.to_string(),
            summary,
            diagnostics: std::mem::take(&mut run.diagnostics),
        })
    }

    async fn try_cached(&self, contents: &[Content], run: &mut SelectionRun) -> Option<Selection> {
        let Some((version, model)) = self.cache.fresh().await else {
            metrics::counter!("gemini_model_cache_total", "result" => "miss").increment(1);
            return None;
        };
        metrics::counter!("gemini_model_cache_total", "result" => "hit").increment(1);

        match self
            .attempt(ChoiceSource::Cached, version, &model, contents)
            .await
        {
            Ok(reply) => Some(Selection {
                version,
                model,
                reply,
                source: ChoiceSource::Cached,
            }),
            Err(failure) => {
                // The entry stays until a later tier stores a replacement; its
                // failure does not count toward the quota verdict.
                run.record(AttemptRecord::CachedChoice {
                    version,
                    model,
                    status: failure.status,
                    body_text: failure.truncated_body(self.policy.body_limit),
                });
                None
            }
        }
    }

    async fn try_discovered(
        &self,
        contents: &[Content],
        run: &mut SelectionRun,
    ) -> Option<Selection> {
        for version in ApiVersion::ALL {
            let listing = match self.api.list_models(version).await {
                Ok(listing) => listing,
                Err(failure) => {
                    warn!(version = %version, status = failure.status, "model listing failed");
                    run.record(AttemptRecord::ListModels {
                        version,
                        status: Some(failure.status),
                        body_text: Some(failure.truncated_body(self.policy.body_limit)),
                        model_count: None,
                        ordered_candidates: None,
                    });
                    continue;
                }
            };

            let mut ordered = ordered_models_from_list(&listing, &self.policy.preferred_models);
            ordered.truncate(self.policy.max_discovered_candidates);
            debug!(
                version = %version,
                listed = listing.models.len(),
                candidates = ordered.len(),
                "discovered models"
            );
            run.record(AttemptRecord::ListModels {
                version,
                status: Some(StatusCode::OK.as_u16()),
                body_text: None,
                model_count: Some(listing.models.len()),
                ordered_candidates: Some(ordered.clone()),
            });

            for candidate in &ordered {
                let model = normalize_model_name(candidate);
                match self
                    .attempt(ChoiceSource::Discovered, version, model, contents)
                    .await
                {
                    Ok(reply) => {
                        self.cache.store(version, model).await;
                        return Some(Selection {
                            version,
                            model: model.to_string(),
                            reply,
                            source: ChoiceSource::Discovered,
                        });
                    }
                    Err(failure) => {
                        run.note_failure(&failure);
                        run.record(AttemptRecord::GenerateWithCandidate {
                            version,
                            model: model.to_string(),
                            status: failure.status,
                            body_text: failure.truncated_body(self.policy.body_limit),
                        });
                    }
                }
            }
        }

        None
    }

    async fn try_fallback(&self, contents: &[Content], run: &mut SelectionRun) -> Option<Selection> {
        for version in ApiVersion::ALL {
            for model in &self.policy.fallback_models {
                match self
                    .attempt(ChoiceSource::Fallback, version, model, contents)
                    .await
                {
                    Ok(reply) => {
                        self.cache.store(version, model).await;
                        return Some(Selection {
                            version,
                            model: model.clone(),
                            reply,
                            source: ChoiceSource::Fallback,
                        });
                    }
                    Err(failure) => {
                        run.note_failure(&failure);
                        if run.diagnostics.attempts.len() < self.policy.max_logged_attempts {
                            run.record(AttemptRecord::FallbackGenerate {
                                version,
                                model: model.clone(),
                                status: failure.status,
                                body_text: failure.truncated_body(self.policy.body_limit),
                            });
                        }
                    }
                }
            }
        }

        None
    }

    async fn attempt(
        &self,
        source: ChoiceSource,
        version: ApiVersion,
        model: &str,
        contents: &[Content],
    ) -> Result<String, AttemptFailure> {
        let result = self.api.generate(version, model, contents).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(failure) => failure.kind().as_str(),
        };
        metrics::counter!(
            "gemini_generate_attempts_total",
            "phase" => source.as_str(),
            "version" => version.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        match &result {
            Ok(_) => info!(
                phase = source.as_str(),
                version = %version,
                model,
                "model answered"
            ),
            Err(failure) => warn!(
                phase = source.as_str(),
                version = %version,
                model,
                status = failure.status,
                "generateContent attempt failed"
            ),
        }

        result
    }
}
