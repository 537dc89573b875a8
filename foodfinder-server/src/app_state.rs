use std::sync::Arc;

use shared::config::server::Config;

use crate::services::{gemini_client::ClientBuildError, model_selector::ModelSelector};

/// Application state shared across all routes.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub(crate) config: Arc<Config>,
    /// `None` when no Gemini API key is configured.
    pub(crate) selector: Option<Arc<ModelSelector>>,
}

impl AppState {
    /// Builds the state, wiring the model selector when an API key is present.
    ///
    /// # Errors
    /// Returns an error if the Gemini HTTP client cannot be built.
    pub fn from_config(config: Arc<Config>) -> Result<Self, ClientBuildError> {
        let selector = ModelSelector::from_config(&config.gemini)?.map(Arc::new);
        Ok(Self { config, selector })
    }

    pub fn with_selector(config: Arc<Config>, selector: ModelSelector) -> Self {
        Self {
            config,
            selector: Some(Arc::new(selector)),
        }
    }
}
