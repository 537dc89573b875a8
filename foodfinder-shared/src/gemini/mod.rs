//! # Gemini Protocol
//!
//! Wire types for the Google Generative Language API and the pure helpers the
//! model selector builds on: candidate ordering, name normalization, and
//! failure classification.

pub mod catalog;
pub mod errors;
pub mod types;

pub use catalog::{
    DEFAULT_FALLBACK_MODELS, DEFAULT_PREFERRED_MODELS, normalize_model_name,
    ordered_models_from_list,
};
pub use errors::{AttemptFailure, FailureKind};
pub use types::{
    ApiVersion, Content, ContentRole, GenerateContentRequest, GenerateContentResponse,
    GenerationConfig, ListModelsResponse, ModelDescriptor, Part, build_contents,
    has_user_content,
};
