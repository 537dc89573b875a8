pub mod gemini_client;
pub mod model_selector;
