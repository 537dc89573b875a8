#![allow(clippy::needless_for_each)] // Derive macro emits a for_each internally

use shared::models::{ChatErrorResponse, ChatMessage, ChatReply, ChatRequest, ChatRole};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Food Finder API",
        version = "1.0.0",
        description = "Chat gateway that answers food and restaurant questions with Google Gemini"
    ),
    paths(crate::handlers::chat::chat),
    components(schemas(ChatRequest, ChatMessage, ChatRole, ChatReply, ChatErrorResponse)),
    tags((name = "Chat", description = "Conversational food recommendations"))
)]
pub struct ApiDoc;
