use std::sync::Arc;

use axum::{Router, http::Uri, routing::post};
use serde_json::json;

use crate::{app_state::AppState, handlers::chat::chat, http::error::ApiError};

async fn unknown_api_route(uri: Uri) -> ApiError {
    ApiError::not_found(format!("no API route matches {}", uri.path()))
        .with_details(json!({ "path": uri.path() }))
}

/// Routes nested under `/api`.
pub fn create_router_chat() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .fallback(unknown_api_route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::Value;

    #[tokio::test]
    async fn unknown_api_route_answers_problem_details() {
        let app = Router::new()
            .nest("/api", create_router_chat())
            .with_state(Arc::new(AppState::default()));
        let server = TestServer::new(app).unwrap();

        let response = server.get("/api/menu").await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["code"], "not_found");
        assert_eq!(body["details"]["path"], "/api/menu");
    }
}
