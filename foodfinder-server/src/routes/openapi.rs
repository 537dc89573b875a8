use std::sync::Arc;

use crate::{
    app_state::AppState,
    http::error::{ApiError, AppResult},
    openapi::ApiDoc,
};
use axum::{Router, http::header, response::IntoResponse, routing::get};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

async fn openapi_yaml() -> AppResult<impl IntoResponse> {
    let yaml = ApiDoc::openapi()
        .to_yaml()
        .map_err(|err| ApiError::internal_server_error(format!("YAML error: {err}")))?;
    Ok(([(header::CONTENT_TYPE, "application/yaml")], yaml))
}

pub fn openapi_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi/foodfinder.json", ApiDoc::openapi()))
        .route("/openapi/foodfinder.yaml", get(openapi_yaml))
}
