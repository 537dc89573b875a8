use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::Duration,
};

use anyhow::Context;
use axum::{
    Extension, Router,
    http::{HeaderValue, Method, StatusCode, header},
    response::IntoResponse,
    routing::get,
    serve,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use shared::config::server::{Config, LogFormat};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
};
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    app_state::AppState,
    middleware::request_context::{self, RequestIdState},
    routes::{self, openapi::openapi_routes},
    tracer,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Process-wide Prometheus recorder, installed on first use.
///
/// # Panics
/// Panics if another metrics recorder was already installed.
pub fn metrics_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn metrics_endpoint(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        handle.render(),
    )
}

/// Initializes the global tracing subscriber and returns the configured level.
pub fn initialize_tracing(config: &Config) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let installed = if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).try_init()
    } else {
        fmt_builder.with_ansi(true).try_init()
    };
    if installed.is_err() {
        warn!("tracing subscriber already installed; keeping the existing one");
    }

    config.logging.level.clone()
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

/// Builds the CORS layer from `server.cors`.
///
/// Credentialed CORS cannot use wildcards, so origins and headers are mirrored
/// from the request in that case.
pub fn create_cors_layer(config: &Config) -> CorsLayer {
    let cors_config = &config.server.cors;

    let mut cors = CorsLayer::new()
        .allow_methods(AllowMethods::list([Method::GET, Method::POST, Method::OPTIONS]))
        .allow_credentials(cors_config.allow_credentials)
        .max_age(Duration::from_secs(cors_config.max_age_seconds));

    cors = if cors_config.allow_credentials {
        cors.allow_headers(AllowHeaders::mirror_request())
    } else {
        cors.allow_headers(AllowHeaders::any())
    };

    if cors_config.allowed_origins.is_empty() {
        if cors_config.allow_credentials {
            cors.allow_origin(AllowOrigin::mirror_request())
        } else {
            cors.allow_origin(AllowOrigin::any())
        }
    } else {
        let origins = cors_config
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect::<Vec<_>>();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Serves the front-end bundle with an SPA fallback to `spa_index`.
pub fn create_static_service<S>(static_dir: PathBuf, spa_index: PathBuf) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().fallback_service(
        ServeDir::new(static_dir)
            .append_index_html_on_directories(true)
            .fallback(ServeFile::new(spa_index)),
    )
}

/// Creates the main application router with all middleware and routes.
pub fn create_app_router(
    state: Arc<AppState>,
    config: Arc<Config>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let mut router = Router::new()
        .nest("/api", routes::chat::create_router_chat())
        .merge(routes::health::create_health_router())
        .route("/metrics", get(metrics_endpoint))
        .merge(openapi_routes());

    if let (Some(static_dir), Some(index)) = (config.web.static_dir.clone(), config.web.index_path())
    {
        info!(path = %static_dir.display(), "serving static files");
        router = router.merge(create_static_service(static_dir, index));
    }

    let request_id_state = RequestIdState::from_config(&config);

    router
        .layer(Extension(metrics_handle))
        .layer(create_cors_layer(&config))
        .layer(tracer::create_trace_layer())
        .layer(axum::middleware::from_fn_with_state(
            request_id_state,
            request_context::assign_request_id,
        ))
        .with_state(state)
}

/// Resolves when Ctrl+C is received.
pub async fn create_shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}

/// Starts the server and binds it to the configured port.
///
/// # Errors
/// Returns an error if the Gemini client cannot be built, the port cannot be
/// bound, or the server fails while running.
pub async fn run(config: Config) -> anyhow::Result<()> {
    initialize_tracing(&config);
    info!(profile = ?config.profile, "Starting Food Finder server...");

    let metrics_handle = metrics_handle();
    let config = Arc::new(config);

    let state = AppState::from_config(config.clone()).context("failed to build Gemini client")?;
    match (&state.selector, config.gemini.forced_model()) {
        (None, _) => warn!("GEMINI_API_KEY is not set; /api/chat will answer 500"),
        (Some(_), Some(model)) => info!(model, "forcing Gemini model"),
        (Some(_), None) => info!("Gemini model will be auto-selected"),
    }

    let app = create_app_router(Arc::new(state), config.clone(), metrics_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await?;

    Ok(())
}
