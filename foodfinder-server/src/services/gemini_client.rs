use async_trait::async_trait;
use std::time::Duration;

use shared::{
    config::gemini::GeminiConfig,
    gemini::{
        ApiVersion, AttemptFailure, Content, GenerateContentRequest, GenerateContentResponse,
        GenerationConfig, ListModelsResponse,
    },
};
use tracing::{debug, warn};
use url::Url;

/// Calls the Generative Language API on behalf of the model selector.
#[async_trait]
pub trait GenerativeApi: Send + Sync {
    /// Lists the models visible to the configured key under `version`.
    async fn list_models(&self, version: ApiVersion) -> Result<ListModelsResponse, AttemptFailure>;

    /// Generates a reply from `model` under `version`.
    ///
    /// A 2xx answer without any reply text is reported as a failure.
    async fn generate(
        &self,
        version: ApiVersion,
        model: &str,
        contents: &[Content],
    ) -> Result<String, AttemptFailure>;
}

/// `reqwest` implementation of [`GenerativeApi`].
#[derive(Clone)]
pub struct HttpGeminiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    generation_config: GenerationConfig,
    system_instruction: String,
}

impl std::fmt::Debug for HttpGeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGeminiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid Gemini base URL '{url}': {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Gemini base URL '{0}' cannot carry path segments")]
    OpaqueBaseUrl(String),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

impl HttpGeminiClient {
    /// Builds a client for `api_key` from the Gemini settings.
    ///
    /// # Errors
    /// Returns an error if the base URL is malformed or the HTTP client cannot be built.
    pub fn new(config: &GeminiConfig, api_key: impl Into<String>) -> Result<Self, ClientBuildError> {
        let base_url = Url::parse(&config.base_url).map_err(|source| ClientBuildError::BaseUrl {
            url: config.base_url.clone(),
            source,
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientBuildError::OpaqueBaseUrl(config.base_url.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
            generation_config: GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
            system_instruction: config.system_instruction.clone(),
        })
    }

    fn endpoint(&self, version: ApiVersion, tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(version.as_str());
            segments.extend(tail);
        }
        url.query_pairs_mut().append_pair("key", &self.api_key);
        url
    }

    fn models_url(&self, version: ApiVersion) -> Url {
        self.endpoint(version, &["models"])
    }

    fn generate_url(&self, version: ApiVersion, model: &str) -> Url {
        let action = format!("{model}:generateContent");
        self.endpoint(version, &["models", &action])
    }
}

async fn read_body(response: reqwest::Response) -> (reqwest::StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

#[async_trait]
impl GenerativeApi for HttpGeminiClient {
    async fn list_models(&self, version: ApiVersion) -> Result<ListModelsResponse, AttemptFailure> {
        let response = self
            .http
            .get(self.models_url(version))
            .send()
            .await
            .map_err(|err| AttemptFailure::transport(err.without_url().to_string()))?;

        let (status, body) = read_body(response).await;
        if !status.is_success() {
            return Err(AttemptFailure::new(status.as_u16(), body));
        }

        Ok(serde_json::from_str(&body).unwrap_or_else(|err| {
            warn!(version = %version, error = %err, "model listing was not valid JSON");
            ListModelsResponse::default()
        }))
    }

    async fn generate(
        &self,
        version: ApiVersion,
        model: &str,
        contents: &[Content],
    ) -> Result<String, AttemptFailure> {
        let payload = GenerateContentRequest::for_version(
            version,
            contents,
            self.generation_config,
            &self.system_instruction,
        );
        debug!(version = %version, model, turns = contents.len(), "sending generateContent");

        let response = self
            .http
            .post(self.generate_url(version, model))
            .json(&payload)
            .send()
            .await
            .map_err(|err| AttemptFailure::transport(err.without_url().to_string()))?;

        let (status, body) = read_body(response).await;
        if !status.is_success() {
            return Err(AttemptFailure::new(status.as_u16(), body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|err| AttemptFailure::transport(format!("invalid generateContent body: {err}")))?;

        let reply = parsed.reply_text();
        if reply.is_empty() {
            return Err(AttemptFailure::empty_reply());
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::gemini::ContentRole;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, method, path, query_param},
    };

    fn client_for(server: &MockServer) -> HttpGeminiClient {
        let config = GeminiConfig {
            base_url: server.uri(),
            ..GeminiConfig::default()
        };
        HttpGeminiClient::new(&config, "test-key").expect("client builds")
    }

    fn contents() -> Vec<Content> {
        vec![Content::new(ContentRole::User, "Recommend something spicy")]
    }

    #[test]
    fn test_endpoints_carry_version_model_and_key() {
        let config = GeminiConfig {
            base_url: "https://example.test/".into(),
            ..GeminiConfig::default()
        };
        let client = HttpGeminiClient::new(&config, "k").unwrap();

        assert_eq!(
            client.generate_url(ApiVersion::V1Beta, "gemini-1.5-flash").as_str(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent?key=k"
        );
        assert_eq!(
            client.models_url(ApiVersion::V1).as_str(),
            "https://example.test/v1/models?key=k"
        );
        assert_eq!(
            client.generate_url(ApiVersion::V1, "a/b c").path(),
            "/v1/models/a%2Fb%20c:generateContent"
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = HttpGeminiClient::new(&GeminiConfig::default(), "super-secret").unwrap();
        assert!(!format!("{client:?}").contains("super-secret"));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let config = GeminiConfig {
            base_url: "not a url".into(),
            ..GeminiConfig::default()
        };
        assert!(matches!(
            HttpGeminiClient::new(&config, "k"),
            Err(ClientBuildError::BaseUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_generate_returns_trimmed_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "generationConfig": { "maxOutputTokens": 512 },
                "systemInstruction": { "parts": [{ "text": shared::config::gemini::DEFAULT_SYSTEM_INSTRUCTION }] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "  Try the vindaloo.  " }] } }]
            })))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .generate(ApiVersion::V1Beta, "gemini-2.0-flash", &contents())
            .await
            .expect("reply");
        assert_eq!(reply, "Try the vindaloo.");
    }

    #[tokio::test]
    async fn test_generate_maps_status_and_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/models/missing:generateContent"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/models/silent:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/models/garbled:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);

        let missing = client
            .generate(ApiVersion::V1, "missing", &contents())
            .await
            .unwrap_err();
        assert_eq!(missing, AttemptFailure::new(404, "model not found"));

        let silent = client
            .generate(ApiVersion::V1, "silent", &contents())
            .await
            .unwrap_err();
        assert_eq!(silent, AttemptFailure::empty_reply());

        let garbled = client
            .generate(ApiVersion::V1, "garbled", &contents())
            .await
            .unwrap_err();
        assert_eq!(garbled.status, 0);
    }

    #[tokio::test]
    async fn test_null_candidates_is_an_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/models/blocked:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": null })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/models/partless:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": null } }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        for model in ["blocked", "partless"] {
            let failure = client
                .generate(ApiVersion::V1, model, &contents())
                .await
                .unwrap_err();
            assert_eq!(failure, AttemptFailure::empty_reply());
        }
    }

    #[tokio::test]
    async fn test_list_models_skips_malformed_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    { "name": "models/gemini-2.0-flash", "supportedGenerationMethods": ["generateContent"] },
                    { "name": "models/x", "supportedGenerationMethods": null }
                ]
            })))
            .mount(&server)
            .await;

        let listing = client_for(&server).list_models(ApiVersion::V1).await.unwrap();

        assert_eq!(
            shared::gemini::ordered_models_from_list(&listing, &[]),
            vec!["models/gemini-2.0-flash".to_string()]
        );
    }

    #[tokio::test]
    async fn test_v1_payload_has_no_system_instruction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/models/gemini-1.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
            })))
            .mount(&server)
            .await;

        client_for(&server)
            .generate(ApiVersion::V1, "gemini-1.5-flash", &contents())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("systemInstruction").is_none());
        assert_eq!(body["contents"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_list_models_handles_errors_and_bad_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let denied = client.list_models(ApiVersion::V1).await.unwrap_err();
        assert_eq!(denied.status, 403);
        assert_eq!(denied.body, "API key not valid");

        let listing = client.list_models(ApiVersion::V1Beta).await.unwrap();
        assert!(listing.models.is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_has_status_zero_and_no_key() {
        let config = GeminiConfig {
            base_url: "http://127.0.0.1:1".into(),
            request_timeout_seconds: 2,
            ..GeminiConfig::default()
        };
        let client = HttpGeminiClient::new(&config, "secret-key").unwrap();

        let failure = client.list_models(ApiVersion::V1).await.unwrap_err();
        assert_eq!(failure.status, 0);
        assert!(!failure.body.contains("secret-key"));
    }
}
