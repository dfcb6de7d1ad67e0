use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::Config;
use crate::error::StoryError;
use crate::models::InlineImage;
use crate::services::{ImageModel, ImageRequest, TextModel};

/// Google Gemini REST client: `generateContent` for text, Imagen `:predict` for images.
pub struct GeminiClient {
    client: reqwest::Client,
    config: Arc<Config>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiClient {
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(GeminiClient { client, config })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.config.api_url, model, method)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<String, StoryError> {
        let api_key = self.config.api_key()?;

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let response_text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(StoryError::Upstream(upstream_message(
                status.as_u16(),
                &response_text,
            )));
        }

        Ok(response_text)
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<String, StoryError> {
        let url = self.endpoint(&self.config.text_model, "generateContent");
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema
            }
        });

        tracing::debug!("Requesting story text from {}", self.config.text_model);
        let response_text = self.post(&url, &body).await?;

        let response: GenerateContentResponse = serde_json::from_str(&response_text)
            .map_err(|e| StoryError::InvalidResponseShape(e.to_string()))?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(StoryError::InvalidResponseShape(
                "response contained no text".to_string(),
            ));
        }

        Ok(text)
    }
}

#[async_trait]
impl ImageModel for GeminiClient {
    async fn generate_images(
        &self,
        request: &ImageRequest,
    ) -> Result<Vec<InlineImage>, StoryError> {
        let url = self.endpoint(&self.config.image_model, "predict");
        let body = json!({
            "instances": [{ "prompt": request.prompt }],
            "parameters": {
                "sampleCount": request.number_of_images,
                "aspectRatio": request.aspect_ratio,
                "outputOptions": { "mimeType": request.mime_type }
            }
        });

        tracing::debug!("Requesting image from {}", self.config.image_model);
        let response_text = self.post(&url, &body).await?;

        let response: PredictResponse = serde_json::from_str(&response_text)
            .map_err(|e| StoryError::Upstream(format!("unreadable image response: {}", e)))?;

        // Filtered predictions come back without bytes.
        let images = response
            .predictions
            .into_iter()
            .filter_map(|prediction| {
                let data = prediction.bytes_base64_encoded?;
                let mime_type = prediction
                    .mime_type
                    .unwrap_or_else(|| request.mime_type.to_string());
                Some(InlineImage::new(mime_type, data))
            })
            .collect();

        Ok(images)
    }
}

fn transport_error(e: reqwest::Error) -> StoryError {
    if e.is_timeout() {
        StoryError::Upstream(format!("deadline exceeded: {}", e))
    } else {
        StoryError::Upstream(e.to_string())
    }
}

/// Renders a non-2xx response as `<code> <STATUS>: <message>`.
fn upstream_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = envelope.error.code.unwrap_or(status);
            match envelope.error.status {
                Some(kind) => format!("{} {}: {}", code, kind, envelope.error.message),
                None => format!("{}: {}", code, envelope.error.message),
            }
        }
        Err(_) => format!("{}: {}", status, body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use tokio::net::TcpListener;

    use super::*;
    use crate::error::{ErrorCategory, classify};

    #[derive(Clone)]
    struct Stub {
        hits: Arc<AtomicUsize>,
        reply: Arc<dyn Fn(&str, &Value) -> (StatusCode, String) + Send + Sync>,
    }

    async fn handle(
        State(stub): State<Stub>,
        Path(model_call): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> impl IntoResponse {
        stub.hits.fetch_add(1, Ordering::SeqCst);
        if headers.get("x-goog-api-key").is_none() {
            return (StatusCode::UNAUTHORIZED, "missing key".to_string());
        }
        (stub.reply)(&model_call, &body)
    }

    /// Serves `POST /v1beta/models/{model}:{method}` and returns the base URL.
    async fn spawn_stub(
        reply: impl Fn(&str, &Value) -> (StatusCode, String) + Send + Sync + 'static,
    ) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let stub = Stub {
            hits: hits.clone(),
            reply: Arc::new(reply),
        };
        let app = Router::new()
            .route("/v1beta/models/:model_call", post(handle))
            .with_state(stub);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/v1beta", addr), hits)
    }

    fn client_for(base_url: &str, api_key: Option<&str>) -> GeminiClient {
        let mut config = Config::default().with_api_url(base_url);
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }
        GeminiClient::new(Arc::new(config)).unwrap()
    }

    fn image_request() -> ImageRequest {
        ImageRequest {
            prompt: "a castle".to_string(),
            number_of_images: 1,
            mime_type: "image/jpeg",
            aspect_ratio: "1:1",
        }
    }

    #[tokio::test]
    async fn text_generation_returns_candidate_text() {
        let (base, hits) = spawn_stub(|model_call, body| {
            assert_eq!(model_call, "gemini-2.5-flash:generateContent");
            assert_eq!(
                body["generationConfig"]["responseMimeType"],
                "application/json"
            );
            assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
            assert_eq!(body["contents"][0]["parts"][0]["text"], "tell me a story");
            let reply = json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "{\"title\":" }, { "text": "\"T\"}" }] }
                }]
            });
            (StatusCode::OK, reply.to_string())
        })
        .await;

        let client = client_for(&base, Some("key"));
        let text = client
            .generate_json("tell me a story", &json!({ "type": "OBJECT" }))
            .await
            .unwrap();

        assert_eq!(text, "{\"title\":\"T\"}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_candidates_are_an_invalid_shape() {
        let (base, _) = spawn_stub(|_, _| (StatusCode::OK, json!({ "candidates": [] }).to_string())).await;

        let err = client_for(&base, Some("key"))
            .generate_json("p", &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, StoryError::InvalidResponseShape(_)));
    }

    #[tokio::test]
    async fn error_envelope_becomes_classifiable_upstream_error() {
        let (base, _) = spawn_stub(|_, _| {
            let body = json!({
                "error": {
                    "code": 429,
                    "message": "You exceeded your current quota.",
                    "status": "RESOURCE_EXHAUSTED"
                }
            });
            (StatusCode::TOO_MANY_REQUESTS, body.to_string())
        })
        .await;

        let err = client_for(&base, Some("key"))
            .generate_json("p", &json!({}))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StoryError::Upstream(
                "429 RESOURCE_EXHAUSTED: You exceeded your current quota.".into()
            )
        );
        assert_eq!(err.category(), ErrorCategory::QuotaExceeded);
    }

    #[tokio::test]
    async fn invalid_key_message_is_preserved() {
        let (base, _) = spawn_stub(|_, _| {
            let body = json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT"
                }
            });
            (StatusCode::BAD_REQUEST, body.to_string())
        })
        .await;

        let err = client_for(&base, Some("wrong"))
            .generate_images(&image_request())
            .await
            .unwrap_err();

        assert_eq!(classify(&err.to_string()), ErrorCategory::InvalidCredential);
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let (base, hits) = spawn_stub(|_, _| (StatusCode::OK, "{}".to_string())).await;
        let client = client_for(&base, None);

        let err = client.generate_json("p", &json!({})).await.unwrap_err();
        assert_eq!(err, StoryError::MissingCredential);

        let err = client.generate_images(&image_request()).await.unwrap_err();
        assert_eq!(err, StoryError::MissingCredential);

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn image_generation_returns_inline_images() {
        let (base, _) = spawn_stub(|model_call, body| {
            assert_eq!(model_call, "imagen-4.0-generate-001:predict");
            assert_eq!(body["instances"][0]["prompt"], "a castle");
            assert_eq!(body["parameters"]["sampleCount"], 1);
            assert_eq!(body["parameters"]["aspectRatio"], "1:1");
            assert_eq!(body["parameters"]["outputOptions"]["mimeType"], "image/jpeg");
            let reply = json!({
                "predictions": [{ "bytesBase64Encoded": "/9j/AAAA", "mimeType": "image/jpeg" }]
            });
            (StatusCode::OK, reply.to_string())
        })
        .await;

        let images = client_for(&base, Some("key"))
            .generate_images(&image_request())
            .await
            .unwrap();

        assert_eq!(images, vec![InlineImage::new("image/jpeg", "/9j/AAAA")]);
    }

    #[tokio::test]
    async fn missing_predictions_mean_zero_images() {
        let (base, _) = spawn_stub(|_, _| (StatusCode::OK, "{}".to_string())).await;

        let images = client_for(&base, Some("key"))
            .generate_images(&image_request())
            .await
            .unwrap();

        assert!(images.is_empty());
    }

    #[test]
    fn non_envelope_bodies_are_kept_raw() {
        assert_eq!(
            upstream_message(502, "  Bad Gateway \n"),
            "502: Bad Gateway"
        );
        assert_eq!(
            upstream_message(504, r#"{"error":{"message":"Deadline expired","status":"DEADLINE_EXCEEDED"}}"#),
            "504 DEADLINE_EXCEEDED: Deadline expired"
        );
    }
}
