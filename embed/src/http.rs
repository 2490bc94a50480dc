use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EncoderConfig;
use crate::encoder::{Encoder, Source, l2_normalize};
use crate::error::EncodeError;

/// Default CLIP image/text model.
pub const MODEL_CLIP_VIT_B32: &str = "ViT-B/32";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_DIM: usize = 512;

/// Encoding request body.
#[derive(Serialize)]
struct EncodeRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
}

/// Encoding response body.
#[derive(Deserialize)]
struct EncodeResponse {
    embedding: Vec<f64>,
}

/// HttpEncoder calls a CLIP-style encoding service over HTTP.
///
/// `POST {base_url}/encode` with `{"model", "text"}` or
/// `{"model", "image_url"}`; the service answers `{"embedding": [...]}`.
pub struct HttpEncoder {
    client: Client,
    api_key: String,
    model: String,
    dim: usize,
    base_url: String,
    normalize: bool,
}

impl HttpEncoder {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(EncoderConfig::default().with_base_url(base_url))
    }

    pub fn with_config(cfg: EncoderConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: cfg.api_key,
            model: if cfg.model.is_empty() {
                MODEL_CLIP_VIT_B32.to_string()
            } else {
                cfg.model
            },
            dim: if cfg.dimension == 0 {
                DEFAULT_DIM
            } else {
                cfg.dimension
            },
            base_url: if cfg.base_url.is_empty() {
                DEFAULT_BASE_URL.to_string()
            } else {
                cfg.base_url.trim_end_matches('/').to_string()
            },
            normalize: cfg.normalize,
        }
    }

    async fn call_api(&self, body: &EncodeRequest<'_>) -> Result<Vec<f32>, EncodeError> {
        let url = format!("{}/encode", self.base_url);
        let mut req = self.client.post(&url).json(body);
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| EncodeError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EncodeError::Api(format!("HTTP {status}: {body}")));
        }

        let data = resp
            .bytes()
            .await
            .map_err(|e| EncodeError::Api(e.to_string()))?;
        parse_response(&data, self.dim, self.normalize)
    }
}

/// Decode a response body into a vector of the expected dimension.
fn parse_response(data: &[u8], want: usize, normalize: bool) -> Result<Vec<f32>, EncodeError> {
    let resp: EncodeResponse =
        serde_json::from_slice(data).map_err(|e| EncodeError::Api(e.to_string()))?;
    if resp.embedding.len() != want {
        return Err(EncodeError::DimensionMismatch {
            got: resp.embedding.len(),
            want,
        });
    }
    let mut v: Vec<f32> = resp.embedding.iter().map(|&x| x as f32).collect();
    if normalize {
        l2_normalize(&mut v);
    }
    Ok(v)
}

#[async_trait::async_trait]
impl Encoder for HttpEncoder {
    async fn encode(&self, source: &Source) -> Result<Vec<f32>, EncodeError> {
        if source.as_str().trim().is_empty() {
            return Err(EncodeError::EmptyInput);
        }
        let body = match source {
            Source::Text(text) => EncodeRequest {
                model: &self.model,
                text: Some(text.as_str()),
                image_url: None,
            },
            Source::Ref(url) => EncodeRequest {
                model: &self.model,
                text: None,
                image_url: Some(url.as_str()),
            },
        };
        self.call_api(&body).await
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
