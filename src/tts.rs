//! Pronunciation audio via the Google Cloud Text-to-Speech REST API
//!
//! Synthesized clips are kept in a bounded LRU so repeated clicks on the same
//! word do not go back upstream.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use cached::{Cached, SizedCache};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::TtsConfig;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("no text to synthesize")]
    EmptyText,

    #[error("text longer than {max} characters")]
    TooLong { max: usize },

    #[error("upstream returned {0}")]
    UpstreamStatus(reqwest::StatusCode),

    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream audio is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

pub struct TtsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    language_code: String,
    voice: String,
    max_chars: usize,
    cache: Mutex<SizedCache<String, Bytes>>,
}

impl TtsClient {
    pub fn new(config: &TtsConfig) -> Result<Self, TtsError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        if config.api_key.is_empty() {
            warn!("tts.api_key is not set; upstream calls will likely be rejected");
        }

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            language_code: config.language_code.clone(),
            voice: config.voice.clone(),
            max_chars: config.max_chars,
            cache: Mutex::new(SizedCache::with_size(config.cache_capacity)),
        })
    }

    /// Trim and bound-check a snippet before it is used as a cache key
    pub fn prepare<'a>(&self, text: &'a str) -> Result<&'a str, TtsError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TtsError::EmptyText);
        }
        if text.chars().count() > self.max_chars {
            return Err(TtsError::TooLong { max: self.max_chars });
        }
        Ok(text)
    }

    /// MP3 audio for `text`, from cache when possible
    pub async fn speak(&self, text: &str) -> Result<Bytes, TtsError> {
        let text = self.prepare(text)?;

        if let Some(audio) = self.cache.lock().await.cache_get(text) {
            debug!("TTS cache hit for {:?}", text);
            return Ok(audio.clone());
        }

        let audio = self.synthesize(text).await?;
        self.cache.lock().await.cache_set(text.to_string(), audio.clone());
        Ok(audio)
    }

    async fn synthesize(&self, text: &str) -> Result<Bytes, TtsError> {
        let body = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.language_code,
                name: &self.voice,
            },
            audio_config: AudioConfig { audio_encoding: "MP3" },
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.query(&[("key", self.api_key.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TtsError::UpstreamStatus(status));
        }

        let payload: SynthesizeResponse = response.json().await?;
        let audio = STANDARD.decode(payload.audio_content)?;
        debug!("Synthesized {} bytes for {:?}", audio.len(), text);
        Ok(Bytes::from(audio))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Stand-in synthesis server. Audio is `mp3:<text>`; the text "fail"
    /// answers 500.
    pub struct StubTts {
        pub endpoint: String,
        pub calls: Arc<AtomicUsize>,
    }

    async fn synthesize(
        State(calls): State<Arc<AtomicUsize>>,
        Json(body): Json<Value>,
    ) -> Result<Json<Value>, StatusCode> {
        calls.fetch_add(1, Ordering::SeqCst);
        let text = body["input"]["text"].as_str().unwrap_or_default();
        if text == "fail" {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        assert_eq!(body["audioConfig"]["audioEncoding"], "MP3");
        Ok(Json(json!({ "audioContent": STANDARD.encode(format!("mp3:{}", text)) })))
    }

    impl StubTts {
        pub async fn start() -> Self {
            let calls = Arc::new(AtomicUsize::new(0));
            let app = Router::new()
                .route("/synthesize", post(synthesize))
                .with_state(calls.clone());

            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            });

            Self {
                endpoint: format!("http://{}/synthesize", addr),
                calls,
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }
}
