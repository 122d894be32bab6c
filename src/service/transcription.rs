//! `TranscriptionService` trait and its HTTP implementation.
//!
//! The voice note is uploaded as a single multipart part named `file`
//! (`voice_note.wav`, `audio/wav`) to `{base_url}/analyze-voice`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::error::ServiceError;
use super::http::{build_client, read_envelope};
use super::model::parse_transcription_response;
use crate::audio::AudioPayload;
use crate::config::BackendConfig;

/// Remote speech-to-text.
///
/// Returns the detected text. An empty string is a valid answer; the
/// caller decides what to do with blank transcripts.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, ServiceError>;
}

/// Calls the backend's `/analyze-voice` endpoint.
pub struct HttpTranscriptionService {
    client: reqwest::Client,
    url: String,
}

impl HttpTranscriptionService {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::with_client(build_client(config), config)
    }

    pub fn with_client(client: reqwest::Client, config: &BackendConfig) -> Self {
        Self {
            client,
            url: config.transcribe_url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn build_form(audio: &AudioPayload) -> Result<Form, ServiceError> {
    let part = Part::bytes(audio.data.clone())
        .file_name(audio.file_name.clone())
        .mime_str(&audio.mime_type)
        .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;
    Ok(Form::new().part("file", part))
}

#[async_trait]
impl TranscriptionService for HttpTranscriptionService {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, ServiceError> {
        let form = build_form(audio)?;

        log::info!(
            "transcription: POST {} ({} bytes, {:.1}s)",
            self.url,
            audio.data.len(),
            audio.duration_secs
        );

        let response = self.client.post(&self.url).multipart(form).send().await?;
        let body = read_envelope(response).await?;
        let text = parse_transcription_response(body)?;

        log::debug!("transcription: {} chars detected", text.chars().count());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{VOICE_NOTE_FILE_NAME, VOICE_NOTE_MIME};
    use crate::service::http::test_server::{client, serve_once};

    fn voice_note() -> AudioPayload {
        AudioPayload {
            file_name: VOICE_NOTE_FILE_NAME.to_string(),
            mime_type: VOICE_NOTE_MIME.to_string(),
            data: vec![0u8; 44],
            duration_secs: 0.0,
        }
    }

    #[test]
    fn url_comes_from_config() {
        let mut config = BackendConfig::default();
        config.base_url = "http://10.0.0.5:8000".into();
        config.transcribe_path = "voice".into();
        let service = HttpTranscriptionService::from_config(&config);
        assert_eq!(service.url(), "http://10.0.0.5:8000/voice");
    }

    #[test]
    fn voice_note_form_builds() {
        assert!(build_form(&voice_note()).is_ok());
    }

    #[test]
    fn bad_mime_is_invalid_request() {
        let mut audio = voice_note();
        audio.mime_type = "???".into();
        assert!(matches!(
            build_form(&audio),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connectivity_error() {
        let mut config = BackendConfig::default();
        config.base_url = "http://127.0.0.1:9".into();
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .expect("client");
        let service = HttpTranscriptionService::with_client(client, &config);

        let err = service.transcribe(&voice_note()).await.unwrap_err();
        assert!(err.is_connectivity(), "unexpected error: {err:?}");
    }

    // ---- over the wire ----------------------------------------------------

    fn service_for(base_url: String) -> HttpTranscriptionService {
        let mut config = BackendConfig::default();
        config.base_url = base_url;
        HttpTranscriptionService::with_client(client(), &config)
    }

    #[tokio::test]
    async fn voice_note_is_a_single_file_part() {
        let (url, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"status":"success","detected_text":"hand embroidered silk"}"#,
        )
        .await;
        let text = service_for(url).transcribe(&voice_note()).await.expect("text");
        let raw = server.await.expect("server task");

        assert_eq!(text, "hand embroidered silk");
        assert!(raw.starts_with("POST /analyze-voice HTTP/1.1\r\n"), "{raw}");
        assert_eq!(raw.matches("form-data; name=").count(), 1);
        assert!(raw.contains(r#"name="file"; filename="voice_note.wav""#));
        assert!(raw.to_ascii_lowercase().contains("content-type: audio/wav"));
    }

    #[tokio::test]
    async fn server_error_envelope_is_rejected() {
        let (url, server) = serve_once(
            "500 Internal Server Error",
            "application/json",
            r#"{"status":"error","message":"Audio too short"}"#,
        )
        .await;
        let err = service_for(url).transcribe(&voice_note()).await.unwrap_err();
        server.await.expect("server task");

        assert!(
            matches!(err, ServiceError::Rejected { ref message, .. } if message == "Audio too short"),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn gateway_html_page_is_a_parse_error() {
        let (url, server) = serve_once("502 Bad Gateway", "text/html", "<html>down</html>").await;
        let err = service_for(url).transcribe(&voice_note()).await.unwrap_err();
        server.await.expect("server task");

        assert!(
            matches!(err, ServiceError::Parse(ref m) if m.starts_with("HTTP 502")),
            "{err:?}"
        );
    }
}
