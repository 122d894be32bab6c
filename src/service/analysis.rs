//! `AnalysisService` trait and its HTTP implementation.
//!
//! [`HttpAnalysisService`] posts a multipart form to `{base_url}/analyze`:
//!
//! | Field           | Kind | Value                              |
//! |-----------------|------|------------------------------------|
//! | `files`         | file | one part per image, in batch order |
//! | `user_features` | text | free-text features                 |
//! | `user_price`    | text | expected price, omitted when unset |

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::error::ServiceError;
use super::http::{build_client, read_envelope};
use super::model::{parse_analysis_response, AnalysisRequest, AnalysisResult};
use crate::config::BackendConfig;
use crate::media::ImagePayload;

// ---------------------------------------------------------------------------
// AnalysisService trait
// ---------------------------------------------------------------------------

/// Remote product analysis.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn AnalysisService>` with the tasks the session spawns.
///
/// `Ok(AnalysisResult::Error { .. })` means the backend answered and
/// declined; `Err(_)` means no usable answer arrived.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ServiceError>;
}

// ---------------------------------------------------------------------------
// Form layout
// ---------------------------------------------------------------------------

/// One multipart field of an analysis request.
#[derive(Debug, Clone, PartialEq)]
pub enum FormField<'a> {
    File {
        name: &'static str,
        image: &'a ImagePayload,
    },
    Text {
        name: &'static str,
        value: String,
    },
}

/// The multipart fields for `request`, in wire order.
pub fn form_fields(request: &AnalysisRequest) -> Vec<FormField<'_>> {
    let mut fields: Vec<FormField<'_>> = request
        .files()
        .iter()
        .map(|image| FormField::File {
            name: "files",
            image,
        })
        .collect();

    fields.push(FormField::Text {
        name: "user_features",
        value: request.user_features().to_string(),
    });

    if let Some(price) = request.user_price_field() {
        fields.push(FormField::Text {
            name: "user_price",
            value: price,
        });
    }

    fields
}

fn build_form(request: &AnalysisRequest) -> Result<Form, ServiceError> {
    let mut form = Form::new();
    for field in form_fields(request) {
        form = match field {
            FormField::File { name, image } => {
                let part = Part::bytes(image.data().to_vec())
                    .file_name(image.file_name().to_string())
                    .mime_str(image.mime_type())
                    .map_err(|e| ServiceError::InvalidRequest(e.to_string()))?;
                form.part(name, part)
            }
            FormField::Text { name, value } => form.text(name, value),
        };
    }
    Ok(form)
}

// ---------------------------------------------------------------------------
// HttpAnalysisService
// ---------------------------------------------------------------------------

/// Calls the backend's `/analyze` endpoint.
pub struct HttpAnalysisService {
    client: reqwest::Client,
    url: String,
}

impl HttpAnalysisService {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::with_client(build_client(config), config)
    }

    /// Reuse an existing client (e.g. one shared with transcription).
    pub fn with_client(client: reqwest::Client, config: &BackendConfig) -> Self {
        Self {
            client,
            url: config.analyze_url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ServiceError> {
        let form = build_form(request)?;

        log::info!(
            "analysis: POST {} ({} image(s), price {:?})",
            self.url,
            request.files().len(),
            request.user_price()
        );

        let response = self.client.post(&self.url).multipart(form).send().await?;
        let body = read_envelope(response).await?;
        parse_analysis_response(body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
