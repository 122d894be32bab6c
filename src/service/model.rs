//! Request snapshot and response types for the analysis backend.
//!
//! Response envelopes are tagged by `status`:
//!
//! ```json
//! { "status": "success", "product_name": "Shawl", "suggested_price": "₹ 4500", ... }
//! { "status": "error", "message": "...", "details": "..." }
//! ```

use serde::{Deserialize, Serialize};

use super::error::ServiceError;
use crate::gauge;
use crate::media::ImagePayload;

const DEFAULT_ANALYSIS_ERROR: &str = "Analysis failed.";
const DEFAULT_TRANSCRIPTION_ERROR: &str = "Transcription failed.";

// ---------------------------------------------------------------------------
// AnalysisRequest
// ---------------------------------------------------------------------------

/// Read-only snapshot sent to the analysis service.
///
/// Built once at submit time; there are no mutators.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    files: Vec<ImagePayload>,
    user_features: String,
    user_price: Option<u64>,
}

impl AnalysisRequest {
    pub fn new(files: Vec<ImagePayload>, user_features: impl Into<String>, user_price: Option<u64>) -> Self {
        Self {
            files,
            user_features: user_features.into(),
            user_price,
        }
    }

    pub fn files(&self) -> &[ImagePayload] {
        &self.files
    }

    pub fn user_features(&self) -> &str {
        &self.user_features
    }

    pub fn user_price(&self) -> Option<u64> {
        self.user_price
    }

    /// The `user_price` form value, string-encoded.
    pub fn user_price_field(&self) -> Option<String> {
        self.user_price.map(|p| p.to_string())
    }
}

// ---------------------------------------------------------------------------
// Success payload
// ---------------------------------------------------------------------------

/// Market comparison gathered by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub avg: f64,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl MarketStats {
    /// Gauge position of `current` within this market range.
    pub fn gauge_position(&self, current: f64) -> f64 {
        gauge::position(Some(self.min), Some(self.max), Some(current))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmazonListing {
    pub title: String,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Ready-to-post marketplace copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listings {
    pub whatsapp: String,
    pub amazon: AmazonListing,
    #[serde(default)]
    pub instagram: Option<String>,
}

/// Everything a successful analysis returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub product_name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub material: String,
    /// Display string, e.g. `"₹ 4500"`.
    pub suggested_price: String,
    #[serde(default)]
    pub raw_price: f64,
    #[serde(default)]
    pub price_uplift: Option<String>,
    #[serde(default)]
    pub unique_tags: Vec<String>,
    #[serde(default)]
    pub pricing_reason: Option<String>,
    #[serde(default)]
    pub photo_advice: Option<Vec<String>>,
    #[serde(default)]
    pub market_stats: Option<MarketStats>,
    pub listings: Listings,
}

impl AnalysisPayload {
    /// Where the suggested price sits in the market range, if one was found.
    pub fn market_position(&self) -> Option<f64> {
        self.market_stats
            .as_ref()
            .map(|stats| stats.gauge_position(self.raw_price))
    }
}

// ---------------------------------------------------------------------------
// AnalysisResult
// ---------------------------------------------------------------------------

/// Outcome reported by the analysis backend.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    Success(AnalysisPayload),
    Error {
        message: String,
        details: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum AnalysisEnvelope {
    Success(AnalysisPayload),
    Error {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        details: Option<String>,
    },
}

/// Decode an `/analyze` response body.
pub fn parse_analysis_response(body: serde_json::Value) -> Result<AnalysisResult, ServiceError> {
    let envelope: AnalysisEnvelope =
        serde_json::from_value(body).map_err(|e| ServiceError::Parse(e.to_string()))?;

    Ok(match envelope {
        AnalysisEnvelope::Success(payload) => AnalysisResult::Success(payload),
        AnalysisEnvelope::Error { message, details } => AnalysisResult::Error {
            message: message.unwrap_or_else(|| DEFAULT_ANALYSIS_ERROR.to_string()),
            details,
        },
    })
}

// ---------------------------------------------------------------------------
// Transcription
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TranscriptionEnvelope {
    status: String,
    #[serde(default)]
    detected_text: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Decode an `/analyze-voice` response body into the detected text.
///
/// `status = "error"`, or a success without `detected_text`, is
/// [`ServiceError::Rejected`].
pub fn parse_transcription_response(body: serde_json::Value) -> Result<String, ServiceError> {
    let envelope: TranscriptionEnvelope =
        serde_json::from_value(body).map_err(|e| ServiceError::Parse(e.to_string()))?;

    match (envelope.status.as_str(), envelope.detected_text) {
        ("success", Some(text)) => Ok(text),
        ("success", None) => Err(ServiceError::Rejected {
            message: "no text detected".to_string(),
            details: None,
        }),
        ("error", _) => Err(ServiceError::Rejected {
            message: envelope
                .message
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_ERROR.to_string()),
            details: envelope.details,
        }),
        (other, _) => Err(ServiceError::Parse(format!("unknown status {other:?}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
