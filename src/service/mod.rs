//! Backend clients: product analysis and voice transcription.
//!
//! Both services sit behind `async_trait` traits so the session can be
//! driven by test doubles.  The HTTP implementations share one `reqwest`
//! client configuration ([`build_client`]) and one envelope reader.

pub mod analysis;
pub mod error;
mod http;
pub mod model;
pub mod transcription;

pub use analysis::{form_fields, AnalysisService, FormField, HttpAnalysisService};
pub use error::{ServiceError, CONNECTIVITY_MESSAGE};
pub use http::build_client;
pub use model::{
    parse_analysis_response, parse_transcription_response, AmazonListing, AnalysisPayload,
    AnalysisRequest, AnalysisResult, Listings, MarketStats,
};
pub use transcription::{HttpTranscriptionService, TranscriptionService};
