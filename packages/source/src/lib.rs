#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Public complaint feeds that supply candidate hazards.
//!
//! Each feed implements the [`HazardSource`] trait. [`nyc_311::Nyc311Source`]
//! reads recent NYC 311 service requests through the Socrata SODA API.

pub mod nyc_311;
pub mod retry;
pub mod socrata;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use route_safety_corridor_models::HazardRecord;

/// Errors that can occur during data source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response had an unexpected shape.
    #[error("Unexpected response: {message}")]
    Response {
        /// Description of what went wrong.
        message: String,
    },
}

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Only fetch records created after this instant.
    pub since: DateTime<Utc>,
    /// Maximum number of records to fetch.
    pub limit: u32,
    /// Complaint types to include. Empty means all types.
    pub complaint_types: Vec<String>,
}

impl FetchOptions {
    /// Options covering the last `days` days up to now.
    ///
    /// A window reaching past the earliest representable instant starts
    /// there instead.
    #[must_use]
    pub fn lookback(days: u32, limit: u32, complaint_types: Vec<String>) -> Self {
        let since = chrono::Duration::try_days(i64::from(days))
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Self {
            since,
            limit,
            complaint_types,
        }
    }
}

/// A feed of recent public complaints.
#[async_trait]
pub trait HazardSource: Send + Sync {
    /// Returns a short identifier for this feed (e.g., `"nyc_311"`).
    fn id(&self) -> &str;

    /// Fetches records matching `options`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the response cannot
    /// be read.
    async fn fetch_hazards(&self, options: &FetchOptions) -> Result<Vec<HazardRecord>, SourceError>;
}
