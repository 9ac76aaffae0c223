//! NYC 311 service requests (NYC Open Data dataset `erm2-nwe9`).

use std::time::Duration;

use async_trait::async_trait;
use route_safety_corridor_models::HazardRecord;

use crate::retry::RetryPolicy;
use crate::socrata::{self, SocrataQuery};
use crate::{FetchOptions, HazardSource, SourceError};

/// SODA endpoint of the 311 service requests dataset.
pub const DEFAULT_DATASET_URL: &str = "https://data.cityofnewyork.us/resource/erm2-nwe9.json";

/// Environment variable holding the optional Socrata app token.
pub const APP_TOKEN_ENV: &str = "SOCRATA_APP_TOKEN";

/// Limit on a single page request, retries excluded.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// [`HazardSource`] backed by the NYC 311 dataset.
pub struct Nyc311Source {
    client: reqwest::Client,
    dataset_url: String,
    app_token: Option<String>,
    retry: RetryPolicy,
}

impl Nyc311Source {
    /// Creates a source for `dataset_url`. Requests are throttled harder
    /// without an app token, but still work.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(dataset_url: String, app_token: Option<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            dataset_url,
            app_token: app_token.filter(|t| !t.trim().is_empty()),
            retry: RetryPolicy::default(),
        })
    }

    /// Creates a source for `dataset_url` using the token in
    /// `SOCRATA_APP_TOKEN`, if set.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn from_env(dataset_url: String) -> Result<Self, SourceError> {
        Self::new(dataset_url, std::env::var(APP_TOKEN_ENV).ok())
    }

    /// Replaces the request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, SourceError> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()?;
        Ok(self)
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Builds the query for recent located complaints of the given types.
#[must_use]
pub fn build_query(options: &FetchOptions) -> SocrataQuery {
    let mut clauses = vec![
        format!("created_date > {}", socrata::timestamp_literal(options.since)),
        "latitude IS NOT NULL".to_string(),
    ];
    clauses.extend(socrata::in_clause("complaint_type", &options.complaint_types));

    SocrataQuery {
        where_clause: clauses.join(" AND "),
        order: "created_date DESC".to_string(),
        limit: options.limit,
    }
}

/// Converts raw rows into records, dropping rows that are not objects.
///
/// Coordinates are not validated here; unparseable ones are counted as
/// skipped by the scan.
#[must_use]
pub fn parse_rows(rows: Vec<serde_json::Value>) -> Vec<HazardRecord> {
    let total = rows.len();
    let records: Vec<HazardRecord> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value(row) {
            Ok(record) => Some(record),
            Err(e) => {
                log::debug!("Dropping 311 row #{index}: {e}");
                None
            }
        })
        .collect();

    if records.len() < total {
        log::warn!(
            "Dropped {} of {total} malformed 311 rows",
            total - records.len()
        );
    }

    records
}

#[async_trait]
impl HazardSource for Nyc311Source {
    fn id(&self) -> &'static str {
        "nyc_311"
    }

    async fn fetch_hazards(&self, options: &FetchOptions) -> Result<Vec<HazardRecord>, SourceError> {
        let query = build_query(options);
        let rows = socrata::fetch_rows(
            &self.client,
            &self.dataset_url,
            self.app_token.as_deref(),
            &query,
            &self.retry,
        )
        .await?;

        if rows.is_empty() {
            log::info!("No matching 311 reports since {}", options.since);
        }

        let records = parse_rows(rows);
        log::info!("Fetched {} 311 reports", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use route_safety_corridor_models::MISSING_DESCRIPTOR;

    use super::*;

    #[test]
    fn query_filters_date_location_and_types() {
        let options = FetchOptions {
            since: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
            limit: 5000,
            complaint_types: vec![
                "Street Condition".to_string(),
                "Blocked Driveway".to_string(),
            ],
        };

        let query = build_query(&options);
        assert_eq!(
            query.where_clause,
            "created_date > '2024-05-01T08:30:00.000' AND latitude IS NOT NULL \
             AND complaint_type IN ('Street Condition', 'Blocked Driveway')"
        );
        assert_eq!(query.order, "created_date DESC");
        assert_eq!(query.limit, 5000);
    }

    #[test]
    fn empty_type_list_means_all_types() {
        let options = FetchOptions {
            since: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            limit: 10,
            complaint_types: vec![],
        };
        assert!(!build_query(&options).where_clause.contains("complaint_type"));
    }

    #[test]
    fn parses_socrata_rows() {
        let rows = vec![
            serde_json::json!({
                "unique_key": "61234567",
                "created_date": "2024-05-01T09:12:44.000",
                "complaint_type": "Street Condition",
                "descriptor": "Pothole",
                "incident_address": "350 5 AVENUE",
                "latitude": "40.74844",
                "longitude": "-73.98566",
                "borough": "MANHATTAN"
            }),
            serde_json::json!({
                "complaint_type": "Illegal Parking",
                "latitude": 40.75,
                "longitude": -73.99
            }),
            serde_json::json!({
                "unique_key": 61234999,
                "complaint_type": null,
                "descriptor": 7,
                "latitude": "40.7",
                "longitude": "-73.9"
            }),
            serde_json::json!("not a row"),
        ];

        let records = parse_rows(rows);
        assert_eq!(records.len(), 3);

        let pothole = &records[0];
        assert_eq!(pothole.unique_key.as_deref(), Some("61234567"));
        assert_eq!(pothole.incident_address.as_deref(), Some("350 5 AVENUE"));
        let location = pothole.coordinate().unwrap();
        assert!((location.latitude() - 40.748_44).abs() < 1e-9);
        assert!((location.longitude() - -73.985_66).abs() < 1e-9);

        assert_eq!(records[1].descriptor, MISSING_DESCRIPTOR);
        assert!(records[1].coordinate().is_ok());

        assert_eq!(records[2].unique_key.as_deref(), Some("61234999"));
        assert_eq!(records[2].complaint_type, "");
        assert_eq!(records[2].descriptor, "7");
    }

    #[test]
    fn blank_token_is_ignored() {
        let source =
            Nyc311Source::new(DEFAULT_DATASET_URL.to_string(), Some("  ".to_string())).unwrap();
        assert!(source.app_token.is_none());
        assert_eq!(source.id(), "nyc_311");
    }

    #[tokio::test]
    async fn stalled_server_times_out_after_retries() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // Accept and hold every connection without ever answering.
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let source = Nyc311Source::new(format!("http://{addr}/resource.json"), None)
            .unwrap()
            .with_timeout(Duration::from_millis(200))
            .unwrap()
            .with_retry(RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(1),
            });
        let options = FetchOptions::lookback(3, 10, vec![]);

        match source.fetch_hazards(&options).await {
            Err(SourceError::Http(e)) => assert!(e.is_timeout(), "{e}"),
            other => panic!("expected a timeout, got {other:?}"),
        }
        server.abort();
    }
}
