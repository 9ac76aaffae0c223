//! Google Directions API client.
//!
//! See <https://developers.google.com/maps/documentation/directions/get-directions>

use std::time::Duration;

use crate::{Route, RoutingError, RoutingProvider, TravelMode};

/// Production endpoint.
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

/// Limit on a whole directions request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`RoutingProvider`] backed by the Google Directions API.
pub struct GoogleDirections {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleDirections {
    /// Creates a client for the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Http`] if the HTTP client cannot be built.
    pub fn new(api_key: String) -> Result<Self, RoutingError> {
        Self::with_timeout(api_key, REQUEST_TIMEOUT)
    }

    /// Creates a client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Http`] if the HTTP client cannot be built.
    pub fn with_timeout(api_key: String, timeout: Duration) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Creates a client using the key in `GOOGLE_MAPS_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Config`] if the variable is unset or empty.
    pub fn from_env() -> Result<Self, RoutingError> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(key),
            _ => Err(RoutingError::Config {
                message: format!("{API_KEY_ENV} environment variable not set"),
            }),
        }
    }

    /// Overrides the endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait::async_trait]
impl RoutingProvider for GoogleDirections {
    async fn best_route(
        &self,
        start: &str,
        end: &str,
        mode: TravelMode,
    ) -> Result<Option<Route>, RoutingError> {
        log::debug!("Requesting {mode} directions: {start} -> {end}");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("origin", start),
                ("destination", end),
                ("mode", mode.as_ref()),
                ("departure_time", "now"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let body: serde_json::Value = resp.json().await?;
        let route = parse_response(&body)?;

        match &route {
            Some(route) => log::info!(
                "Found {mode} route via '{}' ({} warnings)",
                route.summary,
                route.warnings.len()
            ),
            None => log::info!("No {mode} route from {start} to {end}"),
        }

        Ok(route)
    }
}

/// Parses a Directions response, keeping only the first route.
fn parse_response(body: &serde_json::Value) -> Result<Option<Route>, RoutingError> {
    let status = body["status"].as_str().ok_or_else(|| RoutingError::Parse {
        message: "Missing status in Directions response".to_string(),
    })?;

    match status {
        "OK" => {}
        "ZERO_RESULTS" | "NOT_FOUND" => return Ok(None),
        other => {
            return Err(RoutingError::Api {
                status: other.to_string(),
                message: body["error_message"].as_str().unwrap_or_default().to_string(),
            });
        }
    }

    let Some(first) = body["routes"].as_array().and_then(|routes| routes.first()) else {
        return Ok(None);
    };

    let overview_polyline = first["overview_polyline"]["points"]
        .as_str()
        .ok_or_else(|| RoutingError::Parse {
            message: "Missing overview_polyline in Directions route".to_string(),
        })?
        .to_string();

    let warnings = first["warnings"]
        .as_array()
        .map(|w| {
            w.iter()
                .filter_map(serde_json::Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(Some(Route {
        summary: first["summary"].as_str().unwrap_or_default().to_string(),
        overview_polyline,
        warnings,
        raw: first.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_route() {
        let body = serde_json::json!({
            "status": "OK",
            "routes": [
                {
                    "summary": "7th Ave",
                    "overview_polyline": {"points": "_ocsF~xp|Lo}@?"},
                    "warnings": ["Walking directions are in beta."],
                    "legs": []
                },
                {
                    "summary": "Broadway",
                    "overview_polyline": {"points": "??"},
                    "warnings": []
                }
            ]
        });

        let route = parse_response(&body).unwrap().unwrap();
        assert_eq!(route.summary, "7th Ave");
        assert_eq!(route.overview_polyline, "_ocsF~xp|Lo}@?");
        assert_eq!(route.warnings, ["Walking directions are in beta."]);
        assert_eq!(route.raw["legs"], serde_json::json!([]));
    }

    #[test]
    fn no_route_statuses_are_absence() {
        for status in ["ZERO_RESULTS", "NOT_FOUND"] {
            let body = serde_json::json!({"status": status, "routes": []});
            assert!(parse_response(&body).unwrap().is_none());
        }
        let body = serde_json::json!({"status": "OK", "routes": []});
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn error_status_is_an_error() {
        let body = serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid.",
            "routes": []
        });
        match parse_response(&body) {
            Err(RoutingError::Api { status, message }) => {
                assert_eq!(status, "REQUEST_DENIED");
                assert_eq!(message, "The provided API key is invalid.");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn route_without_polyline_is_a_parse_error() {
        let body = serde_json::json!({
            "status": "OK",
            "routes": [{"summary": "nowhere"}]
        });
        assert!(matches!(
            parse_response(&body),
            Err(RoutingError::Parse { .. })
        ));
    }

    #[test]
    fn missing_warnings_default_to_empty() {
        let body = serde_json::json!({
            "status": "OK",
            "routes": [{"overview_polyline": {"points": "??"}}]
        });
        let route = parse_response(&body).unwrap().unwrap();
        assert!(route.warnings.is_empty());
        assert_eq!(route.summary, "");
    }

    #[tokio::test]
    async fn stalled_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // Accept and hold the connection without ever answering.
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let directions = GoogleDirections::with_timeout("key".to_string(), Duration::from_millis(200))
            .unwrap()
            .with_base_url(format!("http://{addr}/directions/json"));

        let result = directions
            .best_route("Times Square", "Union Square", TravelMode::Walking)
            .await;

        match result {
            Err(RoutingError::Http(e)) => assert!(e.is_timeout(), "{e}"),
            other => panic!("expected a timeout, got {other:?}"),
        }
        server.abort();
    }
}
