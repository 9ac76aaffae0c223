//! Socrata SODA API query building and fetching.
//!
//! Builds `$where`/`$order`/`$limit` queries and fetches one page of rows
//! through the [`retry`](crate::retry) helper.

use chrono::{DateTime, Utc};

use crate::SourceError;
use crate::retry::{self, RetryPolicy};

/// Timestamp layout of SODA `floating_timestamp` literals.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// A single-page SODA query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocrataQuery {
    /// `$where` clause.
    pub where_clause: String,
    /// `$order` clause.
    pub order: String,
    /// `$limit`.
    pub limit: u32,
}

impl SocrataQuery {
    /// Query parameters in the order SODA documents them.
    #[must_use]
    pub fn params(&self) -> [(&'static str, String); 3] {
        [
            ("$where", self.where_clause.clone()),
            ("$order", self.order.clone()),
            ("$limit", self.limit.to_string()),
        ]
    }
}

/// Quotes `value` as a SoQL string literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Formats `at` as a SoQL timestamp literal.
#[must_use]
pub fn timestamp_literal(at: DateTime<Utc>) -> String {
    quote_literal(&at.naive_utc().format(TIMESTAMP_FORMAT).to_string())
}

/// Builds `column IN ('a', 'b', ...)`, or `None` for an empty list.
#[must_use]
pub fn in_clause(column: &str, values: &[String]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let list = values
        .iter()
        .map(|v| quote_literal(v))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("{column} IN ({list})"))
}

/// Fetches the rows matching `query` from the dataset at `api_url`.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after retries or the
/// response is not a JSON array.
pub async fn fetch_rows(
    client: &reqwest::Client,
    api_url: &str,
    app_token: Option<&str>,
    query: &SocrataQuery,
    policy: &RetryPolicy,
) -> Result<Vec<serde_json::Value>, SourceError> {
    let params = query.params();

    log::info!(
        "Fetching Socrata rows: limit={}, where={}",
        query.limit,
        query.where_clause
    );

    let body = retry::send_json(policy, || {
        let request = client.get(api_url).query(&params);
        match app_token {
            Some(token) => request.header("X-App-Token", token),
            None => request,
        }
    })
    .await?;

    match body {
        serde_json::Value::Array(rows) => Ok(rows),
        other => Err(SourceError::Response {
            message: format!(
                "expected a JSON array, got {}",
                other.get("message").and_then(|m| m.as_str()).unwrap_or("an object")
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn quotes_embedded_apostrophes() {
        assert_eq!(quote_literal("Street Condition"), "'Street Condition'");
        assert_eq!(quote_literal("Driver's Complaint"), "'Driver''s Complaint'");
    }

    #[test]
    fn formats_floating_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(timestamp_literal(at), "'2024-05-01T08:30:00.000'");
    }

    #[test]
    fn builds_in_clause() {
        let values = vec!["Noise - Residential".to_string(), "Illegal Parking".to_string()];
        assert_eq!(
            in_clause("complaint_type", &values).unwrap(),
            "complaint_type IN ('Noise - Residential', 'Illegal Parking')"
        );
        assert!(in_clause("complaint_type", &[]).is_none());
    }

    #[test]
    fn params_carry_limit() {
        let query = SocrataQuery {
            where_clause: "latitude IS NOT NULL".to_string(),
            order: "created_date DESC".to_string(),
            limit: 5000,
        };
        let params = query.params();
        assert_eq!(params[2], ("$limit", "5000".to_string()));
        assert_eq!(params[1].1, "created_date DESC");
    }
}
