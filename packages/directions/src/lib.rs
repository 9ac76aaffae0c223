#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route lookup between two free-form locations.
//!
//! [`RoutingProvider`] is the seam the planner depends on. The only
//! implementation is [`google::GoogleDirections`], which asks the Google
//! Directions API for the best route in a given [`TravelMode`] and keeps
//! the encoded overview polyline for corridor matching.

pub mod google;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// How the traveller gets from start to end.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TravelMode {
    /// On foot.
    Walking,
    /// Public transit.
    Transit,
    /// By car.
    Driving,
    /// By bicycle.
    Bicycling,
}

/// The best route returned for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Short human-readable name, usually the main road.
    pub summary: String,
    /// Encoded polyline of the whole route.
    pub overview_polyline: String,
    /// Warnings the provider wants shown with the route.
    pub warnings: Vec<String>,
    /// The provider's full route object.
    pub raw: serde_json::Value,
}

/// Errors from routing operations.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The provider rejected the request.
    #[error("Routing request failed with status {status}: {message}")]
    Api {
        /// Provider status code, e.g. `REQUEST_DENIED`.
        status: String,
        /// Provider error message, if any.
        message: String,
    },

    /// Missing credentials or other setup problem.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}

/// Finds routes between two locations.
#[async_trait::async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Returns the best route from `start` to `end`, or `None` if the
    /// provider found no route.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the request fails or the provider
    /// reports an error other than "no route".
    async fn best_route(
        &self,
        start: &str,
        end: &str,
        mode: TravelMode,
    ) -> Result<Option<Route>, RoutingError>;
}
