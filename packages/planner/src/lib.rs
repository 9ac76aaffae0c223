#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! One route-safety request from start to finish.
//!
//! [`analyze`] looks up the best walking and transit routes, and for a
//! walking route fetches recent complaints and scans them against the
//! route corridor. Collaborator failures degrade: a routing error means
//! no route of that mode, a hazard feed error means no hazards. The only
//! failures a caller sees are a missing location and "neither mode found
//! a route".

pub mod config;

use std::collections::BTreeSet;
use std::sync::Arc;

use route_safety_corridor::progress::ProgressCallback;
use route_safety_corridor::scan::{self, HazardClassifier};
use route_safety_corridor_models::{HazardRecord, ScanResult};
use route_safety_directions::{Route, RoutingProvider, TravelMode};
use route_safety_source::HazardSource;
use serde::Serialize;
use thiserror::Error;

use crate::config::ScanConfig;

/// Errors surfaced to the caller of [`analyze`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// `start` or `end` was empty.
    #[error("Missing '{field}' location")]
    MissingLocation {
        /// `"start"` or `"end"`.
        field: &'static str,
    },

    /// Neither a walking nor a transit route was found.
    #[error("Could not find any routes from {start} to {end}")]
    NoUsableRoute {
        /// Requested start.
        start: String,
        /// Requested end.
        end: String,
    },
}

/// The external services one analysis talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Route lookup.
    pub routing: Arc<dyn RoutingProvider>,
    /// Complaint feed.
    pub hazards: Arc<dyn HazardSource>,
    /// Complaint severity.
    pub classifier: Arc<dyn HazardClassifier>,
}

/// What the caller wants analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRequest {
    /// Free-form start location.
    pub start: String,
    /// Free-form end location.
    pub end: String,
    /// Categories counted toward the score; `None` uses the configured set.
    pub unsafe_categories: Option<BTreeSet<String>>,
}

/// The walking route and the complaints along it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkingAnalysis {
    /// The route as returned by the routing provider.
    pub route: Route,
    /// Findings and score for the route corridor.
    pub scan: ScanResult,
}

/// The transit route and the provider's warnings for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitAnalysis {
    /// The route as returned by the routing provider.
    pub route: Route,
    /// Warnings to show with the route.
    pub warnings: Vec<String>,
}

/// Result of one [`analyze`] call. At least one side is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteAnalysis {
    /// Walking route analysis, if a walking route was found.
    pub walking: Option<WalkingAnalysis>,
    /// Transit route, if a transit route was found.
    pub transit: Option<TransitAnalysis>,
}

/// Analyzes the route from `request.start` to `request.end`.
///
/// A walking route whose polyline cannot be decoded is still reported,
/// with [`CorridorStatus::Unusable`](route_safety_corridor_models::CorridorStatus::Unusable)
/// in its scan.
///
/// # Errors
///
/// Returns [`PlannerError::MissingLocation`] if either location is blank
/// and [`PlannerError::NoUsableRoute`] if neither mode has a route.
pub async fn analyze(
    collaborators: &Collaborators,
    config: &ScanConfig,
    request: &RouteRequest,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<RouteAnalysis, PlannerError> {
    let start = required("start", &request.start)?;
    let end = required("end", &request.end)?;

    log::info!("Analyzing route: {start} -> {end}");

    let routing = collaborators.routing.as_ref();
    let (walking_route, transit_route) = tokio::join!(
        lookup_route(routing, start, end, TravelMode::Walking),
        lookup_route(routing, start, end, TravelMode::Transit),
    );

    let walking = match walking_route {
        Some(route) => {
            let hazards = fetch_hazards(collaborators.hazards.as_ref(), config).await;
            let options = config.scan_options(request.unsafe_categories.as_ref());
            let scan = scan::scan_concurrent(
                &route.overview_polyline,
                &hazards,
                &options,
                collaborators.classifier.as_ref(),
                progress,
            )
            .await;
            log::info!(
                "Walking route score: {} ({} hazards on route)",
                scan.total_hazard_score,
                scan.findings.len()
            );
            Some(WalkingAnalysis { route, scan })
        }
        None => None,
    };

    let transit = transit_route.map(|route| TransitAnalysis {
        warnings: route.warnings.clone(),
        route,
    });

    if walking.is_none() && transit.is_none() {
        return Err(PlannerError::NoUsableRoute {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    Ok(RouteAnalysis { walking, transit })
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, PlannerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PlannerError::MissingLocation { field });
    }
    Ok(value)
}

async fn lookup_route(
    routing: &dyn RoutingProvider,
    start: &str,
    end: &str,
    mode: TravelMode,
) -> Option<Route> {
    match routing.best_route(start, end, mode).await {
        Ok(route) => route,
        Err(e) => {
            log::warn!("Error fetching {mode} directions: {e}");
            None
        }
    }
}

async fn fetch_hazards(source: &dyn HazardSource, config: &ScanConfig) -> Vec<HazardRecord> {
    match source.fetch_hazards(&config.fetch_options()).await {
        Ok(hazards) => {
            log::info!(
                "Found {} {} reports to check against",
                hazards.len(),
                source.id()
            );
            hazards
        }
        Err(e) => {
            log::warn!("Error fetching hazards from {}: {e}", source.id());
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use route_safety_corridor_models::{Classification, CorridorStatus};
    use route_safety_directions::RoutingError;
    use route_safety_source::{FetchOptions, SourceError};

    use super::*;

    /// Runs from (40.0, -73.0) north to (40.01, -73.0).
    const ROUTE: &str = "_ocsF~xp|Lo}@?";

    fn route(polyline: &str, warnings: &[&str]) -> Route {
        Route {
            summary: "Test Ave".to_string(),
            overview_polyline: polyline.to_string(),
            warnings: warnings.iter().map(ToString::to_string).collect(),
            raw: serde_json::json!({}),
        }
    }

    struct MockRouting {
        walking: Result<Option<Route>, String>,
        transit: Result<Option<Route>, String>,
    }

    #[async_trait]
    impl RoutingProvider for MockRouting {
        async fn best_route(
            &self,
            _start: &str,
            _end: &str,
            mode: TravelMode,
        ) -> Result<Option<Route>, RoutingError> {
            let answer = match mode {
                TravelMode::Walking => &self.walking,
                _ => &self.transit,
            };
            answer.clone().map_err(|message| RoutingError::Api {
                status: "UNKNOWN_ERROR".to_string(),
                message,
            })
        }
    }

    struct MockSource {
        hazards: Result<Vec<HazardRecord>, String>,
        calls: AtomicUsize,
        seen: Mutex<Option<FetchOptions>>,
    }

    impl MockSource {
        fn new(hazards: Result<Vec<HazardRecord>, String>) -> Self {
            Self {
                hazards,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl HazardSource for MockSource {
        fn id(&self) -> &'static str {
            "mock"
        }

        async fn fetch_hazards(
            &self,
            options: &FetchOptions,
        ) -> Result<Vec<HazardRecord>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = Some(options.clone());
            self.hazards
                .clone()
                .map_err(|message| SourceError::Response { message })
        }
    }

    struct ByDescriptor;

    #[async_trait]
    impl HazardClassifier for ByDescriptor {
        async fn classify(&self, hazard: &HazardRecord) -> Classification {
            match hazard.descriptor.as_str() {
                "Pothole" => Classification::new(6, "Road Hazard"),
                "Loud Music/Party" => Classification::new(2, "Noise"),
                _ => Classification::fallback(),
            }
        }
    }

    fn hazards() -> Vec<HazardRecord> {
        vec![
            HazardRecord::new("Street Condition", "Pothole", 40.005, -73.0),
            HazardRecord::new("Noise - Residential", "Loud Music/Party", 40.002, -73.0001),
            HazardRecord::new("Street Condition", "Pothole", 41.0, -73.0),
        ]
    }

    fn collaborators(routing: MockRouting, source: Arc<MockSource>) -> Collaborators {
        Collaborators {
            routing: Arc::new(routing),
            hazards: source,
            classifier: Arc::new(ByDescriptor),
        }
    }

    fn request() -> RouteRequest {
        RouteRequest {
            start: "Times Square, New York, NY".to_string(),
            end: "Empire State Building, New York, NY".to_string(),
            unsafe_categories: None,
        }
    }

    #[tokio::test]
    async fn scores_walking_route_and_keeps_transit_warnings() {
        let source = Arc::new(MockSource::new(Ok(hazards())));
        let collaborators = collaborators(
            MockRouting {
                walking: Ok(Some(route(ROUTE, &[]))),
                transit: Ok(Some(route("??", &["Service change on the 1 train"]))),
            },
            Arc::clone(&source),
        );
        let config = ScanConfig::defaults().unwrap();

        let analysis = analyze(&collaborators, &config, &request(), None)
            .await
            .unwrap();

        let walking = analysis.walking.unwrap();
        assert_eq!(walking.scan.findings.len(), 2);
        assert_eq!(walking.scan.total_hazard_score, 6);
        assert_eq!(walking.scan.hazards_checked, 3);

        let transit = analysis.transit.unwrap();
        assert_eq!(transit.warnings, ["Service change on the 1 train"]);

        let seen = source.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.limit, config.limit);
        assert_eq!(seen.complaint_types, config.complaint_types);
    }

    #[tokio::test]
    async fn caller_categories_override_configured_set() {
        let source = Arc::new(MockSource::new(Ok(hazards())));
        let collaborators = collaborators(
            MockRouting {
                walking: Ok(Some(route(ROUTE, &[]))),
                transit: Ok(None),
            },
            source,
        );
        let request = RouteRequest {
            unsafe_categories: Some(["Noise".to_string()].into()),
            ..request()
        };

        let analysis = analyze(&collaborators, &ScanConfig::defaults().unwrap(), &request, None)
            .await
            .unwrap();

        assert_eq!(analysis.walking.unwrap().scan.total_hazard_score, 2);
        assert!(analysis.transit.is_none());
    }

    #[tokio::test]
    async fn no_route_in_either_mode_is_an_error() {
        let source = Arc::new(MockSource::new(Ok(hazards())));
        let collaborators = collaborators(
            MockRouting {
                walking: Ok(None),
                transit: Err("OVER_QUERY_LIMIT".to_string()),
            },
            Arc::clone(&source),
        );

        let result = analyze(
            &collaborators,
            &ScanConfig::defaults().unwrap(),
            &request(),
            None,
        )
        .await;

        assert!(matches!(result, Err(PlannerError::NoUsableRoute { .. })));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn route_with_zero_hazards_is_not_an_error() {
        let collaborators = collaborators(
            MockRouting {
                walking: Ok(Some(route(ROUTE, &[]))),
                transit: Ok(None),
            },
            Arc::new(MockSource::new(Ok(vec![]))),
        );

        let analysis = analyze(
            &collaborators,
            &ScanConfig::defaults().unwrap(),
            &request(),
            None,
        )
        .await
        .unwrap();

        let scan = analysis.walking.unwrap().scan;
        assert!(scan.corridor.is_usable());
        assert!(scan.findings.is_empty());
        assert_eq!(scan.total_hazard_score, 0);
    }

    #[tokio::test]
    async fn hazard_feed_failure_means_no_hazards() {
        let collaborators = collaborators(
            MockRouting {
                walking: Ok(Some(route(ROUTE, &[]))),
                transit: Ok(None),
            },
            Arc::new(MockSource::new(Err("HTTP 503".to_string()))),
        );

        let analysis = analyze(
            &collaborators,
            &ScanConfig::defaults().unwrap(),
            &request(),
            None,
        )
        .await
        .unwrap();

        let scan = analysis.walking.unwrap().scan;
        assert_eq!(scan.hazards_checked, 0);
        assert_eq!(scan.total_hazard_score, 0);
    }

    #[tokio::test]
    async fn corrupt_walking_polyline_is_reported_not_fatal() {
        let collaborators = collaborators(
            MockRouting {
                walking: Ok(Some(route("_p~iF", &[]))),
                transit: Ok(None),
            },
            Arc::new(MockSource::new(Ok(hazards()))),
        );

        let analysis = analyze(
            &collaborators,
            &ScanConfig::defaults().unwrap(),
            &request(),
            None,
        )
        .await
        .unwrap();

        let scan = analysis.walking.unwrap().scan;
        assert!(matches!(scan.corridor, CorridorStatus::Unusable { .. }));
        assert!(scan.findings.is_empty());
    }

    #[tokio::test]
    async fn blank_locations_are_rejected() {
        let collaborators = collaborators(
            MockRouting {
                walking: Ok(Some(route(ROUTE, &[]))),
                transit: Ok(None),
            },
            Arc::new(MockSource::new(Ok(vec![]))),
        );
        let config = ScanConfig::defaults().unwrap();

        let request = RouteRequest {
            end: "  ".to_string(),
            ..request()
        };
        assert_eq!(
            analyze(&collaborators, &config, &request, None).await,
            Err(PlannerError::MissingLocation { field: "end" })
        );
    }

    #[test]
    fn analysis_serializes_absent_modes_as_null() {
        let analysis = RouteAnalysis {
            walking: None,
            transit: Some(TransitAnalysis {
                route: route("??", &[]),
                warnings: vec![],
            }),
        };
        let json = serde_json::to_value(&analysis).unwrap();
        assert!(json["walking"].is_null());
        assert_eq!(json["transit"]["route"]["summary"], "Test Ave");
    }
}
