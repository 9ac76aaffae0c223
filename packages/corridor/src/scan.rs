//! Hazard scan over one route corridor.
//!
//! The corridor is built once per route. Each hazard's coordinate is
//! parsed (unparseable hazards are skipped and counted), tested against
//! the corridor, and every near hazard is classified exactly once. Scores
//! are folded into the total only after all classifications are in, and
//! only for categories the caller marked unsafe.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use route_safety_corridor_models::{
    Classification, CorridorStatus, GeoPoint, HazardFinding, HazardRecord, ScanResult,
};

use crate::geometry::RouteCorridor;
use crate::progress::ProgressCallback;

/// Default corridor half-width in degrees (roughly 55 m at New York's
/// latitude).
pub const DEFAULT_TOLERANCE: f64 = 0.0005;

/// Default number of classifications in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default upper bound on a single classification.
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Assigns a severity to a hazard.
///
/// Implementations handle their own failures: any error must come back as
/// [`Classification::fallback`], which the scan treats like any other
/// result.
#[async_trait]
pub trait HazardClassifier: Send + Sync {
    /// Classifies one hazard.
    async fn classify(&self, hazard: &HazardRecord) -> Classification;
}

/// Parameters for [`scan_concurrent`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Corridor half-width in degrees. A hazard exactly this far away is
    /// outside.
    pub tolerance: f64,
    /// Categories whose scores count toward the total.
    pub unsafe_categories: BTreeSet<String>,
    /// Maximum classifications in flight. Zero is treated as one.
    pub concurrency: usize,
    /// Per-classification time limit; expiry yields the fallback.
    pub classify_timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            unsafe_categories: BTreeSet::new(),
            concurrency: DEFAULT_CONCURRENCY,
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
        }
    }
}

/// A hazard that passed the proximity test, awaiting classification.
struct NearHazard<'a> {
    record: &'a HazardRecord,
    location: GeoPoint,
    distance: f64,
}

/// Everything decided before classification starts.
struct Selection<'a> {
    corridor: CorridorStatus,
    near: Vec<NearHazard<'a>>,
    checked: usize,
    skipped: usize,
}

/// Scans `hazards` against the route in `path`, classifying near hazards
/// one at a time in input order.
///
/// An unusable route produces an empty result with
/// [`CorridorStatus::Unusable`] and never calls `classify`.
pub fn scan<F>(
    path: &str,
    hazards: &[HazardRecord],
    tolerance: f64,
    unsafe_categories: &BTreeSet<String>,
    mut classify: F,
) -> ScanResult
where
    F: FnMut(&HazardRecord) -> Classification,
{
    let selection = select_near(path, hazards, tolerance);
    let classifications = selection
        .near
        .iter()
        .map(|hazard| classify(hazard.record))
        .collect();

    fold_findings(selection, classifications, unsafe_categories)
}

/// Scans `hazards` against the route in `path`, classifying up to
/// `options.concurrency` near hazards at a time.
///
/// Findings come back in input order. A classification that exceeds
/// `options.classify_timeout` is replaced by the fallback without
/// affecting the others.
pub async fn scan_concurrent(
    path: &str,
    hazards: &[HazardRecord],
    options: &ScanOptions,
    classifier: &dyn HazardClassifier,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> ScanResult {
    use futures::stream::{self, StreamExt as _};

    let selection = select_near(path, hazards, options.tolerance);
    let limit = options.classify_timeout;

    if let Some(p) = progress {
        p.set_total(selection.near.len() as u64);
        p.set_message("Classifying hazards".to_string());
    }

    log::info!(
        "Classifying {} near hazards (concurrency={})",
        selection.near.len(),
        options.concurrency.max(1)
    );

    let classifications: Vec<Classification> =
        stream::iter(selection.near.iter().map(|hazard| async move {
            let classification = classify_within(classifier, hazard.record, limit).await;
            if let Some(p) = progress {
                p.inc(1);
            }
            classification
        }))
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    let result = fold_findings(selection, classifications, &options.unsafe_categories);

    if let Some(p) = progress {
        p.finish(format!(
            "{} hazards on route, score {}",
            result.findings.len(),
            result.total_hazard_score
        ));
    }

    result
}

async fn classify_within(
    classifier: &dyn HazardClassifier,
    hazard: &HazardRecord,
    limit: Duration,
) -> Classification {
    if let Ok(classification) = tokio::time::timeout(limit, classifier.classify(hazard)).await {
        classification
    } else {
        log::warn!(
            "Classification of '{}' timed out after {limit:?}, using fallback",
            hazard.complaint_type
        );
        Classification::fallback()
    }
}

fn select_near<'a>(path: &str, hazards: &'a [HazardRecord], tolerance: f64) -> Selection<'a> {
    let corridor = match RouteCorridor::from_encoded(path) {
        Ok(corridor) => corridor,
        Err(e) => {
            log::warn!("Route geometry unusable, no hazards can be near it: {e}");
            return Selection {
                corridor: CorridorStatus::Unusable {
                    reason: e.to_string(),
                },
                near: Vec::new(),
                checked: 0,
                skipped: 0,
            };
        }
    };

    let mut near = Vec::new();
    let mut skipped = 0;

    for (index, record) in hazards.iter().enumerate() {
        let location = match record.coordinate() {
            Ok(location) => location,
            Err(e) => {
                log::debug!(
                    "Skipping hazard #{index} '{}': {e}",
                    record.complaint_type
                );
                skipped += 1;
                continue;
            }
        };

        let proximity = corridor.proximity(location, tolerance);
        log::trace!(
            "Hazard #{index} ({}, {}): distance={:.6}° tolerance={tolerance:.6}° near={}",
            location.latitude(),
            location.longitude(),
            proximity.distance,
            proximity.is_near
        );

        if proximity.is_near {
            log::debug!(
                "Hazard #{index} '{}' is inside the corridor",
                record.complaint_type
            );
            near.push(NearHazard {
                record,
                location,
                distance: proximity.distance,
            });
        }
    }

    if skipped > 0 {
        log::warn!(
            "Skipped {skipped} of {} hazards with unparseable coordinates",
            hazards.len()
        );
    }

    log::info!(
        "{} of {} hazards are within {tolerance}° of the route",
        near.len(),
        hazards.len()
    );

    Selection {
        corridor: CorridorStatus::Usable {
            vertices: corridor.vertex_count(),
        },
        near,
        checked: hazards.len(),
        skipped,
    }
}

fn fold_findings(
    selection: Selection<'_>,
    classifications: Vec<Classification>,
    unsafe_categories: &BTreeSet<String>,
) -> ScanResult {
    let mut total_hazard_score: u32 = 0;
    let mut findings = Vec::with_capacity(selection.near.len());

    for (hazard, classification) in selection.near.into_iter().zip(classifications) {
        let is_counted = unsafe_categories.contains(&classification.category);
        if is_counted {
            total_hazard_score += u32::from(classification.score);
        }
        findings.push(HazardFinding::near(
            hazard.record,
            hazard.location,
            hazard.distance,
            classification,
            is_counted,
        ));
    }

    ScanResult {
        corridor: selection.corridor,
        findings,
        total_hazard_score,
        hazards_checked: selection.checked,
        hazards_skipped: selection.skipped,
    }
}
