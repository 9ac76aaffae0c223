//! Progress reporting for hazard classification.
//!
//! Classification is the slow part of a scan, so [`scan_concurrent`]
//! reports one unit per classified hazard through [`ProgressCallback`].
//! Callers that want no reporting pass `None`.
//!
//! [`scan_concurrent`]: crate::scan::scan_concurrent

/// Receives progress updates from a running scan.
///
/// Implementations must be `Send + Sync`; updates may arrive from
/// concurrently polled classification futures.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of hazards that will be classified.
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` hazards.
    fn inc(&self, delta: u64);

    /// Replaces the status message.
    fn set_message(&self, msg: String);

    /// Marks the scan finished with a summary message.
    fn finish(&self, msg: String);
}
