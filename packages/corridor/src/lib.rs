#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route corridor hazard matching.
//!
//! Decodes a routing service's encoded polyline into points, turns them
//! into a planar line geometry, and tests each hazard coordinate against a
//! distance tolerance around that line. The [`scan`] module ties the steps
//! together and folds classified hazards into a
//! [`ScanResult`](route_safety_corridor_models::ScanResult).
//!
//! Distances are Euclidean in decimal degrees. A degree of longitude
//! shrinks with latitude, so a single tolerance covers a narrower
//! east-west band than north-south band; this is reproduced as-is rather
//! than corrected.

pub mod geometry;
pub mod polyline;
pub mod progress;
pub mod scan;

use thiserror::Error;

pub use geometry::InvalidGeometryError;
pub use polyline::DecodeError;

/// Errors that make an encoded route unusable as a corridor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorridorError {
    /// The encoded polyline is malformed.
    #[error("Polyline decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The decoded route has fewer than two points.
    #[error(transparent)]
    Geometry(#[from] InvalidGeometryError),
}
