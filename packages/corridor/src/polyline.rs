//! Encoded polyline decoder.
//!
//! Each coordinate is stored as a delta from the previous point, scaled by
//! 1e5, zig-zag encoded, split into 5-bit groups (least significant first)
//! and offset by 63 into printable ASCII. A group with bit `0x20` set is
//! followed by another group of the same value.
//!
//! See <https://developers.google.com/maps/documentation/utilities/polylinealgorithm>

use route_safety_corridor_models::{GeoPoint, InvalidCoordinateError};
use thiserror::Error;

/// Scale between stored integers and decimal degrees.
pub const PRECISION: f64 = 1e5;

/// Offset added to every 6-bit group (`'?'`).
const CHAR_OFFSET: u8 = 63;

/// Highest byte a group can encode (`'~'`).
const CHAR_MAX: u8 = CHAR_OFFSET + 0x3f;

const CONTINUATION_BIT: u64 = 0x20;

const GROUP_MASK: u64 = 0x1f;

/// Largest shift at which another group is accepted. Values wider than 35
/// bits cannot come from a real coordinate.
const MAX_SHIFT: u32 = 30;

/// Why an encoded polyline could not be decoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// A byte outside the `'?'..='~'` alphabet.
    #[error("Invalid byte {byte:#04x} at offset {offset}")]
    InvalidByte {
        /// Byte position in the input.
        offset: usize,
        /// The offending byte.
        byte: u8,
    },

    /// The input ended while a value still had continuation groups pending.
    #[error("Truncated value starting at offset {offset}")]
    Truncated {
        /// Byte position where the incomplete value starts.
        offset: usize,
    },

    /// The input ended after a latitude with no longitude to pair it with.
    #[error("Latitude at offset {offset} has no matching longitude")]
    UnpairedLatitude {
        /// Byte position where the latitude starts.
        offset: usize,
    },

    /// A value used more groups than any coordinate delta can need.
    #[error("Value starting at offset {offset} is too long")]
    Overflow {
        /// Byte position where the value starts.
        offset: usize,
    },

    /// The running coordinate left the valid latitude/longitude range.
    #[error("Point starting at offset {offset} is out of range: {source}")]
    OutOfRange {
        /// Byte position where the point starts.
        offset: usize,
        /// The rejected coordinate.
        #[source]
        source: InvalidCoordinateError,
    },
}

/// Decodes an encoded polyline into its ordered list of points.
///
/// An empty string decodes to an empty list.
///
/// # Errors
///
/// Returns [`DecodeError`] for bytes outside the alphabet, truncated
/// values, a trailing latitude without a longitude, oversized values, or
/// points outside the valid coordinate range.
pub fn decode(path: &str) -> Result<Vec<GeoPoint>, DecodeError> {
    let bytes = path.as_bytes();
    let mut points = Vec::new();
    let mut latitude: i64 = 0;
    let mut longitude: i64 = 0;
    let mut offset = 0;

    while offset < bytes.len() {
        let start = offset;

        let (lat_delta, next) = read_value(bytes, offset)?;
        if next >= bytes.len() {
            return Err(DecodeError::UnpairedLatitude { offset: start });
        }
        let (lon_delta, next) = read_value(bytes, next)?;
        offset = next;

        latitude += lat_delta;
        longitude += lon_delta;

        #[allow(clippy::cast_precision_loss)]
        let point = GeoPoint::new(latitude as f64 / PRECISION, longitude as f64 / PRECISION)
            .map_err(|source| DecodeError::OutOfRange {
                offset: start,
                source,
            })?;
        points.push(point);
    }

    log::trace!("Decoded {} points from {} bytes", points.len(), bytes.len());
    Ok(points)
}

/// Reads one zig-zag varint starting at `start`, returning the signed
/// value and the offset just past it.
fn read_value(bytes: &[u8], start: usize) -> Result<(i64, usize), DecodeError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    let mut offset = start;

    loop {
        let Some(&byte) = bytes.get(offset) else {
            return Err(DecodeError::Truncated { offset: start });
        };
        if !(CHAR_OFFSET..=CHAR_MAX).contains(&byte) {
            return Err(DecodeError::InvalidByte { offset, byte });
        }
        if shift > MAX_SHIFT {
            return Err(DecodeError::Overflow { offset: start });
        }

        let group = u64::from(byte - CHAR_OFFSET);
        result |= (group & GROUP_MASK) << shift;
        shift += 5;
        offset += 1;

        if group & CONTINUATION_BIT == 0 {
            break;
        }
    }

    // At most 35 bits, so the halved value always fits.
    #[allow(clippy::cast_possible_wrap)]
    let half = (result >> 1) as i64;
    let value = if result & 1 == 1 { !half } else { half };

    Ok((value, offset))
}
