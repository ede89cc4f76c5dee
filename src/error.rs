//! Error taxonomy for route and geofence computations.
//!
//! Every operation in this crate is pure, so errors are returned
//! synchronously and never retried. A failing call never produces a
//! plausible-looking distance.

use thiserror::Error;

/// Errors raised while building routes or querying them.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error), uniffi(flat_error))]
pub enum RouteError {
    /// A distance was requested against a route with no points.
    #[error("route has no points")]
    EmptyRoute,

    /// A latitude/longitude is NaN, infinite or outside the WGS84 range.
    /// `index` is the position in the input sequence, when there is one.
    #[error("invalid coordinate{} (lat {latitude}, lon {longitude})", at_index(.index))]
    InvalidCoordinate {
        index: Option<usize>,
        latitude: f64,
        longitude: f64,
    },

    /// A reference point radius is not a positive, finite number of meters.
    #[error("reference point '{id}' has invalid radius {radius} m")]
    InvalidRadius { id: String, radius: f64 },

    /// Two reference points share the same ID.
    #[error("duplicate reference point id '{id}'")]
    DuplicateReference { id: String },
}

fn at_index(index: &Option<usize>) -> String {
    index.map(|i| format!(" at index {i}")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_coordinate_message_with_index() {
        let err = RouteError::InvalidCoordinate {
            index: Some(3),
            latitude: f64::NAN,
            longitude: 2.0,
        };
        assert_eq!(err.to_string(), "invalid coordinate at index 3 (lat NaN, lon 2)");
    }

    #[test]
    fn test_invalid_coordinate_message_without_index() {
        let err = RouteError::InvalidCoordinate {
            index: None,
            latitude: 91.0,
            longitude: 0.0,
        };
        assert_eq!(err.to_string(), "invalid coordinate (lat 91, lon 0)");
    }

    #[test]
    fn test_invalid_radius_message() {
        let err = RouteError::InvalidRadius { id: "cp-1".to_string(), radius: -5.0 };
        assert_eq!(err.to_string(), "reference point 'cp-1' has invalid radius -5 m");
    }
}
