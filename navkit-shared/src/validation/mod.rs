// SPDX-License-Identifier: GPL-3.0-only
//! Input validation for host-supplied session properties
//!
//! Everything that crosses from the host into the session (coordinates,
//! language codes, access tokens) is checked here before it reaches the
//! coordinator or an outgoing HTTP request.

use crate::models::geo::Coordinate;

/// Limits applied to host inputs
pub mod limits {
    /// Maximum string length for tokens and free-form fields
    pub const MAX_STRING_LENGTH: usize = 1024;

    /// Maximum length of a language tag such as `fr` or `en-GB`
    pub const MAX_LANGUAGE_LENGTH: usize = 16;

    /// Origin and destination closer than this are rejected
    pub const MIN_ROUTE_SPAN_M: f64 = 1.0;
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Malformed coordinate '{input}': expected 'longitude,latitude'")]
    MalformedCoordinate { input: String },

    #[error("Longitude out of range: {value} (must be -180..=180)")]
    LongitudeOutOfRange { value: f64 },

    #[error("Latitude out of range: {value} (must be -90..=90)")]
    LatitudeOutOfRange { value: f64 },

    #[error("Origin and destination are the same point")]
    DegenerateRoute,

    #[error("String too long: {len} > {max} characters")]
    StringTooLong { len: usize, max: usize },

    #[error("Empty required field: {field}")]
    EmptyField { field: String },

    #[error("Invalid character in field '{field}'")]
    InvalidCharacters { field: String },
}

/// Trait for validating host-supplied values
pub trait Validate {
    /// # Errors
    /// Returns a [`ValidationError`] describing the first problem found.
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for Coordinate {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_coordinate(self)
    }
}

/// Validate a WGS-84 coordinate
///
/// # Errors
/// Returns [`ValidationError::LongitudeOutOfRange`] or
/// [`ValidationError::LatitudeOutOfRange`] for non-finite or out of range values.
pub fn validate_coordinate(coordinate: &Coordinate) -> Result<(), ValidationError> {
    if !coordinate.longitude.is_finite() || !(-180.0..=180.0).contains(&coordinate.longitude) {
        return Err(ValidationError::LongitudeOutOfRange {
            value: coordinate.longitude,
        });
    }
    if !coordinate.latitude.is_finite() || !(-90.0..=90.0).contains(&coordinate.latitude) {
        return Err(ValidationError::LatitudeOutOfRange {
            value: coordinate.latitude,
        });
    }
    Ok(())
}

/// Validate a pair of route endpoints
///
/// # Errors
/// Propagates [`validate_coordinate`] errors and returns
/// [`ValidationError::DegenerateRoute`] when both points coincide.
pub fn validate_route_endpoints(
    origin: &Coordinate,
    destination: &Coordinate,
) -> Result<(), ValidationError> {
    validate_coordinate(origin)?;
    validate_coordinate(destination)?;
    if origin.distance_to(destination) < limits::MIN_ROUTE_SPAN_M {
        return Err(ValidationError::DegenerateRoute);
    }
    Ok(())
}

/// Validate string fields with length and character restrictions
///
/// # Errors
/// Returns [`ValidationError::StringTooLong`] when `value` exceeds `max_length`,
/// or [`ValidationError::InvalidCharacters`] when control characters are found.
pub fn validate_string(
    value: &str,
    field_name: &str,
    max_length: usize,
) -> Result<(), ValidationError> {
    if value.len() > max_length {
        return Err(ValidationError::StringTooLong {
            len: value.len(),
            max: max_length,
        });
    }

    if value.chars().any(char::is_control) {
        return Err(ValidationError::InvalidCharacters {
            field: field_name.to_string(),
        });
    }

    Ok(())
}

/// Validate a BCP-47-ish language tag (`fr`, `en-US`)
///
/// # Errors
/// Returns [`ValidationError::EmptyField`] for an empty tag and
/// [`ValidationError::InvalidCharacters`] for anything but ASCII letters and hyphens.
pub fn validate_language(language: &str) -> Result<(), ValidationError> {
    if language.is_empty() {
        return Err(ValidationError::EmptyField {
            field: "language".to_string(),
        });
    }
    validate_string(language, "language", limits::MAX_LANGUAGE_LENGTH)?;
    if !language.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
        return Err(ValidationError::InvalidCharacters {
            field: "language".to_string(),
        });
    }
    Ok(())
}

/// Validate an API access token before it is put into a URL
///
/// # Errors
/// Returns [`ValidationError::EmptyField`] for an empty token and
/// [`ValidationError::InvalidCharacters`] for characters that would need escaping.
pub fn validate_access_token(token: &str) -> Result<(), ValidationError> {
    if token.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "access_token".to_string(),
        });
    }
    validate_string(token, "access_token", limits::MAX_STRING_LENGTH)?;
    if !token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ValidationError::InvalidCharacters {
            field: "access_token".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_coordinate() {
        assert!(validate_coordinate(&Coordinate::new(2.45, 48.56)).is_ok());
        assert!(validate_coordinate(&Coordinate::new(-180.0, 90.0)).is_ok());
        assert!(matches!(
            validate_coordinate(&Coordinate::new(181.0, 0.0)),
            Err(ValidationError::LongitudeOutOfRange { .. })
        ));
        assert!(matches!(
            validate_coordinate(&Coordinate::new(0.0, -91.0)),
            Err(ValidationError::LatitudeOutOfRange { .. })
        ));
        assert!(validate_coordinate(&Coordinate::new(f64::NAN, 0.0)).is_err());
    }

    #[test]
    fn test_validate_route_endpoints() {
        let origin = Coordinate::new(2.450_804_8, 48.569_198_1);
        let destination = Coordinate::new(2.300_946, 48.606_716);
        assert!(validate_route_endpoints(&origin, &destination).is_ok());
        assert!(matches!(
            validate_route_endpoints(&origin, &origin),
            Err(ValidationError::DegenerateRoute)
        ));
    }

    #[test]
    fn test_validate_string() {
        assert!(validate_string("hello", "test", 10).is_ok());
        assert!(validate_string("hello world!", "test", 5).is_err());
        assert!(validate_string("hello\x00world", "test", 20).is_err());
    }

    #[test]
    fn test_validate_language() {
        assert!(validate_language("fr").is_ok());
        assert!(validate_language("en-GB").is_ok());
        assert!(validate_language("").is_err());
        assert!(validate_language("fr;drop").is_err());
    }

    #[test]
    fn test_validate_access_token() {
        assert!(validate_access_token("pk.eyJ1Ijoi-abc_123").is_ok());
        assert!(validate_access_token("  ").is_err());
        assert!(validate_access_token("pk.abc&evil=1").is_err());
    }
}
