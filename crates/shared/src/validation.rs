//! Common validation utilities.

use validator::ValidationError;

/// Largest drift radius accepted for a single mold (50 km).
const MAX_DRIFT_THRESHOLD_M: f64 = 50_000.0;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates a drift threshold in meters (positive, at most 50 km).
pub fn validate_drift_threshold(meters: f64) -> Result<(), ValidationError> {
    if meters > 0.0 && meters <= MAX_DRIFT_THRESHOLD_M {
        Ok(())
    } else {
        let mut err = ValidationError::new("threshold_range");
        err.message = Some("Drift threshold must be between 0 and 50000 meters".into());
        Err(err)
    }
}

/// Validates that a string is not blank after trimming.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value cannot be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}
