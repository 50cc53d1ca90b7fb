//! Mold (tracked asset) models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;
use validator::Validate;

use super::location_log::Coordinates;

/// Production stage of a mold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoldStage {
    Development,
    MassProduction,
}

impl std::fmt::Display for MoldStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoldStage::Development => write!(f, "development"),
            MoldStage::MassProduction => write!(f, "mass_production"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mold {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub company_id: Option<Uuid>,
    pub stage: MoldStage,
    pub reference_latitude: Option<f64>,
    pub reference_longitude: Option<f64>,
    /// Overrides the tracker's default drift radius.
    pub drift_threshold_m: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mold {
    pub fn reference_point(&self) -> Option<Coordinates> {
        match (self.reference_latitude, self.reference_longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }

    /// Field snapshot used for revision diffs. Timestamps are bookkeeping
    /// and not revisioned.
    pub fn snapshot(&self) -> JsonValue {
        json!({
            "code": self.code,
            "name": self.name,
            "company_id": self.company_id,
            "stage": self.stage,
            "reference_latitude": self.reference_latitude,
            "reference_longitude": self.reference_longitude,
            "drift_threshold_m": self.drift_threshold_m,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewMold {
    pub code: String,
    pub name: String,
    pub company_id: Option<Uuid>,
    pub reference: Option<Coordinates>,
    pub drift_threshold_m: Option<f64>,
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMoldRequest {
    #[validate(length(min = 1, max = 64, message = "Code must be 1-64 characters"))]
    pub code: String,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    pub company_id: Option<Uuid>,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub reference_latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub reference_longitude: Option<f64>,

    #[validate(range(exclusive_min = 0.0, max = 50000.0, message = "Drift threshold must be between 0 and 50000 meters"))]
    pub drift_threshold_m: Option<f64>,
}

impl CreateMoldRequest {
    pub fn into_new_mold(self) -> Result<NewMold, String> {
        let reference = match (self.reference_latitude, self.reference_longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            (None, None) => None,
            _ => return Err("Reference latitude and longitude must be set together".into()),
        };
        Ok(NewMold {
            code: self.code.trim().to_string(),
            name: self.name.trim().to_string(),
            company_id: self.company_id,
            reference,
            drift_threshold_m: self.drift_threshold_m,
        })
    }
}

/// Partial update of a mold's master data. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMoldRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    pub company_id: Option<Uuid>,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub reference_latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub reference_longitude: Option<f64>,

    #[validate(range(exclusive_min = 0.0, max = 50000.0, message = "Drift threshold must be between 0 and 50000 meters"))]
    pub drift_threshold_m: Option<f64>,

    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    pub reason: Option<String>,
}

impl UpdateMoldRequest {
    /// Applies the patch to a copy of `mold`.
    pub fn apply(&self, mold: &Mold) -> Result<Mold, String> {
        if self.reference_latitude.is_some() != self.reference_longitude.is_some() {
            return Err("Reference latitude and longitude must be set together".into());
        }
        let mut updated = mold.clone();
        if let Some(name) = &self.name {
            updated.name = name.trim().to_string();
        }
        if self.company_id.is_some() {
            updated.company_id = self.company_id;
        }
        if self.reference_latitude.is_some() {
            updated.reference_latitude = self.reference_latitude;
            updated.reference_longitude = self.reference_longitude;
        }
        if self.drift_threshold_m.is_some() {
            updated.drift_threshold_m = self.drift_threshold_m;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mold() -> Mold {
        Mold {
            id: Uuid::new_v4(),
            code: "MD-1001".into(),
            name: "Bumper cover LH".into(),
            company_id: None,
            stage: MoldStage::Development,
            reference_latitude: None,
            reference_longitude: None,
            drift_threshold_m: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_reference_point_requires_both_coordinates() {
        let mut m = mold();
        assert!(m.reference_point().is_none());
        m.reference_latitude = Some(37.5);
        assert!(m.reference_point().is_none());
        m.reference_longitude = Some(127.0);
        assert_eq!(m.reference_point(), Some(Coordinates::new(37.5, 127.0)));
    }

    #[test]
    fn test_snapshot_uses_snake_case_keys() {
        let snapshot = mold().snapshot();
        assert_eq!(snapshot["stage"], "development");
        assert!(snapshot.get("reference_latitude").is_some());
        assert!(snapshot.get("updated_at").is_none());
    }

    #[test]
    fn test_patch_rejects_half_reference() {
        let patch = UpdateMoldRequest {
            reference_latitude: Some(1.0),
            ..Default::default()
        };
        assert!(patch.apply(&mold()).is_err());
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let m = mold();
        assert_eq!(UpdateMoldRequest::default().apply(&m).unwrap(), m);
    }

    #[test]
    fn test_create_request_rejects_zero_threshold() {
        let req = CreateMoldRequest {
            code: "MD-1".into(),
            name: "Door trim".into(),
            company_id: None,
            reference_latitude: None,
            reference_longitude: None,
            drift_threshold_m: Some(0.0),
        };
        assert!(req.validate().is_err());
    }
}
