//! Location log entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{LocationLog, LocationStatus, ScanSource};
use sqlx::FromRow;
use uuid::Uuid;

/// Database enum for drift classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "location_status", rename_all = "lowercase")]
pub enum LocationStatusDb {
    Normal,
    Moved,
    Unknown,
}

impl From<LocationStatusDb> for LocationStatus {
    fn from(status: LocationStatusDb) -> Self {
        match status {
            LocationStatusDb::Normal => LocationStatus::Normal,
            LocationStatusDb::Moved => LocationStatus::Moved,
            LocationStatusDb::Unknown => LocationStatus::Unknown,
        }
    }
}

impl From<LocationStatus> for LocationStatusDb {
    fn from(status: LocationStatus) -> Self {
        match status {
            LocationStatus::Normal => LocationStatusDb::Normal,
            LocationStatus::Moved => LocationStatusDb::Moved,
            LocationStatus::Unknown => LocationStatusDb::Unknown,
        }
    }
}

/// Database enum for scan sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "scan_source", rename_all = "lowercase")]
pub enum ScanSourceDb {
    Scan,
    Manual,
    Auto,
}

impl From<ScanSourceDb> for ScanSource {
    fn from(source: ScanSourceDb) -> Self {
        match source {
            ScanSourceDb::Scan => ScanSource::Scan,
            ScanSourceDb::Manual => ScanSource::Manual,
            ScanSourceDb::Auto => ScanSource::Auto,
        }
    }
}

impl From<ScanSource> for ScanSourceDb {
    fn from(source: ScanSource) -> Self {
        match source {
            ScanSource::Scan => ScanSourceDb::Scan,
            ScanSource::Manual => ScanSourceDb::Manual,
            ScanSource::Auto => ScanSourceDb::Auto,
        }
    }
}

/// Database row mapping for the location_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct LocationLogEntity {
    pub id: i64,
    pub mold_id: Uuid,
    pub reporter_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_m: Option<f64>,
    pub threshold_m: Option<f64>,
    pub status: LocationStatusDb,
    pub source: ScanSourceDb,
    pub reported_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<LocationLogEntity> for LocationLog {
    fn from(entity: LocationLogEntity) -> Self {
        Self {
            id: entity.id,
            mold_id: entity.mold_id,
            reporter_id: entity.reporter_id,
            latitude: entity.latitude,
            longitude: entity.longitude,
            distance_m: entity.distance_m,
            threshold_m: entity.threshold_m,
            status: entity.status.into(),
            source: entity.source.into(),
            reported_at: entity.reported_at,
            created_at: entity.created_at,
        }
    }
}
