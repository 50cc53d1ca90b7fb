//! Location audit models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Drift classification of a single position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationStatus {
    Normal,
    Moved,
    /// The mold has no reference point to compare against.
    Unknown,
}

impl std::fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocationStatus::Normal => write!(f, "normal"),
            LocationStatus::Moved => write!(f, "moved"),
            LocationStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// How a position report was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanSource {
    /// QR/tag scan at the mold.
    #[default]
    Scan,
    Manual,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Append-only record of one position report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationLog {
    pub id: i64,
    pub mold_id: Uuid,
    pub reporter_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    /// Great-circle distance from the reference point, when one is configured.
    pub distance_m: Option<f64>,
    pub threshold_m: Option<f64>,
    pub status: LocationStatus,
    pub source: ScanSource,
    pub reported_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLocationLog {
    pub mold_id: Uuid,
    pub reporter_id: Uuid,
    pub position: Coordinates,
    pub distance_m: Option<f64>,
    pub threshold_m: Option<f64>,
    pub status: LocationStatus,
    pub source: ScanSource,
    pub reported_at: DateTime<Utc>,
}

/// Closed time window for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl HistoryWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// The `days` days ending now.
    pub fn last_days(days: i64) -> Self {
        let to = Utc::now();
        Self {
            from: to - chrono::Duration::days(days),
            to,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordScanRequest {
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: f64,

    #[serde(default)]
    pub source: ScanSource,

    /// Defaults to the time of ingestion.
    pub reported_at: Option<DateTime<Utc>>,
}

/// Query parameters for location history.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationHistoryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Opaque cursor returned as `nextCursor` by the previous page.
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

impl LocationHistoryQuery {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;
    /// Window used when `from` is omitted.
    pub const DEFAULT_WINDOW_DAYS: i64 = 30;

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn window(&self) -> HistoryWindow {
        let to = self.to.unwrap_or_else(Utc::now);
        let from = self
            .from
            .unwrap_or_else(|| to - chrono::Duration::days(Self::DEFAULT_WINDOW_DAYS));
        HistoryWindow::new(from, to)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationHistoryPage {
    pub items: Vec<LocationLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_request_defaults_source() {
        let req: RecordScanRequest =
            serde_json::from_str(r#"{"latitude": 35.1, "longitude": 129.0}"#).unwrap();
        assert_eq!(req.source, ScanSource::Scan);
        assert!(req.reported_at.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_scan_request_rejects_out_of_range() {
        let req = RecordScanRequest {
            latitude: 91.0,
            longitude: 0.0,
            source: ScanSource::Manual,
            reported_at: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_history_query_limit_clamped() {
        let query = LocationHistoryQuery {
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(query.effective_limit(), LocationHistoryQuery::MAX_LIMIT);
        assert_eq!(
            LocationHistoryQuery::default().effective_limit(),
            LocationHistoryQuery::DEFAULT_LIMIT
        );
    }

    #[test]
    fn test_history_window_bounds_are_inclusive() {
        let window = HistoryWindow::last_days(1);
        assert!(window.contains(window.from));
        assert!(window.contains(window.to));
        assert!(!window.contains(window.from - chrono::Duration::seconds(1)));
    }
}
