//! Location audit tracker.
//!
//! Every scan is appended, whatever its classification. A mold without a
//! reference point classifies as `unknown` instead of failing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use geo::{HaversineDistance, Point};
use shared::pagination::Cursor;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::location_log::LocationHistoryQuery;
use crate::models::{
    Coordinates, HistoryWindow, LocationHistoryPage, LocationLog, LocationStatus, NewLocationLog,
    ScanSource,
};
use crate::store::{LocationStore, MoldStore};

/// Tracker settings.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Drift radius for molds without their own threshold.
    pub default_threshold_m: f64,
    pub history_page_size: i64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            default_threshold_m: 100.0,
            history_page_size: 50,
        }
    }
}

/// Great-circle distance in meters.
pub fn distance_m(from: Coordinates, to: Coordinates) -> f64 {
    let a = Point::new(from.longitude, from.latitude);
    let b = Point::new(to.longitude, to.latitude);
    a.haversine_distance(&b)
}

/// Classifies a position against an optional reference point.
pub fn classify(
    reference: Option<Coordinates>,
    position: Coordinates,
    threshold_m: f64,
) -> (LocationStatus, Option<f64>) {
    match reference {
        None => (LocationStatus::Unknown, None),
        Some(reference) => {
            let distance = distance_m(reference, position);
            let status = if distance <= threshold_m {
                LocationStatus::Normal
            } else {
                LocationStatus::Moved
            };
            (status, Some(distance))
        }
    }
}

/// Lazy pager over a mold's location history, newest first.
///
/// The window is fixed when the pager is created, so rewinding replays the
/// same sequence.
pub struct LocationHistory {
    store: Arc<dyn LocationStore>,
    mold_id: Uuid,
    window: HistoryWindow,
    page_size: i64,
    cursor: Option<Cursor>,
    exhausted: bool,
}

impl LocationHistory {
    pub fn window(&self) -> HistoryWindow {
        self.window
    }

    /// Fetches the next page, or `None` once the window is drained.
    pub async fn next_page(&mut self) -> Result<Option<Vec<LocationLog>>, DomainError> {
        if self.exhausted {
            return Ok(None);
        }
        let page = self
            .store
            .page_logs(self.mold_id, self.window, self.cursor, self.page_size)
            .await?;

        if (page.len() as i64) < self.page_size {
            self.exhausted = true;
        }
        match page.last() {
            Some(last) => {
                self.cursor = Some(Cursor::new(last.reported_at, last.id));
                Ok(Some(page))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// Restarts from the newest entry.
    pub fn rewind(&mut self) {
        self.cursor = None;
        self.exhausted = false;
    }

    /// Rewinds, then drains every page.
    pub async fn collect_all(&mut self) -> Result<Vec<LocationLog>, DomainError> {
        self.rewind();
        let mut logs = Vec::new();
        while let Some(page) = self.next_page().await? {
            logs.extend(page);
        }
        Ok(logs)
    }
}

#[derive(Clone)]
pub struct LocationTracker {
    logs: Arc<dyn LocationStore>,
    molds: Arc<dyn MoldStore>,
    config: TrackingConfig,
}

impl LocationTracker {
    pub fn new(
        logs: Arc<dyn LocationStore>,
        molds: Arc<dyn MoldStore>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            logs,
            molds,
            config,
        }
    }

    pub async fn record_scan(
        &self,
        mold_id: Uuid,
        position: Coordinates,
        reporter_id: Uuid,
        source: ScanSource,
        reported_at: Option<DateTime<Utc>>,
    ) -> Result<LocationLog, DomainError> {
        shared::validation::validate_latitude(position.latitude)
            .and_then(|_| shared::validation::validate_longitude(position.longitude))
            .map_err(|e| {
                DomainError::Validation(
                    e.message
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Invalid coordinates".into()),
                )
            })?;

        let mold = self
            .molds
            .find_mold(mold_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Mold", mold_id))?;

        let reference = mold.reference_point();
        let threshold = mold
            .drift_threshold_m
            .unwrap_or(self.config.default_threshold_m);
        let (status, distance) = classify(reference, position, threshold);

        let log = self
            .logs
            .append_log(NewLocationLog {
                mold_id,
                reporter_id,
                position,
                distance_m: distance,
                threshold_m: reference.map(|_| threshold),
                status,
                source,
                reported_at: reported_at.unwrap_or_else(Utc::now),
            })
            .await?;

        metrics::counter!("location_scans_total", "classification" => status.to_string())
            .increment(1);
        if status == LocationStatus::Moved {
            warn!(
                mold_id = %mold_id,
                distance_m = ?distance,
                threshold_m = threshold,
                "Mold reported outside its drift radius"
            );
        } else {
            info!(mold_id = %mold_id, status = %status, "Location scan recorded");
        }
        Ok(log)
    }

    /// Pager over `window` using the configured page size.
    pub fn history(&self, mold_id: Uuid, window: HistoryWindow) -> LocationHistory {
        LocationHistory {
            store: self.logs.clone(),
            mold_id,
            window,
            page_size: self.config.history_page_size.max(1),
            cursor: None,
            exhausted: false,
        }
    }

    /// One cursor page for an external caller.
    pub async fn page(
        &self,
        mold_id: Uuid,
        query: &LocationHistoryQuery,
    ) -> Result<LocationHistoryPage, DomainError> {
        if self.molds.find_mold(mold_id).await?.is_none() {
            return Err(DomainError::not_found("Mold", mold_id));
        }
        let after = query
            .cursor
            .as_deref()
            .map(Cursor::decode)
            .transpose()
            .map_err(|e| DomainError::Validation(e.to_string()))?;
        let window = query.window();
        if window.from > window.to {
            return Err(DomainError::Validation(
                "History window start is after its end".into(),
            ));
        }
        let limit = query.effective_limit();

        let mut items = self.logs.page_logs(mold_id, window, after, limit + 1).await?;
        let has_more = items.len() as i64 > limit;
        items.truncate(limit as usize);
        let next_cursor = if has_more {
            items
                .last()
                .map(|last| Cursor::new(last.reported_at, last.id).encode())
        } else {
            None
        };
        Ok(LocationHistoryPage { items, next_cursor })
    }

    /// Most recent `moved` report at or after `since`.
    pub async fn last_moved_since(
        &self,
        mold_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<LocationLog>, DomainError> {
        self.logs
            .latest_with_status(mold_id, LocationStatus::Moved, since)
            .await
    }

    pub async fn has_moved_since(
        &self,
        mold_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        Ok(self.last_moved_since(mold_id, since).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Mold, NewMold};
    use crate::store::InMemoryStore;
    use chrono::Duration;

    // Meters per degree of latitude on the mean-radius sphere.
    const METERS_PER_DEGREE: f64 = 111_195.08;

    const REFERENCE: Coordinates = Coordinates {
        latitude: 35.1796,
        longitude: 129.0756,
    };

    fn north_of(reference: Coordinates, meters: f64) -> Coordinates {
        Coordinates::new(reference.latitude + meters / METERS_PER_DEGREE, reference.longitude)
    }

    async fn setup(reference: Option<Coordinates>) -> (LocationTracker, Mold) {
        let store = Arc::new(InMemoryStore::new());
        let mold = store
            .create_mold(NewMold {
                code: format!("M-{}", Uuid::new_v4()),
                name: "Door trim".into(),
                company_id: None,
                reference,
                drift_threshold_m: None,
            })
            .await
            .unwrap();
        let tracker = LocationTracker::new(
            store.clone(),
            store,
            TrackingConfig {
                default_threshold_m: 100.0,
                history_page_size: 2,
            },
        );
        (tracker, mold)
    }

    #[test]
    fn test_distance_matches_latitude_offset() {
        let distance = distance_m(REFERENCE, north_of(REFERENCE, 150.0));
        assert!((distance - 150.0).abs() < 0.5, "distance was {}", distance);
    }

    #[test]
    fn test_classify_threshold_is_inclusive() {
        let (status, _) = classify(Some(REFERENCE), REFERENCE, 0.0001);
        assert_eq!(status, LocationStatus::Normal);
    }

    #[tokio::test]
    async fn test_scan_beyond_threshold_is_moved() {
        let (tracker, mold) = setup(Some(REFERENCE)).await;

        let log = tracker
            .record_scan(
                mold.id,
                north_of(REFERENCE, 150.0),
                Uuid::new_v4(),
                ScanSource::Scan,
                None,
            )
            .await
            .unwrap();

        assert_eq!(log.status, LocationStatus::Moved);
        assert_eq!(log.threshold_m, Some(100.0));
        assert!(log.distance_m.unwrap() > 100.0);
    }

    #[tokio::test]
    async fn test_scan_within_threshold_is_normal() {
        let (tracker, mold) = setup(Some(REFERENCE)).await;

        let log = tracker
            .record_scan(
                mold.id,
                north_of(REFERENCE, 40.0),
                Uuid::new_v4(),
                ScanSource::Manual,
                None,
            )
            .await
            .unwrap();

        assert_eq!(log.status, LocationStatus::Normal);
    }

    #[tokio::test]
    async fn test_scan_without_reference_is_unknown() {
        let (tracker, mold) = setup(None).await;

        let log = tracker
            .record_scan(mold.id, REFERENCE, Uuid::new_v4(), ScanSource::Auto, None)
            .await
            .unwrap();

        assert_eq!(log.status, LocationStatus::Unknown);
        assert!(log.distance_m.is_none());
        assert!(log.threshold_m.is_none());
    }

    #[tokio::test]
    async fn test_scan_rejects_invalid_coordinates() {
        let (tracker, mold) = setup(Some(REFERENCE)).await;

        let err = tracker
            .record_scan(
                mold.id,
                Coordinates::new(120.0, 0.0),
                Uuid::new_v4(),
                ScanSource::Scan,
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_scan_unknown_mold_not_found() {
        let (tracker, _) = setup(None).await;
        let err = tracker
            .record_scan(Uuid::new_v4(), REFERENCE, Uuid::new_v4(), ScanSource::Scan, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_history_pages_newest_first_and_replays() {
        let (tracker, mold) = setup(Some(REFERENCE)).await;
        let base = Utc::now() - Duration::hours(10);
        for hour in 0..5 {
            tracker
                .record_scan(
                    mold.id,
                    REFERENCE,
                    Uuid::new_v4(),
                    ScanSource::Scan,
                    Some(base + Duration::hours(hour)),
                )
                .await
                .unwrap();
        }

        let mut history = tracker.history(mold.id, HistoryWindow::last_days(1));
        let mut sizes = Vec::new();
        while let Some(page) = history.next_page().await.unwrap() {
            sizes.push(page.len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(history.next_page().await.unwrap().is_none());

        let all = history.collect_all().await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0].reported_at > w[1].reported_at));
        assert_eq!(history.collect_all().await.unwrap(), all);
    }

    #[tokio::test]
    async fn test_history_respects_window() {
        let (tracker, mold) = setup(Some(REFERENCE)).await;
        let now = Utc::now();
        for days_ago in [1, 5, 40] {
            tracker
                .record_scan(
                    mold.id,
                    REFERENCE,
                    Uuid::new_v4(),
                    ScanSource::Scan,
                    Some(now - Duration::days(days_ago)),
                )
                .await
                .unwrap();
        }

        let window = HistoryWindow::new(now - Duration::days(10), now);
        let logs = tracker.history(mold.id, window).collect_all().await.unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[tokio::test]
    async fn test_page_returns_cursor_until_drained() {
        let (tracker, mold) = setup(Some(REFERENCE)).await;
        let base = Utc::now() - Duration::hours(3);
        for minute in 0..3 {
            tracker
                .record_scan(
                    mold.id,
                    REFERENCE,
                    Uuid::new_v4(),
                    ScanSource::Scan,
                    Some(base + Duration::minutes(minute)),
                )
                .await
                .unwrap();
        }

        let mut query = LocationHistoryQuery {
            limit: Some(2),
            ..Default::default()
        };
        let first = tracker.page(mold.id, &query).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.next_cursor.is_some());

        query.cursor = first.next_cursor;
        let second = tracker.page(mold.id, &query).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_has_moved_since() {
        let (tracker, mold) = setup(Some(REFERENCE)).await;
        let now = Utc::now();
        tracker
            .record_scan(
                mold.id,
                north_of(REFERENCE, 500.0),
                Uuid::new_v4(),
                ScanSource::Scan,
                Some(now - Duration::days(10)),
            )
            .await
            .unwrap();

        assert!(!tracker
            .has_moved_since(mold.id, now - Duration::days(7))
            .await
            .unwrap());
        assert!(tracker
            .has_moved_since(mold.id, now - Duration::days(30))
            .await
            .unwrap());
    }
}
